//! Recursive-descent parser with precedence climbing for expressions.
//!
//! Produces one `SourceUnit` per source file plus the file's own function
//! and structure definitions, collected into local arenas. The resolver
//! later merges each file's arenas into the program-wide ones, remapping
//! `FunctionId`/`StructId` by the cumulative count already merged.

use crate::ast::*;
use crate::error::{CodeLoc, ParseError};
use crate::intern::{FunctionId, InternerBuilder, StringId, StructId};
use crate::token::{PrimitiveKw, Token, TokenKind};

#[derive(Debug)]
pub struct ParsedFile {
    pub unit: SourceUnit,
    pub functions: Vec<FunctionDef>,
    pub structs: Vec<StructDef>,
}

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    interner: &'a mut InternerBuilder,
    functions: Vec<FunctionDef>,
    structs: Vec<StructDef>,
    namespace: NsPath,
}

type PResult<T> = Result<T, ParseError>;

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, interner: &'a mut InternerBuilder) -> Self {
        Self {
            tokens,
            pos: 0,
            interner,
            functions: Vec::new(),
            structs: Vec::new(),
            namespace: Vec::new(),
        }
    }

    pub fn parse_file(mut self) -> PResult<ParsedFile> {
        let mut usings = Vec::new();
        let mut top_level = Vec::new();

        while let TokenKind::Using = self.peek_kind() {
            usings.push(self.parse_using()?);
        }
        if let TokenKind::Namespace = self.peek_kind() {
            self.advance();
            self.namespace = self.parse_ns_path()?;
            self.expect(TokenKind::Semicolon, "';' after namespace declaration")?;
        }
        while !self.at_eof() {
            top_level.push(self.parse_top_level_stmt()?);
        }

        Ok(ParsedFile {
            unit: SourceUnit {
                namespace: self.namespace.clone(),
                usings,
                top_level,
            },
            functions: self.functions,
            structs: self.structs,
        })
    }

    // ---- token cursor helpers ----

    fn peek(&self) -> &Token {
        &self.tokens[self.pos]
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.tokens[self.pos].kind
    }

    fn loc(&self) -> CodeLoc {
        self.peek().loc
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos].clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek_kind()) == std::mem::discriminant(kind)
    }

    fn bump_if(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> PResult<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(expected))
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        if self.at_eof() {
            ParseError::UnexpectedEof { expected: expected.to_string() }
        } else {
            ParseError::UnexpectedToken {
                found: format!("{:?}", self.peek_kind()),
                expected: expected.to_string(),
                at: self.loc(),
            }
        }
    }

    fn expect_ident(&mut self, expected: &str) -> PResult<StringId> {
        match self.peek_kind().clone() {
            TokenKind::Ident(id) => {
                self.advance();
                Ok(id)
            }
            _ => Err(self.unexpected(expected)),
        }
    }

    fn intern(&mut self, s: &str) -> StringId {
        self.interner.intern(s)
    }

    // ---- top-level / using / namespace ----

    fn parse_ns_path(&mut self) -> PResult<NsPath> {
        let mut path = vec![self.expect_ident("namespace segment")?];
        while self.bump_if(&TokenKind::ColonColon) {
            path.push(self.expect_ident("namespace segment")?);
        }
        Ok(path)
    }

    fn parse_using(&mut self) -> PResult<UsingDecl> {
        let loc = self.loc();
        self.advance(); // using
        let path = self.parse_ns_path()?;
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        if self.bump_if(&TokenKind::Include) {
            include.push(self.expect_ident("included name")?);
            while self.bump_if(&TokenKind::Comma) {
                include.push(self.expect_ident("included name")?);
            }
        }
        if self.bump_if(&TokenKind::Exclude) {
            exclude.push(self.expect_ident("excluded name")?);
            while self.bump_if(&TokenKind::Comma) {
                exclude.push(self.expect_ident("excluded name")?);
            }
        }
        self.expect(TokenKind::Semicolon, "';' after using declaration")?;
        Ok(UsingDecl { path, include, exclude, loc })
    }

    fn parse_top_level_stmt(&mut self) -> PResult<Stmt> {
        match self.peek_kind() {
            TokenKind::Func => self.parse_function_decl(),
            TokenKind::Struct => self.parse_struct_decl(),
            _ => self.parse_stmt(),
        }
    }

    // ---- types ----

    fn parse_type(&mut self) -> PResult<TypeRef> {
        let base = match self.peek_kind().clone() {
            TokenKind::Void => {
                self.advance();
                TypeRef::Void
            }
            TokenKind::Any => {
                self.advance();
                TypeRef::Any
            }
            TokenKind::TypeKw(kw) => {
                self.advance();
                TypeRef::from(kw)
            }
            TokenKind::Ident(id) => {
                self.advance();
                TypeRef::Struct(id)
            }
            _ => return Err(self.unexpected("a type name")),
        };
        let mut ty = base;
        while self.bump_if(&TokenKind::LBracket) {
            self.expect(TokenKind::RBracket, "']' to close array type")?;
            ty = TypeRef::Array(Box::new(ty));
        }
        Ok(ty)
    }

    // ---- function / struct declarations ----

    fn parse_function_decl(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // func
        let name = self.expect_ident("function name")?;
        self.expect(TokenKind::LParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.bump_if(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' to close parameter list")?;
        let ret = if self.bump_if(&TokenKind::Colon) { self.parse_type()? } else { TypeRef::Void };
        self.expect(TokenKind::LBrace, "'{' to open function body")?;
        let body = self.parse_block_stmts()?;
        let def = FunctionDef { name, params, ret, body, namespace: self.namespace.clone(), loc };
        let id = FunctionId::new(self.functions.len());
        self.functions.push(def);
        Ok(Stmt { kind: StmtKind::FunctionDecl(id), loc })
    }

    fn parse_param(&mut self) -> PResult<Param> {
        let loc = self.loc();
        let is_rest = self.bump_if(&TokenKind::Dot) && self.bump_if(&TokenKind::Dot) && self.bump_if(&TokenKind::Dot);
        let name = self.expect_ident("parameter name")?;
        self.expect(TokenKind::Colon, "':' before parameter type")?;
        let ty = self.parse_type()?;
        let default = if self.bump_if(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
        Ok(Param { name, ty, default, is_rest, loc })
    }

    fn parse_struct_decl(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // struct
        let name = self.expect_ident("structure name")?;
        self.expect(TokenKind::LBrace, "'{' to open structure body")?;
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let fname = self.expect_ident("field name")?;
            self.expect(TokenKind::Colon, "':' before field type")?;
            let ty = self.parse_type()?;
            let default = if self.bump_if(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
            self.expect(TokenKind::Semicolon, "';' after field declaration")?;
            fields.push(FieldDef { name: fname, ty, default });
        }
        self.expect(TokenKind::RBrace, "'}' to close structure body")?;
        let def = StructDef { name, fields, namespace: self.namespace.clone(), loc };
        let id = StructId::new(self.structs.len());
        self.structs.push(def);
        Ok(Stmt { kind: StmtKind::StructDecl(id), loc })
    }

    // ---- statements ----

    fn parse_block_stmts(&mut self) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::RBrace, "'}' to close block")?;
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        match self.peek_kind() {
            TokenKind::LBrace => {
                self.advance();
                Ok(Stmt { kind: StmtKind::Block(self.parse_block_stmts()?), loc })
            }
            TokenKind::Let | TokenKind::Const => self.parse_var_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Do => self.parse_do_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Foreach => self.parse_foreach(),
            TokenKind::Switch => self.parse_switch(),
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';' after break")?;
                Ok(Stmt { kind: StmtKind::Break, loc })
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Semicolon, "';' after continue")?;
                Ok(Stmt { kind: StmtKind::Continue, loc })
            }
            TokenKind::Return => {
                self.advance();
                let value = if self.check(&TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
                self.expect(TokenKind::Semicolon, "';' after return")?;
                Ok(Stmt { kind: StmtKind::Return(value), loc })
            }
            TokenKind::Exit => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after exit")?;
                let code = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' after exit's argument")?;
                self.expect(TokenKind::Semicolon, "';' after exit(...)")?;
                Ok(Stmt { kind: StmtKind::Exit(code), loc })
            }
            TokenKind::Try => self.parse_try(),
            TokenKind::Throw => {
                self.advance();
                let e = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';' after throw")?;
                Ok(Stmt { kind: StmtKind::Throw(e), loc })
            }
            TokenKind::Func => self.parse_function_decl(),
            TokenKind::Struct => self.parse_struct_decl(),
            _ => {
                let e = self.parse_expr()?;
                self.expect(TokenKind::Semicolon, "';' after expression statement")?;
                Ok(Stmt { kind: StmtKind::Expr(e), loc })
            }
        }
    }

    fn parse_var_decl(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        let is_const = matches!(self.peek_kind(), TokenKind::Const);
        self.advance(); // let | const
        let name = self.expect_ident("variable name")?;
        let ty = if self.bump_if(&TokenKind::Colon) { Some(self.parse_type()?) } else { None };
        let init = if self.bump_if(&TokenKind::Assign) { Some(self.parse_expr()?) } else { None };
        self.expect(TokenKind::Semicolon, "';' after variable declaration")?;
        Ok(Stmt { kind: StmtKind::VarDecl { name, ty, is_const, init }, loc })
    }

    fn parse_if(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // if
        self.expect(TokenKind::LParen, "'(' after if")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after if condition")?;
        let then_branch = Box::new(self.parse_stmt()?);
        let else_branch = if self.bump_if(&TokenKind::Else) { Some(Box::new(self.parse_stmt()?)) } else { None };
        Ok(Stmt { kind: StmtKind::If { cond, then_branch, else_branch }, loc })
    }

    fn parse_while(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // while
        self.expect(TokenKind::LParen, "'(' after while")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after while condition")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt { kind: StmtKind::While { cond, body }, loc })
    }

    fn parse_do_while(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // do
        let body = Box::new(self.parse_stmt()?);
        self.expect(TokenKind::While, "'while' after do-block")?;
        self.expect(TokenKind::LParen, "'(' after while")?;
        let cond = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after while condition")?;
        self.expect(TokenKind::Semicolon, "';' after do-while")?;
        Ok(Stmt { kind: StmtKind::DoWhile { body, cond }, loc })
    }

    fn parse_for(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // for
        self.expect(TokenKind::LParen, "'(' after for")?;
        let init = if self.check(&TokenKind::Semicolon) {
            self.advance();
            None
        } else if matches!(self.peek_kind(), TokenKind::Let | TokenKind::Const) {
            Some(Box::new(self.parse_var_decl()?))
        } else {
            let e = self.parse_expr()?;
            self.expect(TokenKind::Semicolon, "';' after for-init")?;
            Some(Box::new(Stmt { kind: StmtKind::Expr(e), loc }))
        };
        let cond = if self.check(&TokenKind::Semicolon) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::Semicolon, "';' after for-condition")?;
        let step = if self.check(&TokenKind::RParen) { None } else { Some(self.parse_expr()?) };
        self.expect(TokenKind::RParen, "')' after for-clauses")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt { kind: StmtKind::For { init, cond, step, body }, loc })
    }

    fn parse_foreach(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // foreach
        self.expect(TokenKind::LParen, "'(' after foreach")?;
        let binding_ty = if !matches!(self.peek_kind(), TokenKind::Ident(_)) || self.is_type_lookahead() {
            Some(self.parse_type()?)
        } else {
            None
        };
        let binding = self.expect_ident("loop variable name")?;
        self.expect(TokenKind::In, "'in' in foreach")?;
        let iterable = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after foreach clause")?;
        let body = Box::new(self.parse_stmt()?);
        Ok(Stmt { kind: StmtKind::Foreach { binding, binding_ty, iterable, body }, loc })
    }

    /// Disambiguates `foreach (int x in xs)` (typed) from `foreach (x in xs)`
    /// (untyped) without backtracking: a primitive/`any` keyword can only
    /// start a type, never a bare identifier target.
    fn is_type_lookahead(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::TypeKw(_) | TokenKind::Any | TokenKind::Void)
    }

    fn parse_switch(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // switch
        self.expect(TokenKind::LParen, "'(' after switch")?;
        let subject = self.parse_expr()?;
        self.expect(TokenKind::RParen, "')' after switch subject")?;
        self.expect(TokenKind::LBrace, "'{' to open switch body")?;
        let mut cases = Vec::new();
        let mut default = None;
        while !self.check(&TokenKind::RBrace) {
            if self.bump_if(&TokenKind::Case) {
                let value = self.parse_expr()?;
                self.expect(TokenKind::Colon, "':' after case value")?;
                let mut body = Vec::new();
                while !matches!(self.peek_kind(), TokenKind::Case | TokenKind::Default | TokenKind::RBrace) {
                    body.push(self.parse_stmt()?);
                }
                cases.push(SwitchCase { value, body });
            } else {
                self.expect(TokenKind::Default, "'case' or 'default'")?;
                self.expect(TokenKind::Colon, "':' after default")?;
                let mut body = Vec::new();
                while !matches!(self.peek_kind(), TokenKind::Case | TokenKind::Default | TokenKind::RBrace) {
                    body.push(self.parse_stmt()?);
                }
                default = Some(body);
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close switch body")?;
        Ok(Stmt { kind: StmtKind::Switch { subject, cases, default }, loc })
    }

    fn parse_try(&mut self) -> PResult<Stmt> {
        let loc = self.loc();
        self.advance(); // try
        self.expect(TokenKind::LBrace, "'{' to open try body")?;
        let body = self.parse_block_stmts()?;
        self.expect(TokenKind::Catch, "'catch' after try body")?;
        let catch_binding = if self.bump_if(&TokenKind::LParen) {
            let name = self.expect_ident("catch binding name")?;
            self.expect(TokenKind::RParen, "')' after catch binding")?;
            Some(name)
        } else {
            None
        };
        self.expect(TokenKind::LBrace, "'{' to open catch body")?;
        let catch_body = self.parse_block_stmts()?;
        Ok(Stmt { kind: StmtKind::Try { body, catch_binding, catch_body }, loc })
    }

    // ---- expressions: precedence climbing ----

    pub fn parse_expr(&mut self) -> PResult<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        let lhs = self.parse_ternary()?;
        let op = match self.peek_kind() {
            TokenKind::Assign => None,
            TokenKind::PlusAssign => Some(CompoundOp::Add),
            TokenKind::MinusAssign => Some(CompoundOp::Sub),
            TokenKind::StarAssign => Some(CompoundOp::Mul),
            TokenKind::SlashAssign => Some(CompoundOp::Div),
            TokenKind::PercentAssign => Some(CompoundOp::Mod),
            TokenKind::AmpAssign => Some(CompoundOp::BitAnd),
            TokenKind::PipeAssign => Some(CompoundOp::BitOr),
            TokenKind::CaretAssign => Some(CompoundOp::BitXor),
            TokenKind::ShlAssign => Some(CompoundOp::Shl),
            TokenKind::ShrAssign => Some(CompoundOp::Shr),
            _ => return Ok(lhs),
        };
        if matches!(self.peek_kind(), TokenKind::Assign) {
            self.advance();
            let rhs = self.parse_assignment()?;
            return Ok(Expr { kind: ExprKind::Assign(Box::new(lhs), Box::new(rhs)), loc });
        }
        let op = op.unwrap();
        self.advance();
        let rhs = self.parse_assignment()?;
        Ok(Expr { kind: ExprKind::CompoundAssign(op, Box::new(lhs), Box::new(rhs)), loc })
    }

    fn parse_ternary(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        let cond = self.parse_logic_or()?;
        if self.bump_if(&TokenKind::Question) {
            let then_v = self.parse_assignment()?;
            self.expect(TokenKind::Colon, "':' in ternary expression")?;
            let else_v = self.parse_assignment()?;
            return Ok(Expr { kind: ExprKind::Ternary(Box::new(cond), Box::new(then_v), Box::new(else_v)), loc });
        }
        Ok(cond)
    }

    fn parse_logic_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_logic_and()?;
        while matches!(self.peek_kind(), TokenKind::OrOr) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_logic_and()?;
            lhs = Expr { kind: ExprKind::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_logic_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_or()?;
        while matches!(self.peek_kind(), TokenKind::AndAnd) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_bit_or()?;
            lhs = Expr { kind: ExprKind::Binary(BinOp::And, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_bit_or(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_xor()?;
        while matches!(self.peek_kind(), TokenKind::Pipe) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_bit_xor()?;
            lhs = Expr { kind: ExprKind::Binary(BinOp::BitOr, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_bit_xor(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_bit_and()?;
        while matches!(self.peek_kind(), TokenKind::Caret) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_bit_and()?;
            lhs = Expr { kind: ExprKind::Binary(BinOp::BitXor, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_bit_and(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_equality()?;
        while matches!(self.peek_kind(), TokenKind::Amp) {
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_equality()?;
            lhs = Expr { kind: ExprKind::Binary(BinOp::BitAnd, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_equality(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_relational()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::NotEq,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_relational()?;
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_relational(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_shift()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Less => BinOp::Less,
                TokenKind::LessEq => BinOp::LessEq,
                TokenKind::Greater => BinOp::Greater,
                TokenKind::GreaterEq => BinOp::GreaterEq,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_shift()?;
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_shift(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Shl => BinOp::Shl,
                TokenKind::Shr => BinOp::Shr,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_additive()?;
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_additive(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Plus => BinOp::Add,
                TokenKind::Minus => BinOp::Sub,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_multiplicative()?;
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> PResult<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek_kind() {
                TokenKind::Star => BinOp::Mul,
                TokenKind::Slash => BinOp::Div,
                TokenKind::Percent => BinOp::Mod,
                _ => break,
            };
            let loc = self.loc();
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr { kind: ExprKind::Binary(op, Box::new(lhs), Box::new(rhs)), loc };
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        let op = match self.peek_kind() {
            TokenKind::Minus => Some(UnOp::Neg),
            TokenKind::Bang => Some(UnOp::Not),
            TokenKind::Tilde => Some(UnOp::BitNot),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let operand = self.parse_unary()?;
            return Ok(Expr { kind: ExprKind::Unary(op, Box::new(operand)), loc });
        }
        match self.peek_kind() {
            TokenKind::PlusPlus => {
                self.advance();
                let e = self.parse_unary()?;
                return Ok(Expr { kind: ExprKind::IncDec(IncDecOp::Inc, Box::new(e), true), loc });
            }
            TokenKind::MinusMinus => {
                self.advance();
                let e = self.parse_unary()?;
                return Ok(Expr { kind: ExprKind::IncDec(IncDecOp::Dec, Box::new(e), true), loc });
            }
            TokenKind::Ref => {
                self.advance();
                let e = self.parse_unary()?;
                return Ok(Expr { kind: ExprKind::Ref(Box::new(e)), loc });
            }
            TokenKind::Unref => {
                self.advance();
                let e = self.parse_unary()?;
                return Ok(Expr { kind: ExprKind::Unref(Box::new(e)), loc });
            }
            TokenKind::Typeid => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after typeid")?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' after typeid operand")?;
                return Ok(Expr { kind: ExprKind::TypeId(Box::new(e)), loc });
            }
            TokenKind::Typeof => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after typeof")?;
                let ty = self.parse_type()?;
                self.expect(TokenKind::RParen, "')' after typeof operand")?;
                return Ok(Expr { kind: ExprKind::TypeOf(ty), loc });
            }
            TokenKind::Refid => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after refid")?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' after refid operand")?;
                return Ok(Expr { kind: ExprKind::RefId(Box::new(e)), loc });
            }
            TokenKind::IsAny => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after is_any")?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' after is_any operand")?;
                return Ok(Expr { kind: ExprKind::IsAny(Box::new(e)), loc });
            }
            TokenKind::IsArray => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after is_array")?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' after is_array operand")?;
                return Ok(Expr { kind: ExprKind::IsArray(Box::new(e)), loc });
            }
            TokenKind::IsStruct => {
                self.advance();
                self.expect(TokenKind::LParen, "'(' after is_struct")?;
                let e = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' after is_struct operand")?;
                return Ok(Expr { kind: ExprKind::IsStruct(Box::new(e)), loc });
            }
            TokenKind::New => {
                self.advance();
                let ty = self.parse_type()?;
                let mut dims = Vec::new();
                while self.bump_if(&TokenKind::LBracket) {
                    dims.push(self.parse_expr()?);
                    self.expect(TokenKind::RBracket, "']' to close array dimension")?;
                }
                return Ok(Expr { kind: ExprKind::New { ty, dims }, loc });
            }
            _ => {}
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            let loc = self.loc();
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let mut args = Vec::new();
                    if !self.check(&TokenKind::RParen) {
                        loop {
                            args.push(self.parse_expr()?);
                            if !self.bump_if(&TokenKind::Comma) {
                                break;
                            }
                        }
                    }
                    self.expect(TokenKind::RParen, "')' to close call arguments")?;
                    expr = Expr { kind: ExprKind::Call { callee: Box::new(expr), args }, loc };
                }
                TokenKind::LBracket => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(TokenKind::RBracket, "']' to close index expression")?;
                    expr = Expr { kind: ExprKind::Index(Box::new(expr), Box::new(index)), loc };
                }
                TokenKind::Dot => {
                    self.advance();
                    let name = self.expect_ident("field name")?;
                    expr = Expr { kind: ExprKind::Field(Box::new(expr), name), loc };
                }
                TokenKind::PlusPlus => {
                    self.advance();
                    expr = Expr { kind: ExprKind::IncDec(IncDecOp::Inc, Box::new(expr), false), loc };
                }
                TokenKind::MinusMinus => {
                    self.advance();
                    expr = Expr { kind: ExprKind::IncDec(IncDecOp::Dec, Box::new(expr), false), loc };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        match self.peek_kind().clone() {
            TokenKind::IntLit(v) => {
                self.advance();
                Ok(Expr { kind: ExprKind::IntLit(v), loc })
            }
            TokenKind::FloatLit(v) => {
                self.advance();
                Ok(Expr { kind: ExprKind::FloatLit(v), loc })
            }
            TokenKind::BoolLit(v) => {
                self.advance();
                Ok(Expr { kind: ExprKind::BoolLit(v), loc })
            }
            TokenKind::CharLit(v) => {
                self.advance();
                Ok(Expr { kind: ExprKind::CharLit(v), loc })
            }
            TokenKind::StringLit(v) => {
                self.advance();
                Ok(Expr { kind: ExprKind::StringLit(v), loc })
            }
            TokenKind::Null => {
                self.advance();
                Ok(Expr { kind: ExprKind::NullLit, loc })
            }
            TokenKind::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !self.check(&TokenKind::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.bump_if(&TokenKind::Comma) {
                            break;
                        }
                    }
                }
                self.expect(TokenKind::RBracket, "']' to close array literal")?;
                Ok(Expr { kind: ExprKind::ArrayLit(items), loc })
            }
            TokenKind::Func => self.parse_function_literal(),
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen, "')' to close parenthesized expression")?;
                Ok(inner)
            }
            TokenKind::Ident(id) => {
                self.advance();
                if self.check(&TokenKind::ColonColon) {
                    let mut path = vec![id];
                    while self.bump_if(&TokenKind::ColonColon) {
                        path.push(self.expect_ident("namespace-qualified name")?);
                    }
                    let name = path.pop().unwrap();
                    return Ok(Expr { kind: ExprKind::NsAccess(path, name), loc });
                }
                if self.check(&TokenKind::LBrace) && self.looks_like_struct_literal() {
                    return self.parse_struct_literal(id, loc);
                }
                Ok(Expr { kind: ExprKind::Identifier(id), loc })
            }
            _ => Err(self.unexpected("an expression")),
        }
    }

    /// Struct literals (`Point { x: 1, y: 2 }`) only appear where a brace
    /// cannot otherwise start a block, so callers gate this on already being
    /// inside expression position; field-name-then-colon is the only
    /// distinguishing lookahead needed here.
    fn looks_like_struct_literal(&self) -> bool {
        matches!(self.tokens.get(self.pos + 1).map(|t| &t.kind), Some(TokenKind::Ident(_)) | Some(TokenKind::RBrace))
    }

    fn parse_struct_literal(&mut self, ty: StringId, loc: CodeLoc) -> PResult<Expr> {
        self.advance(); // {
        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let name = self.expect_ident("field name")?;
            self.expect(TokenKind::Colon, "':' after field name")?;
            let value = self.parse_expr()?;
            fields.push((name, value));
            if !self.bump_if(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace, "'}' to close structure literal")?;
        Ok(Expr { kind: ExprKind::StructLit { ty, fields }, loc })
    }

    fn parse_function_literal(&mut self) -> PResult<Expr> {
        let loc = self.loc();
        self.advance(); // func
        self.expect(TokenKind::LParen, "'(' after func")?;
        let mut params = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                params.push(self.parse_param()?);
                if !self.bump_if(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::RParen, "')' to close parameter list")?;
        let ret = if self.bump_if(&TokenKind::Colon) { self.parse_type()? } else { TypeRef::Void };
        self.expect(TokenKind::LBrace, "'{' to open function body")?;
        let body = self.parse_block_stmts()?;
        Ok(Expr { kind: ExprKind::FunctionLit { params, ret, body }, loc })
    }
}

/// Convenience entry point: lex + parse one source file.
pub fn parse_source(source: &str, interner: &mut InternerBuilder) -> PResult<ParsedFile> {
    let tokens = crate::lexer::Lexer::new(source, interner).tokenize()?;
    Parser::new(tokens, interner).parse_file()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(src: &str) -> ParsedFile {
        let mut interner = InternerBuilder::new();
        parse_source(src, &mut interner).expect("parse should succeed")
    }

    #[test]
    fn parses_minimal_program() {
        let file = parse("let x: int = 1 + 2 * 3;");
        assert_eq!(file.unit.top_level.len(), 1);
        assert!(matches!(file.unit.top_level[0].kind, StmtKind::VarDecl { .. }));
    }

    #[test]
    fn precedence_groups_multiplication_tighter_than_addition() {
        let file = parse("let x = 1 + 2 * 3;");
        let StmtKind::VarDecl { init: Some(e), .. } = &file.unit.top_level[0].kind else {
            panic!("expected var decl with init");
        };
        match &e.kind {
            ExprKind::Binary(BinOp::Add, lhs, rhs) => {
                assert!(matches!(lhs.kind, ExprKind::IntLit(1)));
                assert!(matches!(rhs.kind, ExprKind::Binary(BinOp::Mul, _, _)));
            }
            other => panic!("expected top-level add, got {other:?}"),
        }
    }

    #[test]
    fn bitwise_xor_is_left_associative() {
        let file = parse("let x = 2 ^ 3 ^ 2;");
        let StmtKind::VarDecl { init: Some(e), .. } = &file.unit.top_level[0].kind else {
            panic!("expected var decl with init");
        };
        match &e.kind {
            ExprKind::Binary(BinOp::BitXor, lhs, rhs) => {
                assert!(matches!(lhs.kind, ExprKind::Binary(BinOp::BitXor, _, _)));
                assert!(matches!(rhs.kind, ExprKind::IntLit(2)));
            }
            other => panic!("expected top-level xor, got {other:?}"),
        }
    }

    #[test]
    fn parses_function_with_params_and_return_type() {
        let file = parse("func add(a: int, b: int): int { return a + b; }");
        assert_eq!(file.functions.len(), 1);
        assert_eq!(file.functions[0].params.len(), 2);
        assert!(matches!(file.functions[0].ret, TypeRef::Int));
    }

    #[test]
    fn parses_struct_with_fields() {
        let file = parse("struct Point { x: int; y: int = 0; }");
        assert_eq!(file.structs.len(), 1);
        assert_eq!(file.structs[0].fields.len(), 2);
    }

    #[test]
    fn parses_foreach_over_array() {
        let file = parse("foreach (item in items) { print(item); }");
        assert!(matches!(file.unit.top_level[0].kind, StmtKind::Foreach { .. }));
    }

    #[test]
    fn parses_try_catch() {
        let file = parse("try { throw 1; } catch (e) { print(e); }");
        assert!(matches!(file.unit.top_level[0].kind, StmtKind::Try { .. }));
    }

    #[test]
    fn reports_location_on_missing_semicolon() {
        let mut interner = InternerBuilder::new();
        let err = parse_source("let x = 1", &mut interner).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedEof { .. }));
    }
}

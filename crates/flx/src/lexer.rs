//! Hand-written lexer: turns source text into a `Vec<Token>`.
//!
//! Single forward pass over `Vec<char>`, one character of lookahead beyond
//! the current position for the handful of two-character operators. Keywords
//! are recognized by exact match after scanning a full identifier, matching
//! the "maximal munch" rule used throughout the grammar.

use crate::error::{CodeLoc, LexError};
use crate::intern::{InternerBuilder, StringId};
use crate::token::{PrimitiveKw, Token, TokenKind};

pub struct Lexer<'a> {
    chars: Vec<char>,
    pos: usize,
    line: u32,
    col: u32,
    interner: &'a mut InternerBuilder,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &str, interner: &'a mut InternerBuilder) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
            interner,
        }
    }

    pub fn tokenize(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_trivia()?;
            let loc = self.loc();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, loc));
                break;
            };
            let kind = if c.is_ascii_digit() {
                self.lex_number()?
            } else if c == '"' {
                self.lex_string()?
            } else if c == '\'' {
                self.lex_char()?
            } else if is_ident_start(c) {
                self.lex_ident_or_keyword()
            } else {
                self.lex_operator()?
            };
            tokens.push(Token::new(kind, loc));
        }
        Ok(tokens)
    }

    fn loc(&self) -> CodeLoc {
        CodeLoc::new(self.line, self.col)
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn bump_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while !matches!(self.peek(), None | Some('\n')) {
                        self.advance();
                    }
                }
                Some('/') if self.peek_at(1) == Some('*') => {
                    let start = self.loc();
                    self.advance();
                    self.advance();
                    loop {
                        match self.peek() {
                            None => return Err(LexError::UnterminatedComment { at: start }),
                            Some('*') if self.peek_at(1) == Some('/') => {
                                self.advance();
                                self.advance();
                                break;
                            }
                            Some(_) => {
                                self.advance();
                            }
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(())
    }

    fn lex_number(&mut self) -> Result<TokenKind, LexError> {
        let start_loc = self.loc();
        let mut text = String::new();
        let mut is_float = false;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            text.push(self.advance().unwrap());
        }
        if self.peek() == Some('.') && matches!(self.peek_at(1), Some(c) if c.is_ascii_digit()) {
            is_float = true;
            text.push(self.advance().unwrap());
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                text.push(self.advance().unwrap());
            }
        }
        if matches!(self.peek(), Some('e') | Some('E')) {
            let mut lookahead = 1;
            if matches!(self.peek_at(1), Some('+') | Some('-')) {
                lookahead = 2;
            }
            if matches!(self.peek_at(lookahead), Some(c) if c.is_ascii_digit()) {
                is_float = true;
                text.push(self.advance().unwrap());
                if matches!(self.peek(), Some('+') | Some('-')) {
                    text.push(self.advance().unwrap());
                }
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    text.push(self.advance().unwrap());
                }
            }
        }
        if is_float {
            text.parse::<f64>()
                .map(TokenKind::FloatLit)
                .map_err(|_| LexError::InvalidNumber { text, at: start_loc })
        } else {
            text.parse::<i64>()
                .map(TokenKind::IntLit)
                .map_err(|_| LexError::InvalidNumber { text, at: start_loc })
        }
    }

    fn lex_string(&mut self) -> Result<TokenKind, LexError> {
        let start_loc = self.loc();
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.advance() {
                None => return Err(LexError::UnterminatedString { at: start_loc }),
                Some('"') => break,
                Some('\\') => s.push(self.lex_escape(start_loc)?),
                Some(c) => s.push(c),
            }
        }
        Ok(TokenKind::StringLit(s))
    }

    fn lex_char(&mut self) -> Result<TokenKind, LexError> {
        let start_loc = self.loc();
        self.advance(); // opening quote
        let c = match self.advance() {
            None => return Err(LexError::UnterminatedString { at: start_loc }),
            Some('\\') => self.lex_escape(start_loc)?,
            Some(c) => c,
        };
        if !self.bump_if('\'') {
            return Err(LexError::UnterminatedString { at: start_loc });
        }
        Ok(TokenKind::CharLit(c))
    }

    fn lex_escape(&mut self, start_loc: CodeLoc) -> Result<char, LexError> {
        let c = self.advance().ok_or(LexError::UnterminatedString { at: start_loc })?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            other => return Err(LexError::InvalidEscape { ch: other, at: start_loc }),
        })
    }

    fn lex_ident_or_keyword(&mut self) -> TokenKind {
        let mut text = String::new();
        while matches!(self.peek(), Some(c) if is_ident_continue(c)) {
            text.push(self.advance().unwrap());
        }
        keyword(&text).unwrap_or_else(|| TokenKind::Ident(self.interner.intern(&text)))
    }

    fn lex_operator(&mut self) -> Result<TokenKind, LexError> {
        let loc = self.loc();
        let c = self.advance().unwrap();
        Ok(match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            ';' => TokenKind::Semicolon,
            ',' => TokenKind::Comma,
            '?' => TokenKind::Question,
            '.' => TokenKind::Dot,
            ':' => {
                if self.bump_if(':') {
                    TokenKind::ColonColon
                } else {
                    TokenKind::Colon
                }
            }
            '+' => {
                if self.bump_if('+') {
                    TokenKind::PlusPlus
                } else if self.bump_if('=') {
                    TokenKind::PlusAssign
                } else {
                    TokenKind::Plus
                }
            }
            '-' => {
                if self.bump_if('-') {
                    TokenKind::MinusMinus
                } else if self.bump_if('=') {
                    TokenKind::MinusAssign
                } else if self.bump_if('>') {
                    TokenKind::Arrow
                } else {
                    TokenKind::Minus
                }
            }
            '*' => {
                if self.bump_if('=') {
                    TokenKind::StarAssign
                } else {
                    TokenKind::Star
                }
            }
            '/' => {
                if self.bump_if('=') {
                    TokenKind::SlashAssign
                } else {
                    TokenKind::Slash
                }
            }
            '%' => {
                if self.bump_if('=') {
                    TokenKind::PercentAssign
                } else {
                    TokenKind::Percent
                }
            }
            '^' => {
                if self.bump_if('=') {
                    TokenKind::CaretAssign
                } else {
                    TokenKind::Caret
                }
            }
            '~' => TokenKind::Tilde,
            '&' => {
                if self.bump_if('&') {
                    TokenKind::AndAnd
                } else if self.bump_if('=') {
                    TokenKind::AmpAssign
                } else {
                    TokenKind::Amp
                }
            }
            '|' => {
                if self.bump_if('|') {
                    TokenKind::OrOr
                } else if self.bump_if('=') {
                    TokenKind::PipeAssign
                } else {
                    TokenKind::Pipe
                }
            }
            '!' => {
                if self.bump_if('=') {
                    TokenKind::NotEq
                } else {
                    TokenKind::Bang
                }
            }
            '=' => {
                if self.bump_if('=') {
                    TokenKind::EqEq
                } else {
                    TokenKind::Assign
                }
            }
            '<' => {
                if self.bump_if('<') {
                    if self.bump_if('=') {
                        TokenKind::ShlAssign
                    } else {
                        TokenKind::Shl
                    }
                } else if self.bump_if('=') {
                    TokenKind::LessEq
                } else {
                    TokenKind::Less
                }
            }
            '>' => {
                if self.bump_if('>') {
                    if self.bump_if('=') {
                        TokenKind::ShrAssign
                    } else {
                        TokenKind::Shr
                    }
                } else if self.bump_if('=') {
                    TokenKind::GreaterEq
                } else {
                    TokenKind::Greater
                }
            }
            other => return Err(LexError::UnexpectedChar { ch: other, at: loc }),
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

fn keyword(text: &str) -> Option<TokenKind> {
    Some(match text {
        "using" => TokenKind::Using,
        "namespace" => TokenKind::Namespace,
        "include" => TokenKind::Include,
        "exclude" => TokenKind::Exclude,
        "let" => TokenKind::Let,
        "const" => TokenKind::Const,
        "func" => TokenKind::Func,
        "struct" => TokenKind::Struct,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "foreach" => TokenKind::Foreach,
        "in" => TokenKind::In,
        "do" => TokenKind::Do,
        "switch" => TokenKind::Switch,
        "case" => TokenKind::Case,
        "default" => TokenKind::Default,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "return" => TokenKind::Return,
        "exit" => TokenKind::Exit,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "throw" => TokenKind::Throw,
        "new" => TokenKind::New,
        "null" => TokenKind::Null,
        "void" => TokenKind::Void,
        "any" => TokenKind::Any,
        "bool" => TokenKind::TypeKw(PrimitiveKw::Bool),
        "int" => TokenKind::TypeKw(PrimitiveKw::Int),
        "float" => TokenKind::TypeKw(PrimitiveKw::Float),
        "char" => TokenKind::TypeKw(PrimitiveKw::Char),
        "string" => TokenKind::TypeKw(PrimitiveKw::String),
        "true" => TokenKind::BoolLit(true),
        "false" => TokenKind::BoolLit(false),
        "ref" => TokenKind::Ref,
        "unref" => TokenKind::Unref,
        "typeid" => TokenKind::Typeid,
        "typeof" => TokenKind::Typeof,
        "refid" => TokenKind::Refid,
        "is_any" => TokenKind::IsAny,
        "is_array" => TokenKind::IsArray,
        "is_struct" => TokenKind::IsStruct,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenKind> {
        let mut interner = InternerBuilder::new();
        Lexer::new(src, &mut interner)
            .tokenize()
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn lexes_let_declaration() {
        let kinds = lex("let x: int = 1 + 2;");
        assert!(matches!(kinds[0], TokenKind::Let));
        assert!(matches!(kinds[1], TokenKind::Ident(_)));
        assert_eq!(kinds[2], TokenKind::Colon);
        assert!(matches!(kinds[3], TokenKind::TypeKw(PrimitiveKw::Int)));
        assert_eq!(kinds[4], TokenKind::Assign);
        assert_eq!(kinds[5], TokenKind::IntLit(1));
        assert_eq!(kinds[6], TokenKind::Plus);
        assert_eq!(kinds[7], TokenKind::IntLit(2));
        assert_eq!(kinds[8], TokenKind::Semicolon);
    }

    #[test]
    fn lexes_two_char_operators_before_one_char() {
        let kinds = lex("a <= b && c >= d");
        assert!(kinds.contains(&TokenKind::LessEq));
        assert!(kinds.contains(&TokenKind::AndAnd));
        assert!(kinds.contains(&TokenKind::GreaterEq));
    }

    #[test]
    fn rejects_unterminated_string() {
        let mut interner = InternerBuilder::new();
        let err = Lexer::new("\"abc", &mut interner).tokenize().unwrap_err();
        assert!(matches!(err, LexError::UnterminatedString { .. }));
    }

    #[test]
    fn skips_line_and_block_comments() {
        let kinds = lex("// comment\nlet x = 1; /* block */ let y = 2;");
        assert_eq!(kinds.iter().filter(|k| matches!(k, TokenKind::Let)).count(), 2);
    }
}

//! Top-level driver tying the loader, analyzer and both execution engines
//! together behind one call, so `flx-cli` (and embedders/tests) don't have
//! to re-derive the load → analyze → execute pipeline order themselves.
//!
//! Grounded on the teacher's `Executor` (`run.rs`): a struct that owns the
//! loaded program and exposes a handful of `run_*` methods rather than one
//! function with every parameter threaded through it. Resource tracking,
//! snapshotting and external-function calls are the teacher's concerns, not
//! this crate's (see spec Non-goals: sandboxing, concurrent execution); what
//! is kept is the shape — parse once, run many ways, fixed output seam.

use crate::analyzer;
use crate::bytecode::{compile_program_with_host, Vm, VmOutcome};
use crate::error::FlxError;
use crate::evaluator::{EvalOutcome, Evaluator};
use crate::host::HostRegistry;
use crate::io::{PrintWriter, StdPrint};
use crate::program::Program;
use crate::resolver::{load_program, SourceLoader};
use std::rc::Rc;

/// Which of the two execution engines described in `§4.5`/`§4.6` to run a
/// loaded program with. Both engines are required to agree on every
/// outcome; this enum is how a caller (the CLI's `-e ast|vm` flag, or a
/// test asserting both engines agree) picks one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Ast,
    Vm,
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ast" => Ok(Engine::Ast),
            "vm" => Ok(Engine::Vm),
            other => Err(format!("unknown engine '{other}', expected 'ast' or 'vm'")),
        }
    }
}

/// A loaded, analyzed program ready to run with either engine. Loading and
/// analysis happen once in `Executor::load`; `run`/`run_with_output` can be
/// called any number of times afterward (once per engine, for example, to
/// cross-check the two agree).
pub struct Executor {
    program: Program,
    host: Rc<HostRegistry>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor").field("program", &self.program).finish()
    }
}

impl Executor {
    /// Loads `entry` (and everything it transitively `using`s) through
    /// `loader`, then runs semantic analysis. Neither engine is invoked
    /// yet — a program that fails analysis never gets as far as `run`.
    pub fn load(loader: &dyn SourceLoader, entry: &str) -> Result<Self, FlxError> {
        Self::load_with_host(loader, entry, Rc::new(HostRegistry::with_std()))
    }

    /// As `load`, but against a caller-supplied host registry, for
    /// embedders that register additional `HostModule`s beyond `flx.std.io`.
    pub fn load_with_host(loader: &dyn SourceLoader, entry: &str, host: Rc<HostRegistry>) -> Result<Self, FlxError> {
        let program = load_program(loader, entry)?;
        analyzer::analyze(&program, &host)?;
        Ok(Self { program, host })
    }

    pub fn program(&self) -> &Program {
        &self.program
    }

    pub fn host(&self) -> &Rc<HostRegistry> {
        &self.host
    }

    /// Runs the program with `engine`, printing host `print`/`println`
    /// output straight to stdout, and returns the process exit code: the
    /// `exit(n)` argument if one was reached, `0` if the program ran to
    /// completion without one, or `1` if it faulted with an uncaught
    /// runtime error — matching §6's exit-code rule.
    pub fn run(&self, engine: Engine) -> Result<i32, FlxError> {
        self.run_with_output(engine, Box::new(StdPrint))
    }

    /// As `run`, but with host `print`/`println` output directed through
    /// `out` instead of stdout — what the REPL and tests use to capture
    /// program output without touching the real console.
    pub fn run_with_output(&self, engine: Engine, out: Box<dyn PrintWriter>) -> Result<i32, FlxError> {
        match engine {
            Engine::Ast => self.run_ast(out),
            Engine::Vm => self.run_vm(out),
        }
    }

    fn run_ast(&self, out: Box<dyn PrintWriter>) -> Result<i32, FlxError> {
        let mut eval = Evaluator::with_output(&self.program, Rc::clone(&self.host), out);
        match eval.run()? {
            EvalOutcome::Completed => Ok(0),
            EvalOutcome::Exited(code) => Ok(code),
        }
    }

    fn run_vm(&self, out: Box<dyn PrintWriter>) -> Result<i32, FlxError> {
        let compiled = compile_program_with_host(&self.program, &self.host)?;
        let mut vm = Vm::with_host(&compiled, &self.program, Rc::clone(&self.host), out);
        match vm.run()? {
            VmOutcome::Completed => Ok(0),
            VmOutcome::Exited(code) => Ok(code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::CollectStringPrint;
    use crate::resolver::MemoryLoader;

    fn run_both(src: &'static str) -> (i32, i32) {
        let loader = MemoryLoader::new([("main", src)]);
        let executor = Executor::load(&loader, "main").unwrap();
        let ast = executor.run(Engine::Ast).unwrap();
        let vm = executor.run(Engine::Vm).unwrap();
        (ast, vm)
    }

    #[test]
    fn both_engines_agree_on_a_seed_scenario() {
        let src = "func main(): int { return 2 + 3 * 4; } exit(main());";
        assert_eq!(run_both(src), (14, 14));
    }

    #[test]
    fn a_program_with_no_exit_call_returns_zero() {
        assert_eq!(run_both("let x = 1 + 1;"), (0, 0));
    }

    #[test]
    fn an_uncaught_runtime_error_surfaces_as_a_flx_error() {
        let loader = MemoryLoader::new([("main", "let a = [1]; let b = a[9];")]);
        let executor = Executor::load(&loader, "main").unwrap();
        let err = executor.run(Engine::Ast).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn a_semantic_error_is_reported_at_load_time_not_run_time() {
        let loader = MemoryLoader::new([("main", r#"let x: int = "oops";"#)]);
        let err = Executor::load(&loader, "main").unwrap_err();
        assert!(matches!(err, FlxError::Semantic(_)));
    }

    #[test]
    fn host_output_is_captured_through_a_custom_print_writer() {
        let loader = MemoryLoader::new([("main", r#"println("hi"); exit(0);"#)]);
        let executor = Executor::load(&loader, "main").unwrap();
        let code = executor.run_with_output(Engine::Ast, Box::new(CollectStringPrint::default())).unwrap();
        assert_eq!(code, 0);
    }
}

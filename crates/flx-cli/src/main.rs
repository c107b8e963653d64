//! `flx`: run a program file, or drop into an interactive REPL when no main
//! file is given.
//!
//! Grounded on the teacher's `monty-cli` binary (read the file, hand it to
//! the library, report success/failure with elapsed timing) but driven by
//! `clap`'s derive API rather than hand-rolled `env::args()` indexing, and
//! routed through `flx::run::Executor` instead of `monty`'s
//! snapshot/external-function-call resume loop, which has no counterpart
//! here (see `flx::run`'s module doc: sandboxing and concurrent execution
//! are out of scope).

mod loader;
mod repl;

use clap::Parser;
use flx::{disassemble, Engine, Executor, FlxError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use loader::{FsLoader, ENTRY_KEY};

/// flx: tree-walking and bytecode engines for the flx scripting language.
#[derive(Parser)]
#[command(name = "flx", about = "Run or explore a flx program")]
struct Cli {
    /// Enable debug-mode output: a bytecode dump (when run with the VM
    /// engine) plus elapsed wall-clock timing.
    #[arg(short, long)]
    debug: bool,

    /// Which execution engine to run the program with.
    #[arg(short, long, default_value = "ast")]
    engine: String,

    /// Project root used to resolve `using` imports. Defaults to the
    /// current directory.
    #[arg(short, long, default_value = ".")]
    workspace: PathBuf,

    /// Main source file, relative to the workspace. Omit to start the REPL.
    #[arg(short, long)]
    main: Option<PathBuf>,

    /// Additional source file to compile alongside the main file. Repeatable.
    #[arg(short, long = "source")]
    source: Vec<PathBuf>,

    /// Everything after the recognized flags, bound to the program's global
    /// `cpargs` array.
    #[arg(trailing_var_arg = true)]
    program_args: Vec<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let engine = match cli.engine.parse::<Engine>() {
        Ok(e) => e,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
    };

    let Some(main_path) = &cli.main else {
        repl::run(cli.workspace, None, engine);
        return ExitCode::SUCCESS;
    };

    let entry_source = match assemble_entry(&cli.workspace, main_path, &cli.source, &cli.program_args) {
        Ok(src) => src,
        Err(msg) => {
            eprintln!("error: {msg}");
            return ExitCode::FAILURE;
        }
    };

    let loader = FsLoader { entry_source, workspace: cli.workspace.clone(), stdlib_root: None };
    let executor = match Executor::load(&loader, ENTRY_KEY) {
        Ok(e) => e,
        Err(e) => return report(e),
    };

    if cli.debug {
        print_bytecode_dump(&executor);
    }

    let start = Instant::now();
    match executor.run(engine) {
        Ok(code) => {
            if cli.debug {
                eprintln!("ran in {:?}, exit code {code}", start.elapsed());
            }
            exit_code(code)
        }
        Err(e) => {
            if cli.debug {
                eprintln!("failed after {:?}", start.elapsed());
            }
            report(e)
        }
    }
}

/// Reads the main file and every `-s/--source` file, prepends a `cpargs`
/// global declaration built from `program_args`, and concatenates all of it
/// into one entry unit. `flx`'s resolver only discovers units reachable via
/// `using`, and `-s` files aren't `using`d from anywhere, so folding them
/// into the entry text is the simplest faithful reading of "additional
/// source file" that doesn't require inventing a synthetic `using` path per
/// flag.
fn assemble_entry(workspace: &std::path::Path, main_path: &PathBuf, sources: &[PathBuf], program_args: &[String]) -> Result<String, String> {
    let mut text = cpargs_preamble(program_args);
    for extra in sources {
        text.push_str(&read_relative(workspace, extra)?);
        text.push('\n');
    }
    text.push_str(&read_relative(workspace, main_path)?);
    Ok(text)
}

fn read_relative(workspace: &std::path::Path, path: &std::path::Path) -> Result<String, String> {
    let full = if path.is_absolute() { path.to_path_buf() } else { workspace.join(path) };
    std::fs::read_to_string(&full).map_err(|e| format!("reading {}: {e}", full.display()))
}

fn cpargs_preamble(program_args: &[String]) -> String {
    let items: Vec<String> = program_args.iter().map(|a| format!("\"{}\"", escape(a))).collect();
    format!("let cpargs = [{}];\n", items.join(", "))
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn print_bytecode_dump(executor: &Executor) {
    let compiled = match flx::compile_program_with_host(executor.program(), executor.host()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("could not compile for bytecode dump: {e}");
            return;
        }
    };
    let names = &executor.program().interns;
    println!("; main");
    println!("{}", disassemble(&compiled.main, names));
    for (i, code) in compiled.functions.iter().enumerate() {
        println!("; function {i}");
        println!("{}", disassemble(code, names));
    }
}

fn report(err: FlxError) -> ExitCode {
    eprintln!("{err}");
    exit_code(err.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    u8::try_from(code.rem_euclid(256)).map(ExitCode::from).unwrap_or(ExitCode::FAILURE)
}

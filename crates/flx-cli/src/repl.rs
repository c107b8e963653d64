//! Interactive REPL loop, grounded on the shape of the teacher's
//! `monty::repl` (a stateful session that feeds snippets through the same
//! load/analyze/run pipeline normal execution uses) but simplified: `flx`'s
//! `Program`/`Evaluator` have no incremental "seed parsing from existing
//! interns" path the way monty's namespace model does, so rather than
//! rebuild that subsystem for the REPL alone, each input re-runs the whole
//! accumulated session source from scratch and only the *new* captured
//! output is shown — `committed_output` is always a byte-for-byte prefix of
//! the next run's output because re-running the same deterministic prefix
//! produces the same output, so the suffix is exactly what the new input
//! produced.
//!
//! A line with no `;` anywhere is treated as a bare expression: it is
//! wrapped in a `println(...)` call, run, and its output shown, but *not*
//! committed to the session — entering the same expression twice re-reads
//! session state rather than redeclaring it. A line containing `;` is
//! committed permanently once it runs clean.

use flx::{Engine, Executor};
use std::io::{self, Write};
use std::path::Path;

use crate::loader::{FsLoader, ENTRY_KEY};

const HELP_TEXT: &str = "\
#help          show this message
#load <path>   read a file into the session and run it
#clear         discard all session state
#quit          exit the REPL";

pub fn run(workspace: std::path::PathBuf, stdlib_root: Option<std::path::PathBuf>, engine: Engine) {
    println!("flx REPL — #help for commands, #quit to exit");
    let mut session = String::new();
    let mut committed_len = 0usize;
    let stdin = io::stdin();

    loop {
        print!("flx> ");
        let _ = io::stdout().flush();
        let Some(first_line) = read_line(&stdin) else {
            println!();
            break;
        };
        let trimmed = first_line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(command) = trimmed.strip_prefix('#') {
            if handle_command(command, &mut session, &mut committed_len, &workspace, &stdlib_root, engine) {
                break;
            }
            continue;
        }

        let mut input = first_line;
        let mut depth = brace_delta(&input);
        while depth > 0 {
            print!("....> ");
            let _ = io::stdout().flush();
            let Some(next) = read_line(&stdin) else {
                break;
            };
            depth += brace_delta(&next);
            input.push('\n');
            input.push_str(&next);
        }

        run_snippet(&input, &mut session, &mut committed_len, &workspace, &stdlib_root, engine);
    }
}

fn read_line(stdin: &io::Stdin) -> Option<String> {
    let mut line = String::new();
    match stdin.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim_end_matches(['\n', '\r']).to_string()),
        Err(_) => None,
    }
}

fn brace_delta(line: &str) -> i32 {
    line.chars().fold(0, |acc, c| match c {
        '{' => acc + 1,
        '}' => acc - 1,
        _ => acc,
    })
}

/// Handles a `#`-command. Returns `true` if the REPL should exit.
fn handle_command(
    command: &str,
    session: &mut String,
    committed_len: &mut usize,
    workspace: &Path,
    stdlib_root: &Option<std::path::PathBuf>,
    engine: Engine,
) -> bool {
    let mut parts = command.splitn(2, char::is_whitespace);
    match parts.next().unwrap_or("") {
        "help" => {
            println!("{HELP_TEXT}");
            false
        }
        "quit" => true,
        "clear" => {
            session.clear();
            *committed_len = 0;
            println!("session cleared");
            false
        }
        "load" => {
            let Some(path) = parts.next().map(str::trim).filter(|p| !p.is_empty()) else {
                eprintln!("usage: #load <path>");
                return false;
            };
            match std::fs::read_to_string(path) {
                Ok(text) => run_snippet(&text, session, committed_len, workspace, stdlib_root, engine),
                Err(e) => eprintln!("error reading {path}: {e}"),
            }
            false
        }
        other => {
            eprintln!("unknown command '#{other}', try #help");
            false
        }
    }
}

/// Runs `input` against `session`'s accumulated source, printing whatever
/// new output it produces. Expression-shaped input (no `;`) is wrapped in a
/// `println` and never committed; statement-shaped input is committed only
/// once it runs without error.
fn run_snippet(
    input: &str,
    session: &mut String,
    committed_len: &mut usize,
    workspace: &Path,
    stdlib_root: &Option<std::path::PathBuf>,
    engine: Engine,
) {
    let is_expression = !input.contains(';');
    let candidate = if is_expression {
        format!("{session}\nprintln({});\n", input.trim())
    } else {
        format!("{session}\n{input}\n")
    };

    let loader =
        FsLoader { entry_source: candidate.clone(), workspace: workspace.to_path_buf(), stdlib_root: stdlib_root.clone() };
    let executor = match Executor::load(&loader, ENTRY_KEY) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    let captured = match run_capturing(&executor, engine) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };

    if captured.len() >= *committed_len {
        print!("{}", &captured[*committed_len..]);
        let _ = io::stdout().flush();
    }
    if !is_expression {
        *session = candidate;
        *committed_len = captured.len();
    }
}

/// `run_with_output` takes ownership of the `PrintWriter` and returns only
/// the exit code, so capturing the text it wrote needs a writer that shares
/// its buffer with the caller rather than `CollectStringPrint`, which is
/// consumed whole.
fn run_capturing(executor: &Executor, engine: Engine) -> Result<String, flx::FlxError> {
    let buffer = std::rc::Rc::new(std::cell::RefCell::new(String::new()));
    let writer = SharedCapture(std::rc::Rc::clone(&buffer));
    executor.run_with_output(engine, Box::new(writer))?;
    let result = buffer.borrow().clone();
    Ok(result)
}

struct SharedCapture(std::rc::Rc<std::cell::RefCell<String>>);

impl flx::PrintWriter for SharedCapture {
    fn write_str(&mut self, s: &str) {
        self.0.borrow_mut().push_str(s);
    }
}

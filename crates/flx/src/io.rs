//! Print output boundary for host built-ins.
//!
//! Mirrors the teacher's `io::PrintWriter` seam (threaded through `run.rs`
//! and `repl.rs` there): execution never writes to stdout directly, so a
//! caller embedding this crate can capture or redirect program output.

use std::io::Write as _;

pub trait PrintWriter {
    fn write_str(&mut self, s: &str);
}

/// Writes straight to stdout, unbuffered beyond what `std::io::Stdout` does.
pub struct StdPrint;

impl PrintWriter for StdPrint {
    fn write_str(&mut self, s: &str) {
        print!("{s}");
        let _ = std::io::stdout().flush();
    }
}

/// Discards everything written to it.
pub struct NoPrint;

impl PrintWriter for NoPrint {
    fn write_str(&mut self, _s: &str) {}
}

/// Collects everything written to it into an owned `String`, for tests and
/// embedders that want to assert on program output.
#[derive(Debug, Default)]
pub struct CollectStringPrint(pub String);

impl PrintWriter for CollectStringPrint {
    fn write_str(&mut self, s: &str) {
        self.0.push_str(s);
    }
}

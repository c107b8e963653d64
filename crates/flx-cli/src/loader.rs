//! Filesystem-backed `SourceLoader`, the CLI's collaborator for `flx`'s
//! resolver (which only knows about `SourceLoader`, never the filesystem
//! directly — see `flx::resolver`).
//!
//! One synthetic path, [`ENTRY_KEY`], is reserved for the already-assembled
//! entry text `main.rs` builds (the main file plus any `-s/--source` files
//! and the `cpargs` preamble); every other `using`-triggered lookup resolves
//! against `workspace`, falling back to `stdlib_root` when given.

use flx::{LoadError, SourceLoader};
use std::fs;
use std::path::PathBuf;

pub const ENTRY_KEY: &str = "__entry__";

pub struct FsLoader {
    pub entry_source: String,
    pub workspace: PathBuf,
    pub stdlib_root: Option<PathBuf>,
}

impl FsLoader {
    fn candidate_paths(&self, dotted_path: &str) -> Vec<PathBuf> {
        let relative = format!("{}.flx", dotted_path.replace("::", "/"));
        let mut candidates = vec![self.workspace.join(&relative)];
        if let Some(root) = &self.stdlib_root {
            candidates.push(root.join(&relative));
        }
        candidates
    }
}

impl SourceLoader for FsLoader {
    fn load(&self, dotted_path: &str) -> Result<(String, String), LoadError> {
        if dotted_path == ENTRY_KEY {
            return Ok((ENTRY_KEY.to_string(), self.entry_source.clone()));
        }
        for path in self.candidate_paths(dotted_path) {
            match fs::read_to_string(&path) {
                Ok(text) => return Ok((dotted_path.to_string(), text)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(LoadError::Io { path: path.display().to_string(), message: e.to_string() }),
            }
        }
        Err(LoadError::NotFound { path: dotted_path.to_string() })
    }
}

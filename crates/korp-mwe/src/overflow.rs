use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use korp_types::Candidate;

/// Append-only diagnostic log for sentences abandoned by the combination
/// cutoff. Each abandoned sentence contributes one block: a separator line
/// followed by its pending candidate lists, space-joined, one per line.
///
/// Appends are serialized behind a mutex so blocks from concurrently
/// processed sentences cannot interleave. Write failures are reported at
/// warn level and otherwise ignored; losing a diagnostic block must never
/// fail the caller.
#[derive(Debug)]
pub struct OverflowLog {
    path: PathBuf,
    writer: Mutex<()>,
}

const BLOCK_SEPARATOR: &str = "------------------";

impl OverflowLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one block describing the pending candidate lists of an
    /// abandoned sentence.
    pub fn append(&self, pending: &[Vec<Candidate>]) {
        let guard = self.writer.lock();
        let _guard = guard.unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(err) = self.write_block(pending) {
            warn!(
                "failed to append overflow block to {}: {err}",
                self.path.display()
            );
        }
    }

    fn write_block(&self, pending: &[Vec<Candidate>]) -> std::io::Result<()> {
        let mut block = String::from(BLOCK_SEPARATOR);
        block.push('\n');
        for list in pending {
            let line = list
                .iter()
                .map(Candidate::raw)
                .collect::<Vec<_>>()
                .join(" ");
            block.push_str(&line);
            block.push('\n');
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(block.as_bytes())
    }
}

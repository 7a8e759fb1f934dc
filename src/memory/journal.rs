//! Backing-store journal.
//!
//! Append-only, human-readable trace of paging activity. The file is
//! truncated when the memory manager is created and every swap is recorded
//! as one line. Callers append under the memory-manager lock, so file order
//! matches the logical order of evictions and loads.
//!
//! Write failures are swallowed: the journal is a pure side-effect log and
//! never influences in-memory state.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use log::warn;

pub struct Journal {
    file: Option<File>,
}

impl Journal {
    /// Creates (truncating) the journal file at `path`.
    pub fn create(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let file = match File::create(path) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!("could not create backing store {}: {}", path.display(), err);
                None
            }
        };
        Self { file }
    }

    pub fn swap_out(&mut self, pid: u32, page: u32, frame: usize) {
        self.append(format_args!("SwapOut: PID {pid} Page {page} from Frame {frame}"));
    }

    pub fn swap_in(&mut self, pid: u32, page: u32, frame: usize) {
        self.append(format_args!("SwapIn: PID {pid} Page {page} into Frame {frame}"));
    }

    fn append(&mut self, line: std::fmt::Arguments<'_>) {
        if let Some(file) = self.file.as_mut() {
            if let Err(err) = writeln!(file, "{line}") {
                warn!("backing store write failed: {err}");
            }
        }
    }
}

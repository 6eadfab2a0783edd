//! Append-only audit log of probe outcomes.
//!
//! Each record is one `write_all` of a complete formatted entry on a file
//! opened in create-or-append mode. Probes run on independent threads and
//! each performs its own open/append/close cycle, so records never
//! interleave partially.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::probe::TestResult;

/// Terminates every audit record.
pub const RECORD_DELIMITER: &str = "---";

/// Handle to the on-disk audit log. Cloned into each probe thread.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one complete record.
    pub fn append(&self, result: &TestResult) -> io::Result<()> {
        let entry = format!(
            "[{}] Server: {}, Target: {}, Success: {}\nOutput:\n{}\n{RECORD_DELIMITER}\n",
            result.timestamp.to_rfc3339(),
            result.server,
            result.target,
            result.success,
            result.output,
        );

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(entry.as_bytes())
    }
}

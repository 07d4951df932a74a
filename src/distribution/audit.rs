//! Append-only audit log of ingested alerts
//!
//! One line per alert: `[YYYY-MM-DD HH:MM:SS] <raw alert line>`, stamped with
//! local wall-clock time at ingress.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

#[derive(Debug)]
pub struct AuditLog {
    path: PathBuf,
    file: File,
}

impl AuditLog {
    /// Opens `path` for appending, creating it if needed.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends one entry and flushes it to the file. `line` is written
    /// byte for byte.
    pub async fn append(&mut self, line: &[u8]) -> std::io::Result<()> {
        let entry = format_entry(Local::now(), line);
        self.file.write_all(&entry).await?;
        self.file.flush().await
    }
}

fn format_entry(at: DateTime<Local>, line: &[u8]) -> Vec<u8> {
    let mut entry = format!("[{}] ", at.format("%Y-%m-%d %H:%M:%S")).into_bytes();
    entry.extend_from_slice(line);
    entry.push(b'\n');
    entry
}

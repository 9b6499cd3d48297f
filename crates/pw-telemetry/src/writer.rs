//! Append-only newline-delimited JSON writer.
//!
//! Each log file has exactly one writer. Lines are flushed as they are
//! written so that tailing consumers see whole records promptly.

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize record: {source}")]
    Json {
        #[source]
        source: serde_json::Error,
    },
}

impl From<WriteError> for pw_common::Error {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Io { source, .. } => pw_common::Error::Io(source),
            WriteError::Json { source } => pw_common::Error::Json(source),
        }
    }
}

/// Appends one JSON document per line to a file.
#[derive(Debug)]
pub struct JsonlWriter {
    path: PathBuf,
    file: File,
    lines: u64,
}

impl JsonlWriter {
    /// Open `path` for appending, creating it and its parent directory.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, WriteError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| WriteError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| WriteError::Io {
                path: path.clone(),
                source: e,
            })?;

        Ok(Self {
            path,
            file,
            lines: 0,
        })
    }

    /// Serialize `record` and append it as a single line.
    pub fn append<T: Serialize>(&mut self, record: &T) -> Result<(), WriteError> {
        let mut line = serde_json::to_vec(record).map_err(|e| WriteError::Json { source: e })?;
        line.push(b'\n');

        self.file
            .write_all(&line)
            .and_then(|_| self.file.flush())
            .map_err(|e| WriteError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        self.lines += 1;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lines appended through this writer.
    pub fn lines_written(&self) -> u64 {
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Line {
        n: u32,
        label: String,
    }

    fn read_lines(path: &Path) -> Vec<Line> {
        fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn creates_parent_and_appends() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("run-x").join("progress.log");
        let mut writer = JsonlWriter::open(&path).unwrap();

        writer.append(&Line { n: 1, label: "a".into() }).unwrap();
        writer.append(&Line { n: 2, label: "b\nc".into() }).unwrap();

        assert_eq!(writer.lines_written(), 2);
        let lines = read_lines(&path);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].label, "b\nc");
    }

    #[test]
    fn reopen_never_truncates() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("telemetry.log");

        {
            let mut writer = JsonlWriter::open(&path).unwrap();
            writer.append(&Line { n: 1, label: "first".into() }).unwrap();
        }
        let mut writer = JsonlWriter::open(&path).unwrap();
        writer.append(&Line { n: 2, label: "second".into() }).unwrap();

        let lines = read_lines(&path);
        assert_eq!(
            lines,
            vec![
                Line { n: 1, label: "first".into() },
                Line { n: 2, label: "second".into() },
            ]
        );
    }

    #[test]
    fn open_fails_when_parent_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"x").unwrap();

        let err = JsonlWriter::open(blocker.join("progress.log")).unwrap_err();
        assert!(matches!(err, WriteError::Io { .. }));
    }
}

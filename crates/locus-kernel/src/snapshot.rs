//! Snapshot files: a whole collection of records, one JSON value per line.
//!
//! TM snapshots and task op lists are saved this way. A save renders every
//! record before touching disk, writes a synced sibling temp file and renames
//! it over the target. A load is strict: the first bad line is reported with
//! its number and the record kind the caller asked for.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs::{self, File};
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: not UTF-8 text", path.display())]
    NotText { path: PathBuf },

    #[error("{} line {line}: bad {kind}: {message}", path.display())]
    Record {
        path: PathBuf,
        line: usize,
        kind: &'static str,
        message: String,
    },

    #[error("{}: {kind} #{index} does not serialize: {message}", path.display())]
    Render {
        path: PathBuf,
        index: usize,
        kind: &'static str,
        message: String,
    },
}

impl SnapshotError {
    /// The snapshot file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SnapshotError::Io { source, .. } if source.kind() == ErrorKind::NotFound)
    }

    fn io(path: &Path, source: io::Error) -> Self {
        SnapshotError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Hidden sibling of `path`, unique within this process.
pub fn temp_sibling(path: &Path) -> PathBuf {
    let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
}

/// Load every `kind` record from `path`. Blank lines are skipped.
pub fn load_snapshot<T: DeserializeOwned>(
    path: impl AsRef<Path>,
    kind: &'static str,
) -> Result<Vec<T>, SnapshotError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::InvalidData => SnapshotError::NotText {
            path: path.to_path_buf(),
        },
        _ => SnapshotError::io(path, source),
    })?;

    let mut records = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(line).map_err(|err| SnapshotError::Record {
            path: path.to_path_buf(),
            line: idx + 1,
            kind,
            message: err.to_string(),
        })?;
        records.push(record);
    }
    tracing::debug!(path = %path.display(), kind, records = records.len(), "snapshot loaded");
    Ok(records)
}

/// Replace `path` with `records`. On error the previous file is untouched.
pub fn save_snapshot<T: Serialize>(
    path: impl AsRef<Path>,
    kind: &'static str,
    records: &[T],
) -> Result<(), SnapshotError> {
    let path = path.as_ref();
    let mut body = String::new();
    for (index, record) in records.iter().enumerate() {
        let line = serde_json::to_string(record).map_err(|err| SnapshotError::Render {
            path: path.to_path_buf(),
            index,
            kind,
            message: err.to_string(),
        })?;
        body.push_str(&line);
        body.push('\n');
    }

    let parent = path.parent().filter(|dir| !dir.as_os_str().is_empty());
    if let Some(dir) = parent {
        fs::create_dir_all(dir).map_err(|e| SnapshotError::io(dir, e))?;
    }

    let tmp = temp_sibling(path);
    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(body.as_bytes())?;
        file.sync_all()
    });
    if let Err(err) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(SnapshotError::io(path, err));
    }
    if let Some(dir) = parent {
        File::open(dir)
            .and_then(|dir| dir.sync_all())
            .map_err(|e| SnapshotError::io(dir, e))?;
    }
    tracing::debug!(path = %path.display(), kind, records = records.len(), "snapshot saved");
    Ok(())
}

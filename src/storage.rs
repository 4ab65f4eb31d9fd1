//! On-disk layout and line-oriented I/O for the per-kind event logs.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::event::Event;

/// Manages the on-disk directory layout for stream kind logs.
///
/// The layout is flat: one append-only JSONL file per registered kind,
/// directly under the data directory:
///
/// ```text
/// <data_dir>/
///     student.jsonl
///     teacher.jsonl
/// ```
///
/// `LogLayout` is cheap to clone (it wraps a single `PathBuf`). Log files
/// are created lazily by the first append; only the data directory itself
/// is created up front.
#[derive(Debug, Clone)]
pub(crate) struct LogLayout {
    data_dir: PathBuf,
}

impl LogLayout {
    /// Create a new `LogLayout` rooted at the given data directory.
    pub(crate) fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the root directory of this layout.
    pub(crate) fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Returns the backing file path for a stream kind.
    ///
    /// `<data_dir>/<kind>.jsonl`
    pub(crate) fn stream_file(&self, kind: &str) -> PathBuf {
        self.data_dir.join(format!("{kind}.jsonl"))
    }

    /// Create the data directory if it does not exist yet.
    pub(crate) fn ensure_data_dir(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)
    }
}

/// Append one serialized event line to a log file, creating it on first use.
///
/// The write is flushed and synced before returning, so a successful result
/// means the line is durable.
pub(crate) fn append_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;

    // Each entry is a single line of JSON followed by a newline.
    writeln!(file, "{line}")?;
    file.sync_data()
}

/// Load every event from a log file, in file order.
///
/// A missing file is an empty log, not an error. A line that fails to parse
/// is an error: the log is the source of truth, so a damaged entry must
/// surface at boot instead of being silently dropped.
pub(crate) fn load_events(path: &Path) -> Result<Vec<Event>, StoreError> {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let reader = BufReader::new(file);
    let mut events = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        events.push(serde_json::from_str(&line)?);
    }
    Ok(events)
}

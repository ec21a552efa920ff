//! Diagnostic communication log.
//!
//! Every byte sent to or received from the bridge, and every protocol event
//! (stalls, EOT disambiguation), is reported to a [`CommLog`]. Logging is
//! best-effort: implementations swallow their own failures so a broken log
//! sink never aborts a bridge exchange.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace, warn};

/// Target used for diagnostic log records forwarded to `tracing`.
pub const COMM_TARGET: &str = "gpibnet::comm";

/// Append-only sink for bridge traffic and protocol events.
pub trait CommLog {
    /// Record bytes moving in one direction, labelled with `tag`
    /// (for example `Send to 5`).
    fn write(&mut self, tag: &str, data: &[u8]);

    /// Record a protocol event.
    fn event(&mut self, message: &str);
}

impl<L: CommLog + ?Sized> CommLog for Box<L> {
    fn write(&mut self, tag: &str, data: &[u8]) {
        (**self).write(tag, data)
    }

    fn event(&mut self, message: &str) {
        (**self).event(message)
    }
}

/// Fan out to two logs.
impl<A: CommLog, B: CommLog> CommLog for (A, B) {
    fn write(&mut self, tag: &str, data: &[u8]) {
        self.0.write(tag, data);
        self.1.write(tag, data);
    }

    fn event(&mut self, message: &str) {
        self.0.event(message);
        self.1.event(message);
    }
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCommLog;

impl CommLog for NullCommLog {
    fn write(&mut self, _tag: &str, _data: &[u8]) {}

    fn event(&mut self, _message: &str) {}
}

/// Forwards records to `tracing` under [`COMM_TARGET`]: bytes at TRACE,
/// events at DEBUG.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCommLog;

impl CommLog for TracingCommLog {
    fn write(&mut self, tag: &str, data: &[u8]) {
        trace!(target: COMM_TARGET, tag, data = %data.escape_ascii(), len = data.len());
    }

    fn event(&mut self, message: &str) {
        debug!(target: COMM_TARGET, "{message}");
    }
}

/// Appends timestamped lines to a file.
///
/// ```text
/// [2024-06-10 08:13:20.123] Send to 5: *IDN?\n
/// [2024-06-10 08:13:20.125] -- Potential EOT break
/// ```
///
/// The first write failure is reported through `tracing` and disables the
/// log for the rest of the session.
pub struct FileCommLog {
    path: PathBuf,
    out: Option<BufWriter<File>>,
}

impl FileCommLog {
    /// Open `path` for appending, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            out: Some(BufWriter::new(file)),
        })
    }

    /// Path of the log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, line: std::fmt::Arguments<'_>) {
        let Some(out) = self.out.as_mut() else {
            return;
        };
        let result = writeln!(out, "[{}] {line}", timestamp()).and_then(|()| out.flush());
        if let Err(err) = result {
            warn!(path = ?self.path, error = %err, "communication log write failed; disabling");
            self.out = None;
        }
    }
}

impl CommLog for FileCommLog {
    fn write(&mut self, tag: &str, data: &[u8]) {
        self.append(format_args!("{tag}: {}", data.escape_ascii()));
    }

    fn event(&mut self, message: &str) {
        self.append(format_args!("-- {message}"));
    }
}

impl std::fmt::Debug for FileCommLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileCommLog")
            .field("path", &self.path)
            .field("enabled", &self.out.is_some())
            .finish()
    }
}

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

fn timestamp() -> impl std::fmt::Display {
    chrono::Local::now().format(TIMESTAMP_FORMAT)
}

/// One record captured by [`MemoryCommLog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommRecord {
    /// Bytes with their direction tag.
    Data { tag: String, data: Vec<u8> },
    /// Protocol event.
    Event(String),
}

/// Keeps records in memory. Clones share the same record list.
#[derive(Debug, Clone, Default)]
pub struct MemoryCommLog {
    records: Arc<Mutex<Vec<CommRecord>>>,
}

impl MemoryCommLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record so far.
    pub fn records(&self) -> Vec<CommRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    /// Concatenated bytes of all data records carrying `tag`.
    pub fn data_for(&self, tag: &str) -> Vec<u8> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                CommRecord::Data { tag: t, data } if t == tag => Some(data),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Messages of all event records.
    pub fn events(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .filter_map(|record| match record {
                CommRecord::Event(message) => Some(message),
                CommRecord::Data { .. } => None,
            })
            .collect()
    }

    fn push(&self, record: CommRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record);
        }
    }
}

impl CommLog for MemoryCommLog {
    fn write(&mut self, tag: &str, data: &[u8]) {
        self.push(CommRecord::Data {
            tag: tag.to_string(),
            data: data.to_vec(),
        });
    }

    fn event(&mut self, message: &str) {
        self.push(CommRecord::Event(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_log_collects_by_tag() {
        let mut log = MemoryCommLog::new();
        let observer = log.clone();

        log.write("Send to 5", b"*IDN?\n");
        log.event("Potential EOT break");
        log.write("Recv from 5", b"A");
        log.write("Recv from 5", b"B");

        assert_eq!(observer.data_for("Recv from 5"), b"AB");
        assert_eq!(observer.data_for("Send to 5"), b"*IDN?\n");
        assert_eq!(observer.events(), vec!["Potential EOT break".to_string()]);
        assert_eq!(observer.records().len(), 4);
    }

    #[test]
    fn pair_fans_out() {
        let first = MemoryCommLog::new();
        let second = MemoryCommLog::new();
        let mut both = (first.clone(), second.clone());

        both.write("Bridge", b"++ver\n");
        both.event("done");

        assert_eq!(first.records(), second.records());
        assert_eq!(first.records().len(), 2);
    }

    #[test]
    fn file_log_appends_escaped_lines() {
        let dir = std::env::temp_dir().join(format!("gpibnet-commlog-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("comm.log");
        let _ = std::fs::remove_file(&path);

        {
            let mut log = FileCommLog::open(&path).unwrap();
            log.write("Send to 2", b"*IDN?\n");
            log.event("EOT break was real");
        }
        {
            let mut log = FileCommLog::open(&path).unwrap();
            log.write("Recv from 2", &[0x7B]);
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].ends_with("] Send to 2: *IDN?\\n"));
        assert!(lines[1].ends_with("] -- EOT break was real"));
        assert!(lines[2].ends_with("] Recv from 2: {"));
        for line in &lines {
            let stamp = &line[1..24];
            assert!(
                chrono::NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok(),
                "bad timestamp in {line:?}"
            );
            assert_eq!(&line[24..26], "] ");
        }

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn null_and_tracing_logs_accept_everything() {
        let mut logs: Vec<Box<dyn CommLog>> = vec![Box::new(NullCommLog), Box::new(TracingCommLog)];
        for log in &mut logs {
            log.write("Recv from 1", &[0x00, 0xFF]);
            log.event("event");
        }
    }
}

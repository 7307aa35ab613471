// ABOUTME: Append-only, human-readable operation log used to replay list state after a restart.
// ABOUTME: One space-separated line per operation; malformed lines are skipped on read, never fatal.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::num::ParseIntError;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use listd_core::OpKind;
use listd_core::operation::UnknownOpKind;
use parking_lot::Mutex;
use thiserror::Error;

/// Errors that can occur while opening, writing, or reading the log file.
#[derive(Debug, Error)]
pub enum OpLogError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The line reached the file but could not be flushed to disk. It will
    /// still be replayed if the process survives, so callers must treat
    /// `timestamp` as logged.
    #[error("entry at {timestamp} written but not synced: {source}")]
    Unsynced {
        timestamp: DateTime<Utc>,
        source: io::Error,
    },
}

impl OpLogError {
    /// Timestamp of the entry if its line made it into the file.
    pub fn written_at(&self) -> Option<DateTime<Utc>> {
        match self {
            OpLogError::Io(_) => None,
            OpLogError::Unsynced { timestamp, .. } => Some(*timestamp),
        }
    }
}

/// Reasons a single log line is rejected by the parser.
#[derive(Debug, Error)]
pub enum LogLineError {
    #[error("expected 3 or 4 fields, found {0}")]
    WrongArity(usize),

    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("{0}")]
    UnknownOperation(#[from] UnknownOpKind),

    #[error("{0} entry is missing its payload")]
    MissingPayload(OpKind),

    #[error("{0} entry does not take a payload")]
    UnexpectedPayload(OpKind),

    #[error("invalid integer payload: {0}")]
    Payload(#[from] ParseIntError),

    #[error("line is not valid UTF-8")]
    NotUtf8,
}

/// One parsed line of the operation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub kind: OpKind,
    pub list_id: String,
    /// Value for Append, index for Get. Absent for Remove, and for Size
    /// lines written without one.
    pub payload: Option<i64>,
}

impl LogEntry {
    /// Render the entry as a log line, without the trailing newline.
    pub fn to_line(&self) -> String {
        let ts = self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true);
        match self.payload {
            Some(p) if self.kind != OpKind::Remove => {
                format!("{} {} {} {}", ts, self.kind, self.list_id, p)
            }
            _ => format!("{} {} {}", ts, self.kind, self.list_id),
        }
    }
}

/// Parse one log line with the strict grammar
/// `<rfc3339> <Append|Remove|Get/Size> <list_id> [<integer>]`.
pub fn parse_line(line: &str) -> Result<LogEntry, LogLineError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(LogLineError::WrongArity(fields.len()));
    }

    let timestamp = DateTime::parse_from_rfc3339(fields[0])?.with_timezone(&Utc);
    let kind: OpKind = fields[1].parse()?;
    let list_id = fields[2].to_string();

    let payload = match (kind, fields.get(3)) {
        (OpKind::Append, Some(raw)) => Some(raw.parse::<i64>()?),
        (OpKind::Append, None) => return Err(LogLineError::MissingPayload(kind)),
        (OpKind::Remove, Some(_)) => return Err(LogLineError::UnexpectedPayload(kind)),
        (OpKind::Remove, None) => None,
        (OpKind::Observe, raw) => raw.map(|r| r.parse::<i64>()).transpose()?,
    };

    Ok(LogEntry {
        timestamp,
        kind,
        list_id,
        payload,
    })
}

/// Result of scanning the log file.
#[derive(Debug, Default)]
pub struct LogScan {
    /// Entries newer than the requested watermark, in file order.
    pub entries: Vec<LogEntry>,
    /// Lines that failed to parse and were skipped.
    pub malformed: usize,
    /// True when an I/O error cut the scan short; `entries` is then the
    /// readable prefix.
    pub truncated: bool,
}

struct LogWriter {
    file: File,
    last_timestamp: Option<DateTime<Utc>>,
    /// Set after a failed write, which may have left a partial line.
    needs_separator: bool,
}

impl LogWriter {
    /// Strictly increasing timestamps: equal or backwards clock readings are
    /// bumped one nanosecond past the previous stamp.
    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = match self.last_timestamp {
            Some(prev) if now <= prev => prev + Duration::nanoseconds(1),
            _ => now,
        };
        self.last_timestamp = Some(ts);
        ts
    }
}

/// The durable operation log. Writers are serialized by a mutex so that
/// stamping and writing a line happen together, which keeps file order
/// equal to timestamp order.
pub struct OperationLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
}

impl OperationLog {
    /// Open (or create) the log at `path` in append mode, creating parent
    /// directories as needed. A torn final line left by a crash is sealed
    /// with a newline so the next entry starts on a fresh line.
    pub fn open(path: &Path) -> Result<Self, OpLogError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        if file.metadata()?.len() > 0 {
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1))?;
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                tracing::warn!(path = %path.display(), "sealing torn final line in operation log");
                file.write_all(b"\n")?;
                file.sync_data()?;
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                file,
                last_timestamp: None,
                needs_separator: false,
            }),
        })
    }

    /// Guarantee every timestamp handed out from now on is after `floor`,
    /// typically the recovered watermark, even if the wall clock went back.
    pub fn with_floor(self, floor: DateTime<Utc>) -> Self {
        {
            let mut writer = self.writer.lock();
            if writer.last_timestamp.is_none_or(|prev| floor > prev) {
                writer.last_timestamp = Some(floor);
            }
        }
        self
    }

    /// Returns the path to the underlying log file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stamp and durably append one entry. `arg` is the value for Append and
    /// the index for Get (0 for Size); it is ignored for Remove.
    /// Returns the timestamp written.
    ///
    /// After a failed write the next line starts with a newline, sealing
    /// whatever fragment the failure left. A sync failure after a complete
    /// write is reported as [`OpLogError::Unsynced`].
    pub fn record(&self, kind: OpKind, list_id: &str, arg: i64) -> Result<DateTime<Utc>, OpLogError> {
        let mut writer = self.writer.lock();
        let entry = LogEntry {
            timestamp: writer.next_timestamp(),
            kind,
            list_id: list_id.to_string(),
            payload: (kind != OpKind::Remove).then_some(arg),
        };

        let mut line = String::new();
        if writer.needs_separator {
            line.push('\n');
        }
        line.push_str(&entry.to_line());
        line.push('\n');

        if let Err(e) = writer.file.write_all(line.as_bytes()) {
            writer.needs_separator = true;
            return Err(e.into());
        }
        writer.needs_separator = false;

        writer.file.sync_data().map_err(|source| OpLogError::Unsynced {
            timestamp: entry.timestamp,
            source,
        })?;

        Ok(entry.timestamp)
    }

    /// Scan the log at `path` and return entries strictly after `since`.
    ///
    /// A missing file yields an empty scan. Malformed lines are skipped with
    /// a warning. An I/O error partway through stops the scan and returns
    /// what was read so far, marked `truncated`.
    pub fn read_since(path: &Path, since: DateTime<Utc>) -> Result<LogScan, OpLogError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(LogScan::default()),
            Err(e) => return Err(e.into()),
        };

        let mut reader = BufReader::new(file);
        let mut scan = LogScan::default();
        let mut buf = Vec::new();
        let mut line_no = 0usize;

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(line = line_no + 1, error = %e, "operation log read failed, keeping prefix");
                    scan.truncated = true;
                    break;
                }
            }
            line_no += 1;

            let parsed = std::str::from_utf8(&buf)
                .map_err(|_| LogLineError::NotUtf8)
                .and_then(|line| {
                    let line = line.trim_end_matches(['\n', '\r']);
                    if line.trim().is_empty() {
                        Ok(None)
                    } else {
                        parse_line(line).map(Some)
                    }
                });

            match parsed {
                Ok(Some(entry)) if entry.timestamp > since => scan.entries.push(entry),
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(line = line_no, error = %e, "skipping malformed operation log line");
                    scan.malformed += 1;
                }
            }
        }

        Ok(scan)
    }
}

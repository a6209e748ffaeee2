//! Append-only, per-day-deduplicated attendance ledger.
//!
//! Storage is a human-readable CSV file (`Name,Date,Time` header). The
//! ledger is logically a set keyed by (identity, date): the first mark of a
//! day is appended, later marks of the same day are no-ops.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::identity::Identity;

const LEDGER_HEADER: &str = "Name,Date,Time";
const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("attendance ledger {0} is held by another process")]
    Busy(PathBuf),
    #[error("ledger I/O at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed ledger row at {path}:{line}")]
    Malformed { path: PathBuf, line: usize },
}

/// Outcome of a [`AttendanceLedger::mark_present`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// A new record was appended for (identity, date).
    Marked,
    /// The identity was already marked on that date; nothing was written.
    AlreadyMarkedToday,
}

/// One attendance row: identity, date, and time of the first mark that day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    pub identity: Identity,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

/// Durable attendance record store.
///
/// Holds an exclusive advisory lock on the backing file for its whole
/// lifetime, so the read-check-append sequence in
/// [`mark_present`](Self::mark_present) is safe against concurrent writer
/// processes: a second opener fails fast with [`LedgerError::Busy`].
pub struct AttendanceLedger {
    path: PathBuf,
    file: File,
    seen: HashMap<Identity, BTreeMap<NaiveDate, NaiveTime>>,
}

impl AttendanceLedger {
    /// Open the ledger at `path`, creating it (with header) if missing,
    /// and load the existing records into the dedup index.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| LedgerError::Io {
                    path: parent.to_path_buf(),
                    source: e,
                })?;
            }
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .map_err(|e| LedgerError::Io {
                path: path.clone(),
                source: e,
            })?;

        lock_exclusive(&file, &path)?;

        let contents = std::fs::read_to_string(&path).map_err(|e| LedgerError::Io {
            path: path.clone(),
            source: e,
        })?;

        let mut seen: HashMap<Identity, BTreeMap<NaiveDate, NaiveTime>> = HashMap::new();
        if contents.is_empty() {
            file.write_all(format!("{LEDGER_HEADER}\n").as_bytes())
                .and_then(|()| file.flush())
                .map_err(|e| LedgerError::Io {
                    path: path.clone(),
                    source: e,
                })?;
        } else {
            for record in parse_rows(&path, &contents)? {
                seen.entry(record.identity)
                    .or_default()
                    .insert(record.date, record.time);
            }
        }

        tracing::debug!(
            path = %path.display(),
            identities = seen.len(),
            "attendance ledger opened"
        );

        Ok(Self { path, file, seen })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mark the identity present at `at`, at most once per calendar date.
    ///
    /// Idempotent with respect to ledger state: repeated calls with the
    /// same (identity, date) report [`MarkOutcome::AlreadyMarkedToday`]
    /// and write nothing. A failed append leaves no trace in the index,
    /// so callers may safely retry.
    pub fn mark_present(
        &mut self,
        identity: &Identity,
        at: NaiveDateTime,
    ) -> Result<MarkOutcome, LedgerError> {
        let date = at.date();
        if self
            .seen
            .get(identity)
            .is_some_and(|dates| dates.contains_key(&date))
        {
            return Ok(MarkOutcome::AlreadyMarkedToday);
        }

        // Sub-second precision is not representable in the row format.
        let time = at.time().with_nanosecond(0).unwrap_or_else(|| at.time());

        let row = format!(
            "{},{},{}\n",
            identity,
            date.format(DATE_FORMAT),
            time.format(TIME_FORMAT)
        );
        self.file
            .write_all(row.as_bytes())
            .and_then(|()| self.file.flush())
            .map_err(|e| LedgerError::Io {
                path: self.path.clone(),
                source: e,
            })?;

        self.seen
            .entry(identity.clone())
            .or_default()
            .insert(date, time);

        tracing::info!(identity = %identity, date = %date, time = %time, "attendance marked");
        Ok(MarkOutcome::Marked)
    }

    /// All records, sorted by (date, time, identity).
    pub fn records(&self) -> Vec<AttendanceRecord> {
        let mut records: Vec<AttendanceRecord> = self
            .seen
            .iter()
            .flat_map(|(identity, dates)| {
                dates.iter().map(|(date, time)| AttendanceRecord {
                    identity: identity.clone(),
                    date: *date,
                    time: *time,
                })
            })
            .collect();
        records.sort_by(|a, b| {
            (a.date, a.time, &a.identity).cmp(&(b.date, b.time, &b.identity))
        });
        records
    }
}

/// Read all records from a ledger file without taking the writer lock.
///
/// For display paths that must not contend with a running recognition
/// loop. A missing file reads as an empty ledger.
pub fn read_records(path: &Path) -> Result<Vec<AttendanceRecord>, LedgerError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(LedgerError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    let mut records = parse_rows(path, &contents)?;
    records.sort_by(|a, b| (a.date, a.time, &a.identity).cmp(&(b.date, b.time, &b.identity)));
    Ok(records)
}

fn parse_rows(path: &Path, contents: &str) -> Result<Vec<AttendanceRecord>, LedgerError> {
    let malformed = |line: usize| LedgerError::Malformed {
        path: path.to_path_buf(),
        line,
    };

    let mut lines = contents.lines().enumerate();
    match lines.next() {
        Some((_, header)) if header.trim_end() == LEDGER_HEADER => {}
        Some(_) | None => return Err(malformed(1)),
    }

    let mut records = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.splitn(3, ',');
        let (Some(name), Some(date), Some(time)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(malformed(line_no));
        };

        let identity = Identity::new(name).map_err(|_| malformed(line_no))?;
        let date =
            NaiveDate::parse_from_str(date, DATE_FORMAT).map_err(|_| malformed(line_no))?;
        let time =
            NaiveTime::parse_from_str(time, TIME_FORMAT).map_err(|_| malformed(line_no))?;
        records.push(AttendanceRecord {
            identity,
            date,
            time,
        });
    }
    Ok(records)
}

/// Take an exclusive, non-blocking advisory lock on the ledger file.
fn lock_exclusive(file: &File, path: &Path) -> Result<(), LedgerError> {
    let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        return if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Err(LedgerError::Busy(path.to_path_buf()))
        } else {
            Err(LedgerError::Io {
                path: path.to_path_buf(),
                source: err,
            })
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn ts(date: (i32, u32, u32), time: (u32, u32, u32)) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(date.0, date.1, date.2)
            .unwrap()
            .and_hms_opt(time.0, time.1, time.2)
            .unwrap()
    }

    #[test]
    fn same_day_marks_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path).unwrap();
        let alice = Identity::new("alice").unwrap();

        assert_eq!(
            ledger.mark_present(&alice, ts((2026, 8, 7), (9, 0, 0))).unwrap(),
            MarkOutcome::Marked
        );
        assert_eq!(
            ledger.mark_present(&alice, ts((2026, 8, 7), (15, 30, 0))).unwrap(),
            MarkOutcome::AlreadyMarkedToday
        );

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn different_days_both_mark() {
        let dir = TempDir::new().unwrap();
        let mut ledger = AttendanceLedger::open(dir.path().join("a.csv")).unwrap();
        let bob = Identity::new("bob").unwrap();

        assert_eq!(
            ledger.mark_present(&bob, ts((2026, 8, 6), (8, 45, 12))).unwrap(),
            MarkOutcome::Marked
        );
        assert_eq!(
            ledger.mark_present(&bob, ts((2026, 8, 7), (8, 50, 3))).unwrap(),
            MarkOutcome::Marked
        );
        assert_eq!(ledger.records().len(), 2);
    }

    #[test]
    fn dedup_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        let alice = Identity::new("alice").unwrap();
        {
            let mut ledger = AttendanceLedger::open(&path).unwrap();
            ledger.mark_present(&alice, ts((2026, 8, 7), (9, 1, 2))).unwrap();
        }

        let mut ledger = AttendanceLedger::open(&path).unwrap();
        assert_eq!(
            ledger.mark_present(&alice, ts((2026, 8, 7), (17, 0, 0))).unwrap(),
            MarkOutcome::AlreadyMarkedToday
        );

        let records = ledger.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time, NaiveTime::from_hms_opt(9, 1, 2).unwrap());
    }

    #[test]
    fn file_is_tabular_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path).unwrap();
        let alice = Identity::new("alice").unwrap();
        ledger.mark_present(&alice, ts((2026, 8, 7), (9, 0, 0))).unwrap();
        drop(ledger);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "Name,Date,Time\nalice,2026-08-07,09:00:00\n");
    }

    #[test]
    fn read_records_without_lock() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path).unwrap();
        let carol = Identity::new("carol").unwrap();
        ledger.mark_present(&carol, ts((2026, 8, 7), (10, 0, 0))).unwrap();

        // Ledger still open (and locked); the read-only path works anyway.
        let records = read_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].identity, carol);

        assert!(read_records(&dir.path().join("missing.csv")).unwrap().is_empty());
    }

    #[test]
    fn second_writer_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        let _ledger = AttendanceLedger::open(&path).unwrap();

        assert!(matches!(
            AttendanceLedger::open(&path),
            Err(LedgerError::Busy(_))
        ));
    }

    #[test]
    fn malformed_rows_fail_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        std::fs::write(&path, "Name,Date,Time\nalice,not-a-date,09:00:00\n").unwrap();

        assert!(matches!(
            AttendanceLedger::open(&path),
            Err(LedgerError::Malformed { line: 2, .. })
        ));
    }

    #[test]
    fn missing_header_fails_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        std::fs::write(&path, "alice,2026-08-07,09:00:00\n").unwrap();

        assert!(matches!(
            AttendanceLedger::open(&path),
            Err(LedgerError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn subsecond_precision_is_truncated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("attendance.csv");
        let mut ledger = AttendanceLedger::open(&path).unwrap();
        let alice = Identity::new("alice").unwrap();

        let at = NaiveDate::from_ymd_opt(2026, 8, 7)
            .unwrap()
            .and_hms_milli_opt(9, 0, 0, 250)
            .unwrap();
        ledger.mark_present(&alice, at).unwrap();

        let records = ledger.records();
        assert_eq!(records[0].time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
    }
}

//! Impulse source abstraction.
//!
//! A source yields the time between consecutive flywheel impulses, in
//! seconds. Recordings and piped streams share one text format: one
//! interval per line, blank lines and `#` comments ignored.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::time::Instant;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read recording {path}: {source}")]
    Recording {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Read error: {0}")]
    Io(#[from] std::io::Error),
}

/// Events produced by an impulse source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpulseEvent {
    /// Seconds since the previous impulse
    Impulse(f64),
    /// No more data will arrive
    Eof,
}

/// Trait abstracting where impulses come from.
///
/// The processing loop calls [`next_impulse`](ImpulseSource::next_impulse)
/// in a `select!` with other branches, so implementations must be cancel
/// safe.
#[async_trait]
pub trait ImpulseSource: Send + 'static {
    async fn next_impulse(&mut self) -> Result<ImpulseEvent, SourceError>;

    /// Human-readable name for logging (e.g. "file", "stdin").
    fn source_name(&self) -> &str;
}

/// Parse one line of the interval format.
///
/// `Ok(None)` for blank and comment lines, `Err` with the offending text for
/// anything that is not a positive finite number.
pub fn parse_interval_line(line: &str) -> Result<Option<f64>, String> {
    let content = line.split('#').next().unwrap_or("").trim();
    if content.is_empty() {
        return Ok(None);
    }
    match content.parse::<f64>() {
        Ok(dt) if dt.is_finite() && dt > 0.0 => Ok(Some(dt)),
        _ => Err(content.to_string()),
    }
}

// ============================================================================
// File Source (recording replay)
// ============================================================================

/// Replays a recorded session, optionally paced in real time.
///
/// In real time an interval is only consumed once its deadline has passed;
/// a wait cut short by `select!` resumes against the same deadline.
pub struct FileSource {
    intervals: std::vec::IntoIter<f64>,
    realtime: bool,
    pending: Option<(f64, Instant)>,
}

impl FileSource {
    /// Load a recording. Malformed lines are logged and skipped.
    pub async fn open(path: &Path, realtime: bool) -> Result<Self, SourceError> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| SourceError::Recording {
                path: path.to_path_buf(),
                source,
            })?;

        let mut intervals = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            match parse_interval_line(line) {
                Ok(Some(dt)) => intervals.push(dt),
                Ok(None) => {}
                Err(bad) => warn!(line = number + 1, "[FileSource] Skipping malformed interval '{}'", bad),
            }
        }
        Ok(Self::from_intervals(intervals, realtime))
    }

    pub fn from_intervals(intervals: Vec<f64>, realtime: bool) -> Self {
        Self {
            intervals: intervals.into_iter(),
            realtime,
            pending: None,
        }
    }

    /// Intervals not yet delivered, including one still being waited on.
    pub fn remaining(&self) -> usize {
        self.intervals.len() + usize::from(self.pending.is_some())
    }
}

#[async_trait]
impl ImpulseSource for FileSource {
    async fn next_impulse(&mut self) -> Result<ImpulseEvent, SourceError> {
        if !self.realtime {
            return Ok(self
                .intervals
                .next()
                .map_or(ImpulseEvent::Eof, ImpulseEvent::Impulse));
        }

        let (dt, deadline) = match self.pending {
            Some(pending) => pending,
            None => {
                let Some(dt) = self.intervals.next() else {
                    return Ok(ImpulseEvent::Eof);
                };
                let wait = std::time::Duration::try_from_secs_f64(dt).unwrap_or_default();
                let pending = (dt, Instant::now() + wait);
                self.pending = Some(pending);
                pending
            }
        };
        tokio::time::sleep_until(deadline).await;
        self.pending = None;
        Ok(ImpulseEvent::Impulse(dt))
    }

    fn source_name(&self) -> &str {
        "file"
    }
}

// ============================================================================
// Line Source (stdin or any async reader)
// ============================================================================

/// Reads intervals line by line from an async reader.
///
/// Used with the simulator:
/// `impulse-simulation | rowing-monitor --stdin`
pub struct LineSource<R> {
    lines: Lines<R>,
    name: &'static str,
}

pub type StdinSource = LineSource<BufReader<tokio::io::Stdin>>;

impl StdinSource {
    pub fn stdin() -> Self {
        LineSource::new(BufReader::new(tokio::io::stdin()), "stdin")
    }
}

impl<R> LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R, name: &'static str) -> Self {
        Self {
            lines: reader.lines(),
            name,
        }
    }
}

#[async_trait]
impl<R> ImpulseSource for LineSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_impulse(&mut self) -> Result<ImpulseEvent, SourceError> {
        // `next_line` keeps partial input across cancellation
        while let Some(line) = self.lines.next_line().await? {
            match parse_interval_line(&line) {
                Ok(Some(dt)) => return Ok(ImpulseEvent::Impulse(dt)),
                Ok(None) => {}
                Err(bad) => {
                    warn!("[{}] Skipping malformed interval '{}'", self.name, bad);
                }
            }
        }
        Ok(ImpulseEvent::Eof)
    }

    fn source_name(&self) -> &str {
        self.name
    }
}

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriter, MakeWriterExt};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, Layer};

use crate::exit::{io_error, CliResult};

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> tracing::level_filters::LevelFilter {
        match self {
            LogLevel::Error => tracing::level_filters::LevelFilter::ERROR,
            LogLevel::Warn => tracing::level_filters::LevelFilter::WARN,
            LogLevel::Info => tracing::level_filters::LevelFilter::INFO,
            LogLevel::Debug => tracing::level_filters::LevelFilter::DEBUG,
            LogLevel::Trace => tracing::level_filters::LevelFilter::TRACE,
        }
    }
}

/// Lines kept by the in-memory log ring.
pub const RECENT_LINES: usize = 50;

/// Process-wide logging setup.
///
/// Built once in `main` and held until exit. Log lines always go to stderr;
/// with a log file they are also appended there. The last [`RECENT_LINES`]
/// lines at debug level or above are kept in memory regardless of
/// `--log-level`.
pub struct LoggingContext {
    file: Option<(PathBuf, Arc<File>)>,
    level: LogLevel,
    recent: LogRing,
}

impl LoggingContext {
    pub fn init(format: LogFormat, level: LogLevel, log_file: Option<&Path>) -> CliResult<Self> {
        let file = match log_file {
            Some(path) => {
                let handle = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|err| {
                        io_error(&format!("failed opening log file {}", path.display()), err)
                    })?;
                Some((path.to_path_buf(), Arc::new(handle)))
            }
            None => None,
        };

        let writer = match &file {
            Some((_, handle)) => BoxMakeWriter::new(std::io::stderr.and(Arc::clone(handle))),
            None => BoxMakeWriter::new(std::io::stderr),
        };

        let stderr = match format {
            LogFormat::Text => fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .boxed(),
            LogFormat::Json => fmt::layer()
                .json()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false)
                .boxed(),
        };

        let recent = LogRing::new(RECENT_LINES);
        let ring = fmt::layer()
            .with_writer(recent.clone())
            .with_ansi(false)
            .with_target(false);

        // A subscriber may already be installed (tests); keep it.
        let _ = tracing_subscriber::registry()
            .with(stderr.with_filter(level.as_filter()))
            .with(ring.with_filter(LevelFilter::DEBUG))
            .try_init();

        Ok(Self {
            file,
            level,
            recent,
        })
    }

    pub fn log_file(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    /// Recent log lines, oldest first.
    pub fn recent(&self) -> Vec<String> {
        self.recent.snapshot()
    }

    /// After a failure, write the recent lines to stderr when `--log-level`
    /// was hiding debug detail.
    pub fn report_recent(&self) {
        if matches!(self.level, LogLevel::Debug | LogLevel::Trace) {
            return;
        }
        let lines = self.recent();
        if lines.is_empty() {
            return;
        }
        let mut stderr = io::stderr().lock();
        let _ = writeln!(stderr, "recent log lines:");
        for line in lines {
            let _ = writeln!(stderr, "  {line}");
        }
    }

    /// Flush the log file. Call before `process::exit`, which skips destructors.
    pub fn finish(self) {
        if let Some((_, handle)) = &self.file {
            let _ = (&**handle).flush();
        }
    }
}

/// Bounded in-memory copy of the most recent log lines.
///
/// Plugs into a fmt layer as its writer; the oldest line is dropped once
/// `capacity` is reached.
#[derive(Clone, Debug)]
pub struct LogRing {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl LogRing {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    fn push(&self, line: &str) {
        if self.capacity == 0 {
            return;
        }
        let mut lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        while lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line.to_string());
    }

    /// Oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        let lines = self.lines.lock().unwrap_or_else(PoisonError::into_inner);
        lines.iter().cloned().collect()
    }
}

/// Collects one formatted event and files its lines into the ring on drop.
pub struct RingWriter {
    ring: LogRing,
    pending: Vec<u8>,
}

impl Write for RingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for RingWriter {
    fn drop(&mut self) {
        for line in String::from_utf8_lossy(&self.pending).lines() {
            let line = line.trim();
            if !line.is_empty() {
                self.ring.push(line);
            }
        }
    }
}

impl<'a> MakeWriter<'a> for LogRing {
    type Writer = RingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RingWriter {
            ring: self.clone(),
            pending: Vec::new(),
        }
    }
}

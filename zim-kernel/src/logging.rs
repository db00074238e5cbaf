//! Kernel logging.
//!
//! Thin wiring of the `log` facade onto a platform console sink. Records
//! are formatted into a fixed stack buffer (no allocation on the log
//! path) and pushed to whatever sink the platform installed; before
//! `init`, logging is a no-op.

use core::fmt::Write;

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Mutex;

use zim_common::message::Message;

/// Where formatted log lines go (simulator console, serial port, ...).
pub type ConsoleSink = fn(&str);

/// Upper bound on one formatted log line.
const LINE_CAP: usize = 256;

/// Fixed-size formatting buffer; overlong lines are truncated.
struct LineBuffer {
    data: [u8; LINE_CAP],
    len: usize,
}

impl LineBuffer {
    const fn new() -> Self {
        Self {
            data: [0; LINE_CAP],
            len: 0,
        }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.data[..self.len]).unwrap_or("<invalid>")
    }
}

impl Write for LineBuffer {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        let bytes = s.as_bytes();
        let to_copy = bytes.len().min(LINE_CAP - self.len);
        self.data[self.len..self.len + to_copy].copy_from_slice(&bytes[..to_copy]);
        self.len += to_copy;
        Ok(())
    }
}

static SINK: Mutex<Option<ConsoleSink>> = Mutex::new(None);

struct KernelLogger;

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let Some(sink) = *SINK.lock() else { return };

        let level = match record.level() {
            Level::Error => "ERROR",
            Level::Warn => " WARN",
            Level::Info => " INFO",
            Level::Debug => "DEBUG",
            Level::Trace => "TRACE",
        };

        let mut line = LineBuffer::new();
        let _ = write!(line, "[{}] {}: {}\n", level, record.target(), record.args());
        sink(line.as_str());
    }

    fn flush(&self) {}
}

static LOGGER: KernelLogger = KernelLogger;

/// Install `sink` and register the kernel logger with the `log` facade.
/// Safe to call more than once; later sinks replace earlier ones.
pub fn init(sink: ConsoleSink) {
    *SINK.lock() = Some(sink);
    log::set_logger(&LOGGER)
        .map(|()| log::set_max_level(LevelFilter::Debug))
        .ok();
}

/// Kernel-side `EVENT_PRINT` handler: decode the inline payload text and
/// route it through the log facade.
pub(crate) fn log_print_event(msg: &Message) {
    let bytes = msg.payload_bytes();
    let text = core::str::from_utf8(&bytes[..msg.text_len()]).unwrap_or("<invalid>");
    log::info!(target: "bus", "{}", text);
}

//! Console logger for the packer.
//!
//! Engine records go to stderr, one colour per level, so they never mix with the tree
//! printed on stdout. The `LOG` environment variable picks the level at run time.

use log::{Level, LevelFilter, Log, Metadata, Record};

struct StderrLogger;

/// ANSI foreground colour for a level
fn color(level: Level) -> u8 {
    match level {
        Level::Error => 31,
        Level::Warn => 93,
        Level::Info => 34,
        Level::Debug => 32,
        Level::Trace => 90,
    }
}

/// Level named by a `LOG` value; anything unrecognised turns logging off
fn level_filter(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|name| name.parse().ok())
        .unwrap_or(LevelFilter::Off)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            eprintln!(
                "\u{1B}[{}m[{:>5}] {}: {}\u{1B}[0m",
                color(record.level()),
                record.level(),
                record.target(),
                record.args(),
            );
        }
    }

    fn flush(&self) {}
}

/// Install the logger; a second call keeps the first logger
pub fn init() {
    static LOGGER: StderrLogger = StderrLogger;
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_filter(std::env::var("LOG").ok().as_deref()));
    }
}

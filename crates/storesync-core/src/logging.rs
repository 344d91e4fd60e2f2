//! Logging setup: env_logger backend, routed through indicatif in TTY mode

use std::fmt::Write as _;

use indicatif::MultiProgress;
use log::Level;

const RESET: &str = "\x1b[0m";

fn level_label(level: Level) -> &'static str {
    match level {
        Level::Error => "ERROR",
        Level::Warn => "WARN ",
        Level::Info => "INFO ",
        Level::Debug => "DEBUG",
        Level::Trace => "TRACE",
    }
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Error => "\x1b[31m",
        Level::Warn => "\x1b[33m",
        Level::Info => "\x1b[32m",
        Level::Debug => "\x1b[36m",
        Level::Trace => "\x1b[35m",
    }
}

/// `[LEVEL] message`, with the label colored when `color` is set.
/// Debug and trace lines also name the emitting module.
fn render(level: Level, target: &str, args: &std::fmt::Arguments<'_>, color: bool) -> String {
    let mut line = String::with_capacity(64);
    if color {
        let _ = write!(line, "[{}{}{RESET}] ", level_color(level), level_label(level));
    } else {
        let _ = write!(line, "[{}] ", level_label(level));
    }
    if level >= Level::Debug {
        let _ = write!(line, "{target}: ");
    }
    let _ = write!(line, "{args}");
    line
}

/// Default filter for the given verbosity flags; `debug` wins over `quiet`.
pub fn default_filter(quiet: bool, debug: bool) -> &'static str {
    match (debug, quiet) {
        (true, _) => "debug",
        (false, true) => "warn",
        (false, false) => "info",
    }
}

/// Log sink for TTY runs: filtering is delegated to env_logger, output is
/// printed with the progress bars suspended so lines never split a bar.
pub struct IndicatifLogger {
    filter: env_logger::Logger,
    bars: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(filter: env_logger::Logger, bars: MultiProgress) -> Self {
        Self { filter, bars }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.filter.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if !self.filter.matches(record) {
            return;
        }
        let line = render(record.level(), record.target(), record.args(), true);
        self.bars.suspend(|| eprintln!("{line}"));
    }

    fn flush(&self) {}
}

/// Initialize logging once per process. `RUST_LOG` overrides the default level.
///
/// With `multi` (TTY mode) lines go through the progress bars; otherwise
/// plain `[LEVEL] message` lines without colors. A second call is a no-op.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let env = env_logger::Env::default().default_filter_or(default_filter(quiet, debug));
    let mut builder = env_logger::Builder::from_env(env);

    let Some(multi) = multi else {
        let _ = builder
            .format(|buf, record| {
                let line = render(record.level(), record.target(), record.args(), false);
                writeln!(buf, "{line}")
            })
            .try_init();
        return;
    };

    let filter = builder.build();
    let max_level = filter.filter();
    if log::set_boxed_logger(Box::new(IndicatifLogger::new(filter, multi.clone()))).is_ok() {
        log::set_max_level(max_level);
    }
}

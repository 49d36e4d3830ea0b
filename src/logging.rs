//! Console logger behind the `log` facade.
//!
//! Errors always reach the console. Everything else is only printed when the
//! page opted into verbose output (see [`crate::config::HookConfig::verbose`]).

use log::{Level, LevelFilter, Log, Metadata, Record};

pub const TAG: &str = "KEEPVOLUME";

#[derive(Debug, Clone)]
pub struct ConsoleLogger {
    tag: &'static str,
    verbose: bool,
}

impl ConsoleLogger {
    pub fn new(tag: &'static str, verbose: bool) -> Self {
        Self { tag, verbose }
    }

    pub fn max_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Error
        }
    }

    fn format(&self, record: &Record) -> String {
        format!("[{}] {}", self.tag, record.args())
    }
}

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        emit(record.level(), &self.format(record));
    }

    fn flush(&self) {}
}

#[cfg(target_arch = "wasm32")]
fn emit(level: Level, line: &str) {
    let line = wasm_bindgen::JsValue::from_str(line);
    match level {
        Level::Error => web_sys::console::error_1(&line),
        Level::Warn => web_sys::console::warn_1(&line),
        Level::Info => web_sys::console::info_1(&line),
        Level::Debug | Level::Trace => web_sys::console::debug_1(&line),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(level: Level, line: &str) {
    eprintln!("{line} ({})", level.as_str().to_ascii_lowercase());
}

/// Installs the console logger. Only the first call has any effect.
pub fn init(verbose: bool) {
    let logger = ConsoleLogger::new(TAG, verbose);
    let max_level = logger.max_level();
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(max_level);
    }
}

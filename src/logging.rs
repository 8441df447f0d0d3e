//! Installs the global logger behind the `log` facade.
//!
//! In the browser, records are forwarded to the developer console; on native targets (tests and
//! tools) `env_logger` writes them to stderr, and `RUST_LOG` may override the configured level.

use std::sync::Once;

use log::LevelFilter;

static INIT: Once = Once::new();

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct LoggingConfig {
    level: LevelFilter,
}

impl LoggingConfig {
    pub fn new(level: LevelFilter) -> Self {
        LoggingConfig { level }
    }

    /// The most verbose level that will be logged.
    pub fn level(&self) -> LevelFilter {
        self.level
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LevelFilter::Info,
        }
    }
}

/// Installs the logger. Only the first call has any effect.
///
/// Returns `true` if this call installed the logger, `false` if a logger was already installed
/// (by an earlier call, or by some other crate).
pub fn init_logging(config: LoggingConfig) -> bool {
    let mut installed = false;

    INIT.call_once(|| {
        installed = install(config.level);
    });

    installed
}

#[cfg(not(target_arch = "wasm32"))]
fn install(level: LevelFilter) -> bool {
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()
        .is_ok()
}

#[cfg(target_arch = "wasm32")]
fn install(level: LevelFilter) -> bool {
    static LOGGER: console::ConsoleLogger = console::ConsoleLogger;

    match log::set_logger(&LOGGER) {
        Ok(()) => {
            log::set_max_level(level);

            true
        }
        Err(_) => false,
    }
}

#[cfg(target_arch = "wasm32")]
mod console {
    use log::{Level, Log, Metadata, Record};
    use wasm_bindgen::JsValue;
    use web_sys::console;

    /// Writes log records to the browser's developer console, at the matching console level.
    pub(super) struct ConsoleLogger;

    impl Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }

            let message = JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));

            match record.level() {
                Level::Error => console::error_1(&message),
                Level::Warn => console::warn_1(&message),
                Level::Info => console::info_1(&message),
                Level::Debug | Level::Trace => console::debug_1(&message),
            }
        }

        fn flush(&self) {}
    }
}

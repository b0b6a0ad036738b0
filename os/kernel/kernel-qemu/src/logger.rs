use crate::qemu_trace;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

/// `log` backend writing `[LEVEL] target: message` lines to the debug port.
///
/// Level filtering uses the global [`log::max_level`], so there is exactly
/// one knob to turn.
pub struct QemuLogger {
    _private: (),
}

static LOGGER: QemuLogger = QemuLogger { _private: () };

impl QemuLogger {
    /// Install the logger and set the global maximum level.
    ///
    /// Call this once during early init.
    ///
    /// # Errors
    /// Another logger has already been installed.
    pub fn init(max_level: LevelFilter) -> Result<(), SetLoggerError> {
        log::set_logger(&LOGGER)?;
        log::set_max_level(max_level);
        Ok(())
    }
}

impl Log for QemuLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        qemu_trace!(
            "[{}] {}: {}\n",
            record.level(),
            record.target(),
            record.args()
        );
    }

    fn flush(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installs_once() {
        assert!(QemuLogger::init(LevelFilter::Warn).is_ok());
        assert_eq!(log::max_level(), LevelFilter::Warn);
        assert!(QemuLogger::init(LevelFilter::Trace).is_err());
        assert_eq!(log::max_level(), LevelFilter::Warn);

        let warn = Metadata::builder().level(log::Level::Warn).build();
        let debug = Metadata::builder().level(log::Level::Debug).build();
        assert!(LOGGER.enabled(&warn));
        assert!(!LOGGER.enabled(&debug));
    }
}

use tracing::Level;

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

/// Emit a log event whose message is only built when the level is enabled. The hot paths in the
/// parser and interpreter call this on every token and node, so formatting must stay lazy.
pub fn log<F>(level: LogLevel, message: F)
where
    F: FnOnce() -> String,
{
    match level {
        LogLevel::Error => {
            if tracing::enabled!(Level::ERROR) {
                tracing::error!("{}", message());
            }
        }
        LogLevel::Warn => {
            if tracing::enabled!(Level::WARN) {
                tracing::warn!("{}", message());
            }
        }
        LogLevel::Info => {
            if tracing::enabled!(Level::INFO) {
                tracing::info!("{}", message());
            }
        }
        LogLevel::Debug => {
            if tracing::enabled!(Level::DEBUG) {
                tracing::debug!("{}", message());
            }
        }
        LogLevel::Trace => {
            if tracing::enabled!(Level::TRACE) {
                tracing::trace!("{}", message());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_is_lazy_without_subscriber() {
        let mut built = false;
        log(LogLevel::Trace, || {
            built = true;
            "unused".to_string()
        });
        assert!(!built);
    }

    #[test]
    fn levels_map_to_tracing() {
        assert_eq!(Level::from(LogLevel::Warn), Level::WARN);
        assert_eq!(Level::from(LogLevel::Trace), Level::TRACE);
    }
}

//! log macro's for analysis logging

/// Writes a debug! message to the app::analysis logger
#[macro_export]
macro_rules! analysis_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::analysis", $($arg)+)
    };
}

/// Writes an info! message to the app::analysis logger
#[macro_export]
macro_rules! analysis_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::analysis", $($arg)+)
    };
}

/// Writes an warn! message to the app::analysis logger
#[macro_export]
macro_rules! analysis_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::analysis", $($arg)+)
    };
}

/// Writes an error! message to the app::analysis logger
#[macro_export]
macro_rules! analysis_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::analysis", $($arg)+)
    };
}

//! log macro's for geo logging

/// Writes a debug! message to the app::geo logger
#[macro_export]
macro_rules! geo_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::geo", $($arg)+)
    };
}

/// Writes an info! message to the app::geo logger
#[macro_export]
macro_rules! geo_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::geo", $($arg)+)
    };
}

/// Writes an warn! message to the app::geo logger
#[macro_export]
macro_rules! geo_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::geo", $($arg)+)
    };
}

/// Writes an error! message to the app::geo logger
#[macro_export]
macro_rules! geo_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::geo", $($arg)+)
    };
}

//! log macro's for client logging

/// Writes a debug! message to the app::client logger
#[macro_export]
macro_rules! client_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::client", $($arg)+)
    };
}

/// Writes an info! message to the app::client logger
#[macro_export]
macro_rules! client_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::client", $($arg)+)
    };
}

/// Writes an warn! message to the app::client logger
#[macro_export]
macro_rules! client_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::client", $($arg)+)
    };
}

/// Writes an error! message to the app::client logger
#[macro_export]
macro_rules! client_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::client", $($arg)+)
    };
}

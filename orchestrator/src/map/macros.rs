//! log macro's for map logging

/// Writes a debug! message to the app::map logger
#[macro_export]
macro_rules! map_debug {
    ($($arg:tt)+) => {
        log::debug!(target: "app::map", $($arg)+)
    };
}

/// Writes an info! message to the app::map logger
#[macro_export]
macro_rules! map_info {
    ($($arg:tt)+) => {
        log::info!(target: "app::map", $($arg)+)
    };
}

/// Writes an warn! message to the app::map logger
#[macro_export]
macro_rules! map_warn {
    ($($arg:tt)+) => {
        log::warn!(target: "app::map", $($arg)+)
    };
}

/// Writes an error! message to the app::map logger
#[macro_export]
macro_rules! map_error {
    ($($arg:tt)+) => {
        log::error!(target: "app::map", $($arg)+)
    };
}

pub mod config;
pub mod error;
pub mod measurement;
pub mod network;

#[doc(hidden)]
pub use tracing as __tracing;

/// Target used for plain user-facing lines (tables, headers, separators).
pub const PRINT_TARGET: &str = "edgeprobe::print";

/// Target used for positive outcome messages.
pub const SUCCESS_TARGET: &str = "edgeprobe::success";

#[macro_export]
macro_rules! success {
    ($($arg:tt)*) => {
        $crate::__tracing::info!(target: "edgeprobe::success", $($arg)*)
    };
}

#[macro_export]
macro_rules! warn {
    ($($arg:tt)*) => {
        $crate::__tracing::warn!($($arg)*)
    };
}

#![deny(missing_docs)]
//! Shared logging utilities for the zds2grav workspace.
//!
//! This crate provides the `grav_*` logging macros used across the codebase,
//! a per-thread "document in scope" marker that the macros prefix onto every
//! message, and a minimal test initializer for the global logger.

use std::cell::RefCell;

#[doc(hidden)]
pub use log;

thread_local! {
    /// Slug of the document currently being converted on this thread.
    static CURRENT_DOCUMENT: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Returns the document slug currently in scope on this thread, if any.
pub fn current_document() -> Option<String> {
    CURRENT_DOCUMENT.with(|doc| doc.borrow().clone())
}

/// Guard that marks a document as being processed on the current thread.
///
/// While the guard is alive, every `grav_*` macro call made from this thread
/// is prefixed with `[slug]`. Dropping the guard restores whatever scope was
/// active before, so scopes nest.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct DocumentScope {
    previous: Option<String>,
}

impl DocumentScope {
    /// Enters a new document scope.
    pub fn enter(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        let previous = CURRENT_DOCUMENT.with(|doc| doc.borrow_mut().replace(slug));
        Self { previous }
    }
}

impl Drop for DocumentScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT_DOCUMENT.with(|doc| *doc.borrow_mut() = previous);
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __grav_log {
    ($level:expr, $($arg:tt)*) => {{
        let level = $level;
        if $crate::log::log_enabled!(level) {
            match $crate::current_document() {
                Some(doc) => $crate::log::log!(level, "[{}] {}", doc, format_args!($($arg)*)),
                None => $crate::log::log!(level, $($arg)*),
            }
        }
    }};
}

/// Logs a trace-level message using the global logging facade.
#[macro_export]
macro_rules! grav_trace {
    ($($arg:tt)*) => {
        $crate::__grav_log!($crate::log::Level::Trace, $($arg)*)
    };
}

/// Logs a debug-level message using the global logging facade.
#[macro_export]
macro_rules! grav_debug {
    ($($arg:tt)*) => {
        $crate::__grav_log!($crate::log::Level::Debug, $($arg)*)
    };
}

/// Logs an info-level message using the global logging facade.
#[macro_export]
macro_rules! grav_info {
    ($($arg:tt)*) => {
        $crate::__grav_log!($crate::log::Level::Info, $($arg)*)
    };
}

/// Logs a warn-level message using the global logging facade.
#[macro_export]
macro_rules! grav_warn {
    ($($arg:tt)*) => {
        $crate::__grav_log!($crate::log::Level::Warn, $($arg)*)
    };
}

/// Logs an error-level message using the global logging facade.
#[macro_export]
macro_rules! grav_error {
    ($($arg:tt)*) => {
        $crate::__grav_log!($crate::log::Level::Error, $($arg)*)
    };
}

/// Initializes a simple terminal logger for use in unit tests.
///
/// This safely no-ops if another logger has already been initialized.
pub fn initialize_for_tests() {
    use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

    // Use debug level in debug builds, info in release builds.
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // Ignore the error if a logger was already set by another test.
    let _ = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )]);
}

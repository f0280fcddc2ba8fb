//! Status reporting collaborator
//!
//! The core never renders anything itself; user-visible messages go through
//! a [`StatusSink`] owned by whoever drives the session or launcher.

use log::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Receives user-visible status messages. Implementations decide how to
/// present them; the default forwards to the log facade.
pub trait StatusSink {
    fn report(&mut self, message: &str, severity: Severity);
}

/// Default sink backed by the `log` crate.
#[derive(Debug, Default)]
pub struct LogSink;

impl StatusSink for LogSink {
    fn report(&mut self, message: &str, severity: Severity) {
        match severity {
            Severity::Info => info!("{}", message),
            Severity::Warning => warn!("{}", message),
            Severity::Error => error!("{}", message),
        }
    }
}

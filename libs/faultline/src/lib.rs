//! Error annotation and propagation pipeline for request-handling code.
//!
//! A raw failure entering the pipeline is stamped with structured metadata
//! exactly once ([`report()`]), logged through a pluggable sink, and carries
//! an HTTP-style status plus a whitelisted response payload from then on.
//! Catch sites either re-raise it up the chain ([`raise`] / failure-mode
//! [`repeat`]), terminate the chain with a substitute value (substitute
//! mode), or hand it to an external mechanism ([`stop`]). A terminal
//! boundary answers the caller from [`status_of`] / [`response_of`]
//! without ever inspecting the envelope directly.
//!
//! The top-level functions run against the process-wide configuration
//! (see [`setup`]); [`Pipeline`] carries an explicit configuration for
//! injection and testing.
//!
//! # Example
//!
//! ```ignore
//! use faultline::{ConfigUpdate, Fault, ReportOptions};
//!
//! faultline::setup(ConfigUpdate::new().prefix("BILLING").responses(["message"]));
//!
//! async fn charge() -> Result<Receipt, Fault> {
//!     let invoice = load_invoice()
//!         .await
//!         .map_err(Fault::new)
//!         .or_else(|e| faultline::raise(e, ReportOptions::new().name("INVOICE_LOAD").status(502)))?;
//!     // ...
//! }
//!
//! // terminal boundary
//! let reply = faultline::response_of(&fault);
//! ```

pub mod config;
pub mod error;
pub mod fault;
pub mod logger;
pub mod pipeline;
pub mod report;
pub mod request;
pub mod template;

// Re-export the public surface
pub use config::{Config, ConfigUpdate, DEFAULT_PREFIX, DEFAULT_STATUS, setup};
pub use error::Error;
pub use fault::{
    CENSORED, Envelope, Fault, RESPONSE_OVERRIDE, ReportStatus, SILENCED_SUFFIX, UNDEFINED_ERROR,
    UNREPORTED,
};
pub use logger::{LogSink, TracingSink};
pub use pipeline::{Caught, Pipeline, Propagation, Recover, Reply, Substituted};
pub use report::{ReportOptions, report, respond};
pub use request::{RequestInfo, RequestLike};
pub use template::ResponseMap;

/// Catch-site entry point against the process-wide configuration.
///
/// See [`Pipeline::repeat`].
pub fn repeat<T>(caught: Caught<T>, options: Option<ReportOptions>) -> Propagation<T> {
    Pipeline::new().repeat(caught, options)
}

/// Annotate and re-raise against the process-wide configuration.
///
/// See [`Pipeline::raise`].
///
/// # Errors
///
/// Always returns the annotated fault — that is the re-raise.
pub fn raise<T>(fault: impl Into<Fault>, options: ReportOptions) -> Result<T, Fault> {
    Pipeline::new().raise(fault, options)
}

/// Terminal handler against the process-wide configuration.
///
/// See [`Pipeline::stop`].
pub fn stop(fault: &mut Fault, options: ReportOptions) {
    Pipeline::new().stop(fault, options);
}

/// Resolved status against the process-wide configuration.
///
/// See [`Pipeline::status_of`].
#[must_use]
pub fn status_of(fault: &Fault) -> ReportStatus {
    Pipeline::new().status_of(fault)
}

/// Caller-facing reply against the process-wide configuration.
///
/// See [`Pipeline::response_of`].
#[must_use]
pub fn response_of(fault: &Fault) -> Reply {
    Pipeline::new().response_of(fault)
}

//! Process-wide configuration store.
//!
//! Every core operation takes its [`Config`] explicitly (usually through a
//! [`Pipeline`](crate::pipeline::Pipeline) snapshot), so behavior is a pure
//! function of `(fault, options, config)`. A process-wide default instance
//! exists purely for ergonomic top-level use; it is meant to be written
//! during initialization, not per request.

use arc_swap::ArcSwap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use crate::logger::{LogSink, TracingSink};

/// Status used when a report supplies none.
pub const DEFAULT_STATUS: u16 = 500;

/// Name prefix used when none is configured.
pub const DEFAULT_PREFIX: &str = "SERVER_ERROR";

/// Pipeline settings.
#[derive(Clone)]
pub struct Config {
    /// Default HTTP-style status for reports that supply none.
    pub status: u16,
    /// Namespace prefix composed into every stamped failure name.
    pub prefix: String,
    /// Logging sink invoked on first reports and effective overrides.
    pub logger: Arc<dyn LogSink>,
    /// Emit a diagnostic trace line on every re-raise.
    pub debug: bool,
    /// Allow later call sites to revise status/response/context on an
    /// already-reported fault.
    pub override_responses: bool,
    /// Ordered whitelist of response field names; `None` disables response
    /// payloads entirely.
    pub template: Option<Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            status: DEFAULT_STATUS,
            prefix: DEFAULT_PREFIX.to_owned(),
            logger: Arc::new(TracingSink),
            debug: false,
            override_responses: false,
            template: None,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("status", &self.status)
            .field("prefix", &self.prefix)
            .field("logger", &"<sink>")
            .field("debug", &self.debug)
            .field("override_responses", &self.override_responses)
            .field("template", &self.template)
            .finish()
    }
}

impl Config {
    /// Shallow-merge an update into this configuration.
    ///
    /// Last write wins per field; unspecified fields retain their prior
    /// value. A non-empty `responses` list in the update is sugar for
    /// setting the template whitelist.
    #[must_use]
    pub fn merged(&self, update: ConfigUpdate) -> Self {
        let ConfigUpdate {
            status,
            prefix,
            logger,
            debug,
            override_responses,
            mut template,
            responses,
        } = update;

        if let Some(responses) = responses {
            if !responses.is_empty() {
                template = Some(responses);
            }
        }

        Self {
            status: status.unwrap_or(self.status),
            prefix: prefix.unwrap_or_else(|| self.prefix.clone()),
            logger: logger.unwrap_or_else(|| Arc::clone(&self.logger)),
            debug: debug.unwrap_or(self.debug),
            override_responses: override_responses.unwrap_or(self.override_responses),
            template: template.or_else(|| self.template.clone()),
        }
    }
}

/// Partial configuration, applied with [`Config::merged`] or [`setup`].
#[derive(Default)]
pub struct ConfigUpdate {
    status: Option<u16>,
    prefix: Option<String>,
    logger: Option<Arc<dyn LogSink>>,
    debug: Option<bool>,
    override_responses: Option<bool>,
    template: Option<Vec<String>>,
    responses: Option<Vec<String>>,
}

impl ConfigUpdate {
    /// Start an empty update.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Default status for reports that supply none.
    #[must_use]
    pub fn status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    /// Namespace prefix for stamped failure names.
    #[must_use]
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Replace the logging sink.
    #[must_use]
    pub fn logger(mut self, logger: impl LogSink + 'static) -> Self {
        self.logger = Some(Arc::new(logger));
        self
    }

    /// Toggle the re-raise diagnostic trace line.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Allow later call sites to revise already-reported faults.
    #[must_use]
    pub fn override_responses(mut self, allow: bool) -> Self {
        self.override_responses = Some(allow);
        self
    }

    /// Set the response field whitelist directly.
    #[must_use]
    pub fn template(mut self, template: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.template = Some(template.into_iter().map(Into::into).collect());
        self
    }

    /// Sugar for [`template`](Self::template): a non-empty list of response
    /// field names becomes the whitelist.
    #[must_use]
    pub fn responses(mut self, responses: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.responses = Some(responses.into_iter().map(Into::into).collect());
        self
    }
}

static PROCESS_CONFIG: LazyLock<ArcSwap<Config>> =
    LazyLock::new(|| ArcSwap::from_pointee(Config::default()));

/// Merge an update into the process-wide configuration.
///
/// Intended for process initialization; concurrent calls during
/// steady-state traffic are a caller error (each call is itself atomic,
/// but two racing merges may interleave).
pub fn setup(update: ConfigUpdate) {
    let merged = PROCESS_CONFIG.load().merged(update);
    PROCESS_CONFIG.store(Arc::new(merged));
}

/// Lock-free snapshot of the process-wide configuration.
pub(crate) fn current() -> Arc<Config> {
    PROCESS_CONFIG.load_full()
}

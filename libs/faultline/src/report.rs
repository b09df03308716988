//! Reporter and Responder: first-time stamping and the override path.

use serde_json::Value;

use crate::config::Config;
use crate::fault::{CENSORED, Envelope, Fault, ReportStatus, RESPONSE_OVERRIDE, UNREPORTED};
use crate::request::{RequestInfo, RequestLike};
use crate::template::{self, ResponseMap};

/// Per-call options for [`report`] and [`respond`].
///
/// Every field is optional; [`report`] fills defaults from the
/// [`Config`], [`respond`] applies only what is present.
#[derive(Debug, Clone)]
pub struct ReportOptions {
    name: Option<String>,
    status: Option<ReportStatus>,
    context: Option<Value>,
    request: Option<RequestInfo>,
    censor: Option<bool>,
    responses: Option<ResponseMap>,
    log: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            name: None,
            status: None,
            context: None,
            request: None,
            censor: None,
            responses: None,
            log: true,
        }
    }
}

impl ReportOptions {
    /// Start an empty options set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Failure name, composed after the configured prefix.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// HTTP-style status to resolve for the caller.
    #[must_use]
    pub fn status(mut self, status: impl Into<ReportStatus>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Caller-supplied diagnostic payload.
    #[must_use]
    pub fn context(mut self, context: impl Into<Value>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Snapshot request-derived fields off the supplied request.
    #[must_use]
    pub fn request<R: RequestLike + ?Sized>(self, req: &R) -> Self {
        self.request_info(RequestInfo::capture(req))
    }

    /// Attach an already-captured request snapshot.
    #[must_use]
    pub fn request_info(mut self, info: RequestInfo) -> Self {
        self.request = Some(info);
        self
    }

    /// Redact request-body capture.
    #[must_use]
    pub fn censor(mut self, censor: bool) -> Self {
        self.censor = Some(censor);
        self
    }

    /// Response fields to project through the configured whitelist.
    #[must_use]
    pub fn responses(mut self, responses: ResponseMap) -> Self {
        self.responses = Some(responses);
        self
    }

    /// Suppress (or re-enable) the logging side effect for this call.
    #[must_use]
    pub fn log(mut self, log: bool) -> Self {
        self.log = log;
        self
    }

    pub(crate) fn take_name(&mut self) -> Option<String> {
        self.name.take()
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = Some(name);
    }

    pub(crate) fn force_status(&mut self, status: ReportStatus) {
        self.status = Some(status);
    }

    /// Field-wise merge, `overrides` winning where both are set. A log
    /// suppression on either side sticks.
    pub(crate) fn merged(defaults: Option<Self>, overrides: Option<Self>) -> Self {
        match (defaults, overrides) {
            (None, None) => Self::default(),
            (Some(only), None) | (None, Some(only)) => only,
            (Some(defaults), Some(overrides)) => Self {
                name: overrides.name.or(defaults.name),
                status: overrides.status.or(defaults.status),
                context: overrides.context.or(defaults.context),
                request: overrides.request.or(defaults.request),
                censor: overrides.censor.or(defaults.censor),
                responses: overrides.responses.or(defaults.responses),
                log: defaults.log && overrides.log,
            },
        }
    }
}

/// Stamp metadata onto an unreported fault and log it.
///
/// Idempotent: the first writer wins and later calls are complete no-ops.
/// This is the only operation that sets the capture timestamp.
pub fn report(fault: &mut Fault, options: ReportOptions, config: &Config) {
    if fault.reported() {
        return;
    }

    let ReportOptions {
        name,
        status,
        context,
        request,
        censor,
        responses,
        log,
    } = options;

    let censor = censor.unwrap_or(false);
    let name = name.unwrap_or_else(|| UNREPORTED.to_owned());
    let response = template::project(config.template.as_deref(), responses.as_ref())
        .map(|map| template::serialize(&map));
    let request = request.map(|info| if censor { info.censored() } else { info });

    fault.install(Envelope {
        name: format!("{} - {}", config.prefix, name),
        status: status.unwrap_or(ReportStatus::Code(config.status)),
        context,
        censor,
        time: now_millis(),
        response,
        request,
    });

    if log {
        config.logger.log(fault);
    }
}

/// Revise an already-reported fault.
///
/// Applies whatever the options carry — status, context, censorship,
/// response fields (re-projected through the configured whitelist),
/// request snapshot — and reports back whether anything actually changed.
/// When something did and logging is not suppressed, the sink sees the
/// fault under the [`RESPONSE_OVERRIDE`] marker name; the envelope's own
/// name is restored afterwards. `reported` and `time` are never touched.
///
/// Gating this path behind [`Config::override_responses`] is the caller's
/// job; on an unreported fault this is a no-op returning `false`.
pub fn respond(fault: &mut Fault, options: ReportOptions, config: &Config) -> bool {
    let ReportOptions {
        name: _,
        status,
        context,
        request,
        censor,
        responses,
        log,
    } = options;

    let Some(envelope) = fault.envelope_mut() else {
        return false;
    };

    let mut modified = false;

    if let Some(status) = status {
        if envelope.status != status {
            envelope.status = status;
            modified = true;
        }
    }

    if let Some(context) = context {
        if envelope.context.as_ref() != Some(&context) {
            envelope.context = Some(context);
            modified = true;
        }
    }

    if let Some(censor) = censor {
        if envelope.censor != censor {
            envelope.censor = censor;
            modified = true;
        }
        // Enabling redacts an existing capture; disabling never restores
        // a body that is already gone.
        if censor {
            if let Some(info) = envelope.request.take() {
                let redacted = info.clone().censored();
                if redacted != info {
                    modified = true;
                }
                envelope.request = Some(redacted);
            }
        }
    }

    if let Some(responses) = responses {
        let next = template::project(config.template.as_deref(), Some(&responses))
            .map(|map| template::serialize(&map));
        if envelope.response != next {
            envelope.response = next;
            modified = true;
        }
    }

    if let Some(info) = request {
        let effective = if envelope.censor { info.censored() } else { info };
        if envelope.request.as_ref() != Some(&effective) {
            envelope.request = Some(effective);
            modified = true;
        }
    }

    if modified && log {
        let original = fault
            .envelope_mut()
            .map(|envelope| std::mem::replace(&mut envelope.name, RESPONSE_OVERRIDE.to_owned()));
        config.logger.log(fault);
        if let (Some(envelope), Some(original)) = (fault.envelope_mut(), original) {
            envelope.name = original;
        }
    }

    modified
}

fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::SystemTime::UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

//! Propagation controller: the public catch-site surface.
//!
//! A [`Pipeline`] is an explicit configuration snapshot; every operation
//! on it is a pure function of `(fault, options, config)`. [`Pipeline::new`]
//! snapshots the process-wide configuration for top-level use.

use std::sync::Arc;

use crate::config::{self, Config};
use crate::fault::{Fault, ReportStatus, SILENCED_SUFFIX};
use crate::report::{ReportOptions, report, respond};
use crate::template::{self, ResponseMap};

/// What a catch site caught: a real failure to annotate and re-raise, or
/// a substitute value that will terminate the chain.
///
/// The caller resolves which side it holds; the pipeline never inspects
/// value shapes at runtime.
#[derive(Debug)]
pub enum Caught<T> {
    /// A failure travelling up the chain.
    Failure(Fault),
    /// Terminate the chain, resolving to this value instead (or to the
    /// failure itself when `None`).
    Substitute(Option<T>),
}

/// Outcome of [`Pipeline::repeat`].
#[derive(Debug)]
pub enum Propagation<T> {
    /// Failure mode: the annotated fault, to be propagated upward.
    Raise(Fault),
    /// Substitute mode: a deferred handler for the next catch stage.
    Handler(Recover<T>),
}

impl<T> Propagation<T> {
    /// Failure mode as `Err`, substitute mode as `Ok`.
    ///
    /// # Errors
    ///
    /// Returns the annotated fault when this is the failure mode — that is
    /// the re-raise.
    pub fn into_result(self) -> Result<Recover<T>, Fault> {
        match self {
            Self::Raise(fault) => Err(fault),
            Self::Handler(handler) => Ok(handler),
        }
    }
}

/// What a resolved substitution produced: the substitute value, or the
/// (annotated, silenced) fault when no substitution was armed.
#[derive(Debug)]
pub enum Substituted<T> {
    /// The substitute value; the chain resolves to it.
    Value(T),
    /// No substitution armed: the chain resolves to the fault itself,
    /// without re-raising.
    Fault(Fault),
}

impl<T> Substituted<T> {
    /// The substitute value, if one was resolved.
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Fault(_) => None,
        }
    }
}

/// Deferred substitution handler produced by a substitute-mode
/// [`repeat`](Pipeline::repeat), meant to be invoked at the next catch
/// stage.
#[derive(Debug)]
pub struct Recover<T> {
    value: Option<T>,
    defaults: Option<ReportOptions>,
    config: Arc<Config>,
}

impl<T> Recover<T> {
    /// Handle a failure arriving at this catch stage.
    ///
    /// An already-reported fault is revised under the override policy and
    /// re-raised. An unreported fault is reported silenced — its name gets
    /// the literal `"; SILENCED;"` suffix and its status is forced to the
    /// `"0"`-string sentinel — and the chain terminates: with the
    /// substitute value when the originating `repeat` supplied options
    /// (which also serve as defaults here, this call's options winning per
    /// field), with the fault itself otherwise.
    ///
    /// # Errors
    ///
    /// Returns the fault when it was already reported — the re-raise.
    pub fn resolve(
        self,
        mut fault: Fault,
        options: Option<ReportOptions>,
    ) -> Result<Substituted<T>, Fault> {
        let Self {
            value,
            defaults,
            config,
        } = self;

        if fault.reported() {
            if config.override_responses {
                respond(&mut fault, options.unwrap_or_default(), &config);
            }
            trace_reraise(&config, &fault);
            return Err(fault);
        }

        let armed = defaults.is_some();
        let mut merged = ReportOptions::merged(defaults, options);
        let base = merged.take_name().unwrap_or_default();
        merged.set_name(format!("{base}{SILENCED_SUFFIX}"));
        merged.force_status(ReportStatus::Silenced);
        report(&mut fault, merged, &config);

        match value {
            Some(value) if armed => Ok(Substituted::Value(value)),
            _ => Ok(Substituted::Fault(fault)),
        }
    }
}

/// Caller-facing reply resolved off a fault: the whitelisted response
/// payload when one was stamped, otherwise just the status.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Resolved status (the configured default when unreported).
    pub status: ReportStatus,
    /// Decoded response payload, when one was stamped and decodes
    /// cleanly.
    pub body: Option<ResponseMap>,
}

/// The propagation controller over one configuration snapshot.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Snapshot the process-wide configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: config::current(),
        }
    }

    /// Run against an explicit configuration.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// The configuration this pipeline runs against.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The catch-site entry point.
    ///
    /// Failure mode annotates (first report, or override under the
    /// configured policy) and hands the fault back for propagation.
    /// Substitute mode returns the deferred [`Recover`] handler; supplying
    /// `options` arms the substitution and provides defaults for the
    /// eventual silenced report.
    pub fn repeat<T>(&self, caught: Caught<T>, options: Option<ReportOptions>) -> Propagation<T> {
        match caught {
            Caught::Failure(mut fault) => {
                self.annotate(&mut fault, options.unwrap_or_default());
                trace_reraise(&self.config, &fault);
                Propagation::Raise(fault)
            }
            Caught::Substitute(value) => Propagation::Handler(Recover {
                value,
                defaults: options,
                config: Arc::clone(&self.config),
            }),
        }
    }

    /// Failure-mode [`repeat`](Self::repeat) that composes directly with
    /// `?` and async call chains: annotate, then propagate.
    ///
    /// # Errors
    ///
    /// Always returns the annotated fault — that is the re-raise.
    pub fn raise<T>(&self, fault: impl Into<Fault>, options: ReportOptions) -> Result<T, Fault> {
        let mut fault = fault.into();
        self.annotate(&mut fault, options);
        trace_reraise(&self.config, &fault);
        Err(fault)
    }

    /// Substitute-mode [`repeat`](Self::repeat): the chain will resolve to
    /// `value` only if [`Recover::resolve`] later sees an unreported fault
    /// *and* the substitution was armed via [`recover_with`](Self::recover_with).
    #[must_use]
    pub fn recover<T>(&self, value: T) -> Recover<T> {
        Recover {
            value: Some(value),
            defaults: None,
            config: Arc::clone(&self.config),
        }
    }

    /// Armed substitute-mode [`repeat`](Self::repeat); `options` also
    /// serve as defaults for the eventual silenced report.
    #[must_use]
    pub fn recover_with<T>(&self, value: T, options: ReportOptions) -> Recover<T> {
        Recover {
            value: Some(value),
            defaults: Some(options),
            config: Arc::clone(&self.config),
        }
    }

    /// Terminal handler for a boundary that forwards the fault onward
    /// itself: annotate in place, never re-raise, resolve nothing.
    pub fn stop(&self, fault: &mut Fault, options: ReportOptions) {
        self.annotate(fault, options);
    }

    /// Status to answer the caller with: the stamped status once
    /// reported, the configured default before that.
    #[must_use]
    pub fn status_of(&self, fault: &Fault) -> ReportStatus {
        fault
            .envelope()
            .map_or(ReportStatus::Code(self.config.status), |e| e.status)
    }

    /// Everything a terminal boundary needs to answer the caller.
    ///
    /// A stamped response payload that fails to decode degrades to the
    /// status-only shape rather than surfacing a secondary failure.
    #[must_use]
    pub fn response_of(&self, fault: &Fault) -> Reply {
        let body = fault
            .envelope()
            .and_then(|e| e.response.as_deref())
            .and_then(|raw| template::deserialize(raw).ok());
        Reply {
            status: self.status_of(fault),
            body,
        }
    }

    /// First report, or override under the configured policy.
    fn annotate(&self, fault: &mut Fault, options: ReportOptions) {
        if fault.reported() {
            if self.config.override_responses {
                respond(fault, options, &self.config);
            }
        } else {
            report(fault, options, &self.config);
        }
    }
}

/// Axum integration: answer the HTTP caller straight from a resolved
/// reply — the Rust-native form of a terminal output middleware.
#[cfg(feature = "axum")]
impl axum::response::IntoResponse for Reply {
    fn into_response(self) -> axum::response::Response {
        use serde_json::Value;

        let status = self.status.status_code();
        match self.body {
            Some(map) => {
                let mut resp = axum::Json(Value::Object(map)).into_response();
                *resp.status_mut() = status;
                resp
            }
            None => status.into_response(),
        }
    }
}

fn trace_reraise(config: &Config, fault: &Fault) {
    if config.debug {
        tracing::debug!(
            target: "faultline",
            name = fault.name().unwrap_or_default(),
            "fault re-raised"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::{CENSORED, RESPONSE_OVERRIDE, UNDEFINED_ERROR};
    use serde_json::{Value, json};
    use std::sync::{Arc, Mutex};

    fn recording_pipeline(mutate: impl FnOnce(&mut Config)) -> (Pipeline, Arc<Mutex<Vec<String>>>) {
        let seen: Arc<Mutex<Vec<String>>> = Arc::default();
        let sink = Arc::clone(&seen);
        let mut config = Config {
            logger: Arc::new(move |fault: &Fault| {
                let name = fault.name().unwrap_or("<unreported>").to_owned();
                sink.lock().unwrap().push(name);
            }),
            ..Config::default()
        };
        mutate(&mut config);
        (Pipeline::with_config(config), seen)
    }

    #[test]
    fn raise_reports_and_rethrows() {
        let (pipeline, seen) = recording_pipeline(|_| {});

        let result: Result<(), Fault> = pipeline.raise(
            Fault::msg("boom"),
            ReportOptions::new().name("LEVEL_3").status(502),
        );

        let fault = result.unwrap_err();
        assert_eq!(fault.name(), Some("SERVER_ERROR - LEVEL_3"));
        assert_eq!(pipeline.status_of(&fault), ReportStatus::Code(502));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn second_raise_is_a_noop_report_when_overrides_are_off() {
        let (pipeline, seen) = recording_pipeline(|_| {});

        let first: Result<(), Fault> =
            pipeline.raise(Fault::msg("boom"), ReportOptions::new().status(503));
        let fault = first.unwrap_err();

        let second: Result<(), Fault> =
            pipeline.raise(fault, ReportOptions::new().name("UPPER").status(404));
        let fault = second.unwrap_err();

        assert_eq!(pipeline.status_of(&fault), ReportStatus::Code(503));
        assert_eq!(fault.name(), Some("SERVER_ERROR - UNREPORTED"));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn second_raise_overrides_when_the_policy_allows() {
        let (pipeline, seen) = recording_pipeline(|c| c.override_responses = true);

        let first: Result<(), Fault> =
            pipeline.raise(Fault::msg("boom"), ReportOptions::new().status(503));
        let second: Result<(), Fault> =
            pipeline.raise(first.unwrap_err(), ReportOptions::new().status(404));
        let fault = second.unwrap_err();

        assert_eq!(pipeline.status_of(&fault), ReportStatus::Code(404));
        assert_eq!(
            seen.lock().unwrap().last().map(String::as_str),
            Some(RESPONSE_OVERRIDE)
        );
    }

    #[test]
    fn repeat_failure_mode_matches_raise() {
        let (pipeline, _seen) = recording_pipeline(|_| {});

        let propagation: Propagation<()> = pipeline.repeat(
            Caught::Failure(Fault::msg("boom")),
            Some(ReportOptions::new().name("CAUGHT")),
        );

        let fault = propagation.into_result().unwrap_err();
        assert_eq!(fault.name(), Some("SERVER_ERROR - CAUGHT"));
    }

    #[test]
    fn stop_is_terminal_and_annotates_in_place() {
        let (pipeline, seen) = recording_pipeline(|_| {});
        let mut fault = Fault::msg("boom");

        pipeline.stop(&mut fault, ReportOptions::new().name("EDGE").status(401));

        assert!(fault.reported());
        assert_eq!(pipeline.status_of(&fault), ReportStatus::Code(401));
        assert_eq!(seen.lock().unwrap().len(), 1);

        // Terminal call on an already-reported fault with overrides off:
        // nothing changes, nothing logs.
        pipeline.stop(&mut fault, ReportOptions::new().status(500));
        assert_eq!(pipeline.status_of(&fault), ReportStatus::Code(401));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn status_falls_back_to_the_configured_default() {
        let (pipeline, _seen) = recording_pipeline(|c| c.status = 503);
        let fault = Fault::msg("boom");
        assert_eq!(pipeline.status_of(&fault), ReportStatus::Code(503));
    }

    #[test]
    fn response_of_prefers_the_stamped_payload() {
        let (pipeline, _seen) =
            recording_pipeline(|c| c.template = Some(vec!["message".to_owned()]));

        let mut responses = ResponseMap::new();
        responses.insert("message".to_owned(), json!("try later"));
        let result: Result<(), Fault> = pipeline.raise(
            Fault::msg("boom"),
            ReportOptions::new().status(503).responses(responses),
        );
        let fault = result.unwrap_err();

        let reply = pipeline.response_of(&fault);
        assert_eq!(reply.status, ReportStatus::Code(503));
        assert_eq!(reply.body.unwrap()["message"], json!("try later"));
    }

    #[test]
    fn response_of_degrades_to_status_only() {
        let (pipeline, _seen) = recording_pipeline(|_| {});
        let fault = Fault::msg("boom");

        let reply = pipeline.response_of(&fault);
        assert_eq!(reply.status, ReportStatus::Code(500));
        assert_eq!(reply.body, None);
    }

    // Legacy quirk, preserved on purpose: an unarmed substitution still
    // reports the fault silenced (string-"0" status, "; SILENCED;" name
    // suffix) but resolves to the fault, not the substitute value.
    #[test]
    fn unarmed_substitution_silences_but_keeps_the_fault() {
        let (pipeline, seen) = recording_pipeline(|_| {});

        let handler = pipeline.recover(42);
        let resolved = handler.resolve(Fault::msg("boom"), None).unwrap();

        let fault = match resolved {
            Substituted::Fault(fault) => fault,
            Substituted::Value(v) => panic!("resolved to substitute {v}"),
        };
        assert!(fault.reported());
        assert!(fault.name().unwrap().ends_with(SILENCED_SUFFIX));
        assert!(pipeline.status_of(&fault).is_silenced());
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn armed_substitution_resolves_the_value() {
        let (pipeline, seen) = recording_pipeline(|_| {});

        let handler = pipeline.recover_with(42, ReportOptions::new().name("FALLBACK"));
        let resolved = handler
            .resolve(Fault::msg("boom"), Some(ReportOptions::new()))
            .unwrap();

        assert_eq!(resolved.into_value(), Some(42));
        // The silenced report still happened, under the armed defaults.
        assert_eq!(
            *seen.lock().unwrap(),
            [format!("SERVER_ERROR - FALLBACK{SILENCED_SUFFIX}")]
        );
    }

    #[test]
    fn substitution_rethrows_an_already_reported_fault() {
        let (pipeline, seen) = recording_pipeline(|_| {});

        let reported: Result<(), Fault> =
            pipeline.raise(Fault::msg("boom"), ReportOptions::new().status(503));
        let fault = reported.unwrap_err();

        let handler = pipeline.recover(42);
        let rethrown = handler.resolve(fault, None).unwrap_err();

        assert_eq!(pipeline.status_of(&rethrown), ReportStatus::Code(503));
        assert!(!rethrown.name().unwrap().ends_with(SILENCED_SUFFIX));
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn substitution_resolve_honors_the_override_policy() {
        let (pipeline, seen) = recording_pipeline(|c| c.override_responses = true);

        let reported: Result<(), Fault> =
            pipeline.raise(Fault::msg("boom"), ReportOptions::new().status(503));
        let fault = reported.unwrap_err();

        let handler = pipeline.recover(42);
        let rethrown = handler
            .resolve(fault, Some(ReportOptions::new().status(404)))
            .unwrap_err();

        assert_eq!(pipeline.status_of(&rethrown), ReportStatus::Code(404));
        assert_eq!(
            seen.lock().unwrap().last().map(String::as_str),
            Some(RESPONSE_OVERRIDE)
        );
    }

    #[test]
    fn undefined_faults_flow_through_the_pipeline() {
        let (pipeline, _seen) = recording_pipeline(|_| {});

        let result: Result<(), Fault> =
            pipeline.raise(Fault::from_boxed(None), ReportOptions::new());
        let fault = result.unwrap_err();

        assert_eq!(fault.message(), UNDEFINED_ERROR);
        assert!(fault.reported());
    }

    #[cfg(feature = "axum")]
    #[test]
    fn reply_renders_as_an_axum_response() {
        use axum::response::IntoResponse;

        let mut body = ResponseMap::new();
        body.insert("message".to_owned(), json!("try later"));
        let reply = Reply {
            status: ReportStatus::Code(503),
            body: Some(body),
        };

        let resp = reply.into_response();
        assert_eq!(resp.status(), http::StatusCode::SERVICE_UNAVAILABLE);
        let ct = resp
            .headers()
            .get(http::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        assert!(ct.starts_with("application/json"));
    }

    #[cfg(feature = "axum")]
    #[test]
    fn status_only_reply_and_sentinel_degrade_cleanly() {
        use axum::response::IntoResponse;

        let reply = Reply {
            status: ReportStatus::Code(404),
            body: None,
        };
        assert_eq!(reply.into_response().status(), http::StatusCode::NOT_FOUND);

        // The silenced sentinel is not a transportable status code.
        let silenced = Reply {
            status: ReportStatus::Silenced,
            body: None,
        };
        assert_eq!(
            silenced.into_response().status(),
            http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn raise_captures_request_context() {
        let (pipeline, _seen) = recording_pipeline(|_| {});
        let req = http::Request::builder()
            .uri("https://api.example.com/orders")
            .header("x-forwarded-for", "10.1.2.3")
            .body(json!({"card": "4111"}))
            .unwrap();

        let result: Result<(), Fault> = pipeline.raise(
            Fault::msg("boom"),
            ReportOptions::new().request(&req).censor(true),
        );
        let fault = result.unwrap_err();

        let info = fault.envelope().unwrap().request.as_ref().unwrap();
        assert_eq!(info.ip_addr.as_deref(), Some("10.1.2.3"));
        assert_eq!(info.req_body, Some(Value::String(CENSORED.to_owned())));
    }
}

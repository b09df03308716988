//! Failure wrapper and the metadata envelope stamped onto it.
//!
//! A [`Fault`] pairs the underlying error value with an optional
//! [`Envelope`]. The envelope is installed exactly once, by the first
//! report that observes the fault; everything after that either reads it
//! or goes through the override path.

use http::StatusCode;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use crate::request::RequestInfo;

/// Display name used when a report supplies no name of its own.
pub const UNREPORTED: &str = "UNREPORTED";

/// Name a fault receives when it is synthesized from nothing at all.
pub const UNDEFINED_ERROR: &str = "Undefined Error";

/// Name shown to the log sink when an override actually changed something.
pub const RESPONSE_OVERRIDE: &str = "RESPONSE_OVERRIDE";

/// Suffix appended to the name of a silenced report.
///
/// Kept byte-for-byte as the original wire form, including punctuation.
pub const SILENCED_SUFFIX: &str = "; SILENCED;";

/// Sentinel stored in place of a request body when capture is redacted.
pub const CENSORED: &str = "CENSORED";

/// Status stamped onto a reported fault.
///
/// Almost always an HTTP-style code. The exception is the silenced path,
/// which forces the literal string `"0"` on the wire — a legacy sentinel
/// distinguishing silenced reports from real ones. It is preserved here as
/// its own variant rather than normalized to a numeric zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportStatus {
    /// An HTTP-style status code.
    Code(u16),
    /// The `"0"`-string sentinel of a silenced report.
    Silenced,
}

impl ReportStatus {
    /// Numeric form; the silenced sentinel maps to `0`.
    #[must_use]
    pub fn as_u16(self) -> u16 {
        match self {
            Self::Code(code) => code,
            Self::Silenced => 0,
        }
    }

    /// Convert to an [`http::StatusCode`], falling back to 500 for values
    /// outside the valid range (including the silenced sentinel).
    #[must_use]
    pub fn status_code(self) -> StatusCode {
        StatusCode::from_u16(self.as_u16()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Whether this is the silenced sentinel.
    #[must_use]
    pub fn is_silenced(self) -> bool {
        matches!(self, Self::Silenced)
    }
}

impl From<u16> for ReportStatus {
    fn from(code: u16) -> Self {
        Self::Code(code)
    }
}

impl From<StatusCode> for ReportStatus {
    fn from(status: StatusCode) -> Self {
        Self::Code(status.as_u16())
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Code(code) => write!(f, "{code}"),
            Self::Silenced => f.write_str("0"),
        }
    }
}

/// Codes serialize as JSON numbers, the silenced sentinel as the literal
/// JSON string `"0"` — the original wire form.
impl Serialize for ReportStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Code(code) => serializer.serialize_u16(*code),
            Self::Silenced => serializer.serialize_str("0"),
        }
    }
}

impl<'de> Deserialize<'de> for ReportStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_u64()
                .and_then(|n| u16::try_from(n).ok())
                .map(ReportStatus::Code)
                .ok_or_else(|| serde::de::Error::custom("status out of range")),
            Value::String(s) if s == "0" => Ok(ReportStatus::Silenced),
            other => Err(serde::de::Error::custom(format!(
                "invalid status value: {other}"
            ))),
        }
    }
}

/// Metadata record attached to a fault by its first report.
///
/// Owned exclusively by the fault it annotates and mutated in place; it is
/// never detached or shared across propagation chains.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Prefixed display name, `"<prefix> - <supplied name>"`.
    pub name: String,
    /// Resolved status for the caller-facing reply.
    pub status: ReportStatus,
    /// Caller-supplied diagnostic payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    /// Whether request-body capture is redacted.
    pub censor: bool,
    /// Capture timestamp, epoch milliseconds; set once and never changed.
    pub time: u64,
    /// Serialized whitelisted response payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Snapshot of the request the failure surfaced under, if one was
    /// supplied.
    #[serde(flatten)]
    pub request: Option<RequestInfo>,
}

/// A failure travelling through the propagation pipeline.
///
/// Wraps the raw error value (or a plain message) and owns the envelope
/// slot. `reported` is exactly "the envelope slot is filled"; the slot is
/// written once and never cleared.
#[derive(Debug)]
pub struct Fault {
    message: String,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
    envelope: Option<Envelope>,
}

impl Fault {
    /// Wrap a concrete error value.
    pub fn new<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Box::new(err)),
            envelope: None,
        }
    }

    /// Create a fault from a bare message, with no underlying source.
    pub fn msg(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
            envelope: None,
        }
    }

    /// Placeholder fault for call sites that caught nothing usable.
    ///
    /// Keeps propagation total: a boundary handed a missing error still
    /// produces a real, reportable fault instead of a secondary failure.
    #[must_use]
    pub fn undefined() -> Self {
        Self::msg(UNDEFINED_ERROR)
    }

    /// Wrap an optional boxed error, synthesizing the
    /// [`undefined`](Self::undefined) placeholder when absent.
    #[must_use]
    pub fn from_boxed(source: Option<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        match source {
            Some(err) => Self {
                message: err.to_string(),
                source: Some(err),
                envelope: None,
            },
            None => Self::undefined(),
        }
    }

    /// Whether this fault has been reported.
    #[must_use]
    pub fn reported(&self) -> bool {
        self.envelope.is_some()
    }

    /// The envelope, if the fault has been reported.
    #[must_use]
    pub fn envelope(&self) -> Option<&Envelope> {
        self.envelope.as_ref()
    }

    /// Stamped display name, once reported.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.envelope.as_ref().map(|e| e.name.as_str())
    }

    /// Message of the underlying failure.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// First writer wins: installing over an existing envelope is a no-op.
    pub(crate) fn install(&mut self, envelope: Envelope) {
        if self.envelope.is_none() {
            self.envelope = Some(envelope);
        }
    }

    pub(crate) fn envelope_mut(&mut self) -> Option<&mut Envelope> {
        self.envelope.as_mut()
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::msg(message)
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::msg(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    fn stamped(name: &str, status: ReportStatus) -> Envelope {
        Envelope {
            name: name.to_owned(),
            status,
            context: None,
            censor: false,
            time: 1,
            response: None,
            request: None,
        }
    }

    #[test]
    fn wraps_error_and_preserves_source() {
        let fault = Fault::new(Boom);
        assert_eq!(fault.to_string(), "boom");
        assert!(fault.source().unwrap().downcast_ref::<Boom>().is_some());
        assert!(!fault.reported());
    }

    #[test]
    fn missing_error_becomes_undefined_placeholder() {
        let fault = Fault::from_boxed(None);
        assert_eq!(fault.message(), UNDEFINED_ERROR);
        assert!(fault.source().is_none());
    }

    #[test]
    fn envelope_installs_exactly_once() {
        let mut fault = Fault::msg("x");
        fault.install(stamped("FIRST", ReportStatus::Code(500)));
        fault.install(stamped("SECOND", ReportStatus::Code(404)));

        let envelope = fault.envelope().unwrap();
        assert_eq!(envelope.name, "FIRST");
        assert_eq!(envelope.status, ReportStatus::Code(500));
    }

    #[test]
    fn status_codes_serialize_as_numbers() {
        let json = serde_json::to_string(&ReportStatus::Code(404)).unwrap();
        assert_eq!(json, "404");
        let back: ReportStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ReportStatus::Code(404));
    }

    // Legacy quirk, preserved on purpose: the silenced sentinel is the
    // string "0", not the number 0.
    #[test]
    fn silenced_status_serializes_as_zero_string() {
        let json = serde_json::to_string(&ReportStatus::Silenced).unwrap();
        assert_eq!(json, "\"0\"");
        let back: ReportStatus = serde_json::from_str(&json).unwrap();
        assert!(back.is_silenced());
        assert_eq!(back.as_u16(), 0);
    }

    #[test]
    fn out_of_range_status_falls_back_to_500() {
        assert_eq!(
            ReportStatus::Silenced.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(ReportStatus::Code(404).status_code(), StatusCode::NOT_FOUND);
    }
}

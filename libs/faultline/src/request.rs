//! Read-only view over the hosting framework's request type.
//!
//! The pipeline never owns or drives a request; it reads a small fixed set
//! of fields off anything implementing [`RequestLike`] and snapshots them
//! into the envelope at report time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::fault::CENSORED;

/// The fixed field set the reporter reads off a request.
///
/// An implementation is provided for [`http::Request`] carrying any
/// serializable body. Framework-specific types (extractors, connection
/// info) can implement this directly to surface the fields `http::Request`
/// alone cannot, such as the peer address.
pub trait RequestLike {
    /// Client address advertised by a fronting proxy
    /// (`x-forwarded-for`), preferred over the connection peer.
    fn forwarded_for(&self) -> Option<String>;

    /// Connection-level peer address.
    fn remote_addr(&self) -> Option<String>;

    /// URL scheme, `"http"` when unknown.
    fn protocol(&self) -> String;

    /// Host the request was addressed to.
    fn host(&self) -> Option<String>;

    /// Path and query of the original request.
    fn original_url(&self) -> String;

    /// Captured request body, if any.
    fn body_value(&self) -> Option<Value>;

    /// Request method.
    fn method(&self) -> String;

    /// `user-agent` header.
    fn user_agent(&self) -> Option<String>;
}

/// Snapshot of request-derived envelope fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInfo {
    /// Forwarded client address, falling back to the connection peer.
    pub ip_addr: Option<String>,
    /// Reassembled request URL, `<protocol>://<host><path?query>`.
    pub req_url: String,
    /// Captured body, or the redaction sentinel.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub req_body: Option<Value>,
    /// Request method.
    pub req_method: String,
    /// `user-agent` header.
    pub user_agent: Option<String>,
}

impl RequestInfo {
    /// Snapshot the reportable fields off a request.
    pub fn capture<R: RequestLike + ?Sized>(req: &R) -> Self {
        Self {
            ip_addr: req.forwarded_for().or_else(|| req.remote_addr()),
            req_url: format!(
                "{}://{}{}",
                req.protocol(),
                req.host().unwrap_or_default(),
                req.original_url()
            ),
            req_body: req.body_value(),
            req_method: req.method(),
            user_agent: req.user_agent(),
        }
    }

    /// Replace the captured body with the redaction sentinel.
    pub(crate) fn censored(mut self) -> Self {
        self.req_body = Some(Value::String(CENSORED.to_owned()));
        self
    }
}

impl<T: Serialize> RequestLike for http::Request<T> {
    fn forwarded_for(&self) -> Option<String> {
        header(self, "x-forwarded-for")
    }

    // `http::Request` does not carry the connection peer; implement the
    // trait directly on a framework type to surface it.
    fn remote_addr(&self) -> Option<String> {
        None
    }

    fn protocol(&self) -> String {
        self.uri().scheme_str().unwrap_or("http").to_owned()
    }

    fn host(&self) -> Option<String> {
        self.uri()
            .host()
            .map(str::to_owned)
            .or_else(|| header(self, http::header::HOST.as_str()))
    }

    fn original_url(&self) -> String {
        self.uri()
            .path_and_query()
            .map_or_else(|| self.uri().path().to_owned(), |pq| pq.as_str().to_owned())
    }

    fn body_value(&self) -> Option<Value> {
        serde_json::to_value(self.body())
            .ok()
            .filter(|value| !value.is_null())
    }

    fn method(&self) -> String {
        self.method().as_str().to_owned()
    }

    fn user_agent(&self) -> Option<String> {
        header(self, http::header::USER_AGENT.as_str())
    }
}

fn header<T>(req: &http::Request<T>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
}

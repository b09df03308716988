use thiserror::Error;

/// Errors produced by this crate's own operations.
///
/// The propagation surface itself never fails — every entry point is total
/// over its inputs. The only fallible operation is decoding a stored
/// response payload back into a field map.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A stored response payload could not be decoded
    #[error("malformed response payload: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_response_preserves_source() {
        use std::error::Error as _;

        let bad = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err = Error::MalformedResponse(bad);
        assert!(err.source().is_some());
        assert!(err.to_string().starts_with("malformed response payload"));
    }
}

//! Response template engine.
//!
//! The configured template is a whitelist, not a passthrough: a projection
//! contains exactly the templated keys, no matter what the caller supplied.

use serde_json::Value;

use crate::error::Error;

/// Key→value mapping produced by [`project`] and consumed by the reply
/// surface.
pub type ResponseMap = serde_json::Map<String, Value>;

/// Project caller-supplied response fields onto the configured whitelist.
///
/// Returns `None` when templating is unconfigured or no fields were
/// supplied — no response payload is surfaced at all in that case.
/// Otherwise the result holds exactly the templated keys: supplied values
/// where present, JSON null placeholders where not. Keys outside the
/// template are dropped.
#[must_use]
pub fn project(template: Option<&[String]>, responses: Option<&ResponseMap>) -> Option<ResponseMap> {
    let (template, responses) = match (template, responses) {
        (Some(template), Some(responses)) => (template, responses),
        _ => return None,
    };

    Some(
        template
            .iter()
            .map(|key| {
                let value = responses.get(key).cloned().unwrap_or(Value::Null);
                (key.clone(), value)
            })
            .collect(),
    )
}

/// Serialize a projection to its transportable string form.
#[must_use]
pub fn serialize(map: &ResponseMap) -> String {
    Value::Object(map.clone()).to_string()
}

/// Decode a serialized projection back into a field map.
///
/// # Errors
///
/// Returns [`Error::MalformedResponse`] when the payload is not a JSON
/// object.
pub fn deserialize(raw: &str) -> Result<ResponseMap, Error> {
    Ok(serde_json::from_str(raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|&k| k.to_owned()).collect()
    }

    fn responses(pairs: &[(&str, &str)]) -> ResponseMap {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_owned(), Value::String(v.to_owned())))
            .collect()
    }

    #[test]
    fn unknown_keys_dropped_and_missing_keys_null() {
        let projected = project(
            Some(&template(&["a", "b"])),
            Some(&responses(&[("a", "x"), ("c", "y")])),
        )
        .unwrap();

        assert_eq!(projected.len(), 2);
        assert_eq!(projected["a"], json!("x"));
        assert_eq!(projected["b"], Value::Null);
        assert!(!projected.contains_key("c"));
    }

    #[test]
    fn absent_template_or_responses_yields_nothing() {
        assert_eq!(project(None, Some(&responses(&[("a", "x")]))), None);
        assert_eq!(project(Some(&template(&["a"])), None), None);
        assert_eq!(project(None, None), None);
    }

    #[test]
    fn round_trips_through_the_wire_form() {
        let projected = project(
            Some(&template(&["message", "code", "hint"])),
            Some(&responses(&[("message", "nope"), ("code", "E42")])),
        )
        .unwrap();

        let decoded = deserialize(&serialize(&projected)).unwrap();
        assert_eq!(decoded, projected);
    }

    #[test]
    fn deserialize_rejects_non_objects() {
        assert!(deserialize("[1, 2]").is_err());
        assert!(deserialize("{broken").is_err());
    }
}

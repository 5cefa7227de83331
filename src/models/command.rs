//! Control-plane command specs and decoded responses

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::TaskError;

/// A named control-plane command plus the validator that checks its output
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub name: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub test: String,
}

impl CommandSpec {
    pub fn new(name: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            test: test.into(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Command plus arguments as they appear on the wire
    pub fn display_line(&self) -> String {
        std::iter::once(self.name.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Structured value decoded from control channel output
#[derive(Clone, Debug, PartialEq)]
pub struct ControlResponse(Value);

impl ControlResponse {
    /// Decode the entire captured stdout; no partial decode
    pub fn decode(raw: &str) -> Result<Self, TaskError> {
        serde_json::from_str(raw)
            .map(ControlResponse)
            .map_err(|e| TaskError::Protocol {
                reason: e.to_string(),
                payload: raw.to_string(),
            })
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Compact serialization fed to validators
    pub fn to_canonical(&self) -> String {
        self.0.to_string()
    }
}

impl From<Value> for ControlResponse {
    fn from(value: Value) -> Self {
        ControlResponse(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_line() {
        let spec = CommandSpec::new("help", "http://x/test_help").with_args(["version"]);
        assert_eq!(spec.display_line(), "help version");
        assert_eq!(CommandSpec::new("dump", "u").display_line(), "dump");
    }

    #[test]
    fn test_decode_valid_document() {
        let resp = ControlResponse::decode("{\n  \"version\": \"0.1\",\n  \"n\": [1, 2]\n}\n").unwrap();
        assert_eq!(resp.value(), &json!({"version": "0.1", "n": [1, 2]}));
        assert_eq!(resp.to_canonical(), r#"{"n":[1,2],"version":"0.1"}"#);
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(ControlResponse::decode("42").unwrap().value(), &json!(42));
        assert_eq!(ControlResponse::decode("\"ok\"").unwrap().value(), &json!("ok"));
    }

    #[test]
    fn test_decode_rejects_garbage_and_trailing_data() {
        for raw in ["", "not json", "{\"a\": 1", "{} {}", "{\"a\":1} trailing"] {
            let err = ControlResponse::decode(raw).unwrap_err();
            match err {
                TaskError::Protocol { payload, .. } => assert_eq!(payload, raw),
                other => panic!("expected protocol error, got {other:?}"),
            }
        }
    }
}

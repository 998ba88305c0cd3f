use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A JSON field the coordinator sends either as a number or as a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(serde_json::Number),
    Text(String),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => n.as_f64(),
            Scalar::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Empty text and numeric zero are the coordinator's "unset" values.
    pub fn is_unset(&self) -> bool {
        match self {
            Scalar::Number(n) => n.as_f64() == Some(0.0),
            Scalar::Text(s) => s.is_empty(),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // whole floats print without the trailing ".0"
            Scalar::Number(n) => match n.as_f64() {
                Some(v) if n.is_f64() => write!(f, "{}", v),
                _ => write!(f, "{}", n),
            },
            Scalar::Text(s) => f.write_str(s),
        }
    }
}

impl From<u64> for Scalar {
    fn from(value: u64) -> Self {
        Scalar::Number(value.into())
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Scalar::Text(value.to_string())
    }
}

/// One raw log record pushed by the coordinator over `/sse`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Seconds since the epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Scalar>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<Scalar>,
    #[serde(rename = "sessionID", default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl LogEvent {
    pub fn new(timestamp: impl Into<Scalar>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Some(timestamp.into()),
            message: message.into(),
            ..Default::default()
        }
    }
}

/// A wallet key configuration as held by the coordinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletConfig {
    pub address: String,
    #[serde(rename = "sessionId", default)]
    pub session_id: String,
    #[serde(default)]
    pub participants: Vec<String>,
}

/// Normalised outcome of a backend call.
///
/// Transport failures and non-200 responses both surface as `error: true`;
/// `data` then carries whatever the server (or the transport) reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub error: bool,
    pub data: Value,
}

impl ApiResponse {
    pub fn ok(data: Value) -> Self {
        Self { error: false, data }
    }

    pub fn failure(data: impl Into<Value>) -> Self {
        Self {
            error: true,
            data: data.into(),
        }
    }

    /// Text form of `data` for notifications; strings are not re-quoted.
    pub fn data_text(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub address: &'a str,
}

#[derive(Debug, Serialize)]
pub struct SendEthRequest<'a> {
    pub address: &'a str,
    pub to: &'a str,
    /// Wei, as a decimal string
    pub amount: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_event_accepts_string_timestamp_and_numeric_round() {
        let raw = r#"{"sessionID":"s1","participant":"a","protocol":"dkg","round":2,"message":"hi","timestamp":"1700000000","ip":"10.0.0.1"}"#;
        let event: LogEvent = serde_json::from_str(raw).unwrap();

        assert_eq!(event.timestamp.as_ref().and_then(Scalar::as_f64), Some(1_700_000_000.0));
        assert_eq!(event.round, Some(Scalar::from(2u64)));
        assert_eq!(event.session_id.as_deref(), Some("s1"));
        assert_eq!(event.ip.as_deref(), Some("10.0.0.1"));
    }

    #[test]
    fn log_event_tolerates_missing_fields() {
        let event: LogEvent = serde_json::from_str(r#"{"message":"bare"}"#).unwrap();
        assert_eq!(event.message, "bare");
        assert!(event.timestamp.is_none());
        assert!(event.participant.is_none());
    }

    #[test]
    fn scalar_unset_values() {
        assert!(Scalar::from(0u64).is_unset());
        assert!(Scalar::from("").is_unset());
        assert!(!Scalar::from(3u64).is_unset());
        assert!(!Scalar::from("x").is_unset());
    }

    #[test]
    fn whole_float_round_prints_as_integer() {
        let event: LogEvent = serde_json::from_str(r#"{"message":"m","round":1.0}"#).unwrap();
        let round = event.round.unwrap();
        assert_eq!(round.to_string(), "1");

        let half: Scalar = serde_json::from_str("2.5").unwrap();
        assert_eq!(half.to_string(), "2.5");
        assert_eq!(Scalar::from(12u64).to_string(), "12");
    }

    #[test]
    fn wallet_config_uses_backend_field_names() {
        let raw = r#"{"address":"0xabc","sessionId":"42","participants":["a","b"]}"#;
        let config: WalletConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.session_id, "42");
        assert_eq!(config.participants, vec!["a", "b"]);
    }

    #[test]
    fn data_text_does_not_quote_strings() {
        assert_eq!(ApiResponse::failure("boom").data_text(), "boom");
        assert_eq!(
            ApiResponse::failure(serde_json::json!({"code": 1})).data_text(),
            r#"{"code":1}"#
        );
    }
}

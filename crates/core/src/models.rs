use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Signal schema version understood by this bridge.
pub const SIGNAL_VERSION: &str = "1";

// ---------------------------------------------------------------------------
// Signal
// ---------------------------------------------------------------------------

/// Trade direction.
///
/// Serialized uppercase (`BUY` / `SELL`) — that is what the EA and the
/// legacy `.sig` files carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("side must be BUY or SELL, got '{}'", other)),
        }
    }
}

/// A single trading instruction, produced upstream and delivered to the EA
/// exactly once via `GET /next`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    #[serde(default = "default_version")]
    pub version: String,
    /// Opaque unique id; generated when the producer omits it.
    #[serde(default = "generate_signal_id")]
    pub id: String,
    pub symbol: String,
    pub side: Side,
    pub volume: Decimal,
    /// Absent means market order.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Decimal>,
    /// Stop loss distance in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sl_pts: Option<u32>,
    /// Take profit distance in points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tp_pts: Option<u32>,
    #[serde(default = "Utc::now")]
    pub ts: DateTime<Utc>,
}

fn default_version() -> String {
    SIGNAL_VERSION.to_string()
}

/// uuid4 hex, no hyphens — matches ids the upstream producer generates.
pub fn generate_signal_id() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Validation errors for inbound records.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("unsupported signal version: {0}")]
    UnsupportedVersion(String),
    #[error("'{0}' is required and must be non-empty")]
    MissingField(&'static str),
    #[error("'volume' must be > 0")]
    NonPositiveVolume,
}

impl Signal {
    /// Create a market signal with a fresh id and current timestamp.
    pub fn market(symbol: &str, side: Side, volume: Decimal) -> Self {
        Self {
            version: default_version(),
            id: generate_signal_id(),
            symbol: symbol.to_string(),
            side,
            volume,
            price: None,
            sl_pts: None,
            tp_pts: None,
            ts: Utc::now(),
        }
    }

    /// Enforce the schema v1 invariants on a decoded record.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.version != SIGNAL_VERSION {
            return Err(ValidationError::UnsupportedVersion(self.version.clone()));
        }
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::MissingField("symbol"));
        }
        if self.volume <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveVolume);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Feedback
// ---------------------------------------------------------------------------

/// Execution outcome reported by the EA.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackStatus {
    Executed,
    Failed,
    Rejected,
}

/// A report correlating to a previously issued signal.
///
/// `signal_id` does not have to reference a signal the bridge still knows
/// about — once archived, the bridge is not the source of truth. Multiple
/// reports for the same id (partial fills, retries) are all retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub signal_id: String,
    pub status: FeedbackStatus,
    /// Venue-side identifier. Older EA builds send a numeric `order_ticket`.
    #[serde(
        default,
        alias = "order_ticket",
        deserialize_with = "de_reference",
        skip_serializing_if = "Option::is_none"
    )]
    pub order_reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_price: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Accepts either a string or a bare number for the order reference.
fn de_reference<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(D::Error::custom(format!(
            "order_reference must be a string or number, got {}",
            other
        ))),
    }
}

impl FeedbackRecord {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.signal_id.trim().is_empty() {
            return Err(ValidationError::MissingField("signal_id"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_side_round_trip() {
        assert_eq!(Side::from_str("buy").unwrap(), Side::Buy);
        assert_eq!(Side::from_str(" SELL ").unwrap(), Side::Sell);
        assert!(Side::from_str("hold").is_err());
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
    }

    #[test]
    fn test_signal_validation() {
        let mut sig = Signal::market("EURUSD", Side::Buy, Decimal::new(1, 2));
        assert!(sig.validate().is_ok());

        sig.volume = Decimal::ZERO;
        assert!(matches!(
            sig.validate(),
            Err(ValidationError::NonPositiveVolume)
        ));

        sig.volume = Decimal::ONE;
        sig.version = "2".to_string();
        assert!(matches!(
            sig.validate(),
            Err(ValidationError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn test_feedback_accepts_order_ticket_alias() {
        let raw = r#"{"signal_id":"s1","status":"executed","order_ticket":123456}"#;
        let fb: FeedbackRecord = serde_json::from_str(raw).unwrap();
        assert_eq!(fb.order_reference.as_deref(), Some("123456"));
        assert!(fb.validate().is_ok());
    }

    #[test]
    fn test_feedback_requires_signal_id() {
        let raw = r#"{"signal_id":"","status":"failed"}"#;
        let fb: FeedbackRecord = serde_json::from_str(raw).unwrap();
        assert!(fb.validate().is_err());
    }
}

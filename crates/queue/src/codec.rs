use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use sigbridge_core::{generate_signal_id, Signal, ValidationError};
use std::str::FromStr;

/// Errors from a single decode attempt.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid field: {0}")]
    Field(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// One on-disk signal encoding. Codecs are tried in a fixed priority order
/// by `decode_signal` — structured JSON first, then the legacy text format.
pub trait SignalCodec: Send + Sync {
    fn name(&self) -> &'static str;
    fn try_decode(&self, raw: &str) -> Result<Signal, DecodeError>;
}

/// Schema v1 JSON records (`*.sig.json`).
pub struct JsonCodec;

impl SignalCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn try_decode(&self, raw: &str) -> Result<Signal, DecodeError> {
        let mut signal: Signal = serde_json::from_str(raw)?;
        if signal.id.is_empty() {
            signal.id = generate_signal_id();
        }
        signal.validate()?;
        Ok(signal)
    }
}

/// Legacy line-oriented `key=value` records (`*.sig`).
///
/// Numeric fields are coerced: `volume`/`price` to decimals, `sl_pts`/
/// `tp_pts` to integers. Empty values count as absent.
pub struct LegacyCodec;

impl SignalCodec for LegacyCodec {
    fn name(&self) -> &'static str {
        "legacy"
    }

    fn try_decode(&self, raw: &str) -> Result<Signal, DecodeError> {
        let mut symbol = None;
        let mut side = None;
        let mut volume = None;
        let mut price = None;
        let mut sl_pts = None;
        let mut tp_pts = None;
        let mut ts = None;
        let mut id = None;

        for line in raw.lines() {
            let line = line.trim();
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match key {
                "symbol" => symbol = Some(value.to_string()),
                "side" => {
                    side = Some(value.parse().map_err(DecodeError::Field)?);
                }
                "volume" => volume = Some(parse_decimal(key, value)?),
                "price" => price = Some(parse_decimal(key, value)?),
                "sl_pts" => sl_pts = Some(parse_points(key, value)?),
                "tp_pts" => tp_pts = Some(parse_points(key, value)?),
                "ts" => ts = Some(parse_timestamp(value)?),
                "id" => id = Some(value.to_string()),
                _ => {}
            }
        }

        let signal = Signal {
            version: sigbridge_core::SIGNAL_VERSION.to_string(),
            id: id.unwrap_or_else(generate_signal_id),
            symbol: symbol.ok_or_else(|| DecodeError::Field("'symbol' is required".into()))?,
            side: side.ok_or_else(|| DecodeError::Field("'side' is required".into()))?,
            volume: volume.ok_or_else(|| DecodeError::Field("'volume' is required".into()))?,
            price,
            sl_pts,
            tp_pts,
            ts: ts.unwrap_or_else(Utc::now),
        };
        signal.validate()?;
        Ok(signal)
    }
}

/// Try each codec in priority order; the last error wins when all fail.
pub fn decode_signal(raw: &str) -> Result<Signal, DecodeError> {
    let codecs: [&dyn SignalCodec; 2] = [&JsonCodec, &LegacyCodec];
    let mut last_err = None;
    for codec in codecs {
        match codec.try_decode(raw) {
            Ok(signal) => return Ok(signal),
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.expect("at least one codec attempted"))
}

fn parse_decimal(field: &str, s: &str) -> Result<Decimal, DecodeError> {
    Decimal::from_str(s)
        .map_err(|e| DecodeError::Field(format!("'{}' must be a number ('{}'): {}", field, s, e)))
}

fn parse_points(field: &str, s: &str) -> Result<u32, DecodeError> {
    s.parse()
        .map_err(|e| DecodeError::Field(format!("'{}' must be a non-negative integer: {}", field, e)))
}

/// Accept RFC 3339 plus the naive ISO shapes producers actually write.
fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, DecodeError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err(DecodeError::Field(format!("'ts' is not a timestamp: '{}'", s)))
}

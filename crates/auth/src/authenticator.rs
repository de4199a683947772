use crate::policy::NetworkPolicy;
use crate::replay::ReplayCache;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::net::IpAddr;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Why a request was rejected. 401 variants mean a credential is missing,
/// 403 variants mean it was presented and failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("missing_token")]
    MissingToken,
    #[error("missing_hmac_headers")]
    MissingHmacHeaders,
    #[error("invalid_token")]
    InvalidToken,
    #[error("invalid_signature")]
    InvalidSignature,
    #[error("stale_or_replayed_timestamp")]
    StaleOrReplayed,
}

impl AuthError {
    /// True for the "credential absent" half of the taxonomy.
    pub fn is_missing_credential(&self) -> bool {
        matches!(self, AuthError::MissingToken | AuthError::MissingHmacHeaders)
    }
}

/// Which verification path accepted the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    TokenOnly,
    Hmac,
}

/// Header triple as extracted from the request. Absent headers stay `None`;
/// the authenticator decides what absence means per mode.
#[derive(Debug, Default)]
pub struct Credentials<'a> {
    pub token: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub signature: Option<&'a str>,
}

/// Validates inbound requests: token-only for trusted ranges, HMAC-SHA256
/// with anti-replay for everyone else.
pub struct Authenticator {
    token: String,
    hmac_secret: String,
    policy: NetworkPolicy,
    replay_window: Duration,
    cache: Mutex<ReplayCache>,
}

impl Authenticator {
    pub fn new(
        token: String,
        hmac_secret: String,
        policy: NetworkPolicy,
        replay_window: Duration,
        cache_capacity: usize,
    ) -> Self {
        let cache = Mutex::new(ReplayCache::new(cache_capacity, replay_window));
        Self {
            token,
            hmac_secret,
            policy,
            replay_window,
            cache,
        }
    }

    pub fn token_configured(&self) -> bool {
        !self.token.is_empty()
    }

    pub fn hmac_configured(&self) -> bool {
        !self.hmac_secret.is_empty()
    }

    /// Authorize one request. `body` is the raw request body (empty for GET).
    pub fn authorize(
        &self,
        peer: IpAddr,
        creds: &Credentials<'_>,
        body: &[u8],
    ) -> Result<AuthMode, AuthError> {
        let token = match creds.token {
            Some(t) if !t.is_empty() => t,
            _ => {
                warn!(peer = %peer, "missing token");
                return Err(AuthError::MissingToken);
            }
        };

        if !constant_time_eq(token.as_bytes(), self.token.as_bytes()) {
            warn!(peer = %peer, "invalid token");
            return Err(AuthError::InvalidToken);
        }

        if self.policy.is_token_only(peer) {
            info!(peer = %peer, "token-only auth ok");
            return Ok(AuthMode::TokenOnly);
        }

        let (ts, sig) = match (creds.timestamp, creds.signature) {
            (Some(ts), Some(sig)) if !ts.is_empty() && !sig.is_empty() => (ts, sig),
            _ => {
                warn!(peer = %peer, "missing HMAC headers");
                return Err(AuthError::MissingHmacHeaders);
            }
        };

        self.verify_signature(token, ts, sig, body).map_err(|e| {
            warn!(peer = %peer, "invalid HMAC signature");
            e
        })?;
        self.check_freshness(ts, sig)?;

        info!(peer = %peer, "HMAC auth ok");
        Ok(AuthMode::Hmac)
    }

    /// Expected signature: hex(HMAC-SHA256(secret, token "|" ts "|" body)).
    fn verify_signature(
        &self,
        token: &str,
        ts: &str,
        sig: &str,
        body: &[u8],
    ) -> Result<(), AuthError> {
        if self.hmac_secret.is_empty() {
            return Err(AuthError::InvalidSignature);
        }
        let provided = hex::decode(sig).map_err(|_| AuthError::InvalidSignature)?;

        let mut mac = HmacSha256::new_from_slice(self.hmac_secret.as_bytes())
            .map_err(|_| AuthError::InvalidSignature)?;
        mac.update(token.as_bytes());
        mac.update(b"|");
        mac.update(ts.as_bytes());
        mac.update(b"|");
        mac.update(body);

        mac.verify_slice(&provided)
            .map_err(|_| AuthError::InvalidSignature)
    }

    /// Drift window plus replay cache. Recording happens under the same lock
    /// as the membership check.
    fn check_freshness(&self, ts: &str, sig: &str) -> Result<(), AuthError> {
        let ts_value: f64 = ts.parse().map_err(|_| AuthError::StaleOrReplayed)?;
        let now = unix_now();
        if (now - ts_value).abs() > self.replay_window.as_secs_f64() {
            warn!(ts = ts_value, now = now, "timestamp drift too large");
            return Err(AuthError::StaleOrReplayed);
        }

        let key = format!("{}:{}", ts, sig);
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if !cache.check_and_record(&key, ts_value, now) {
            return Err(AuthError::StaleOrReplayed);
        }
        Ok(())
    }
}

/// Equality with no early-exit timing leakage.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// Sign a request the way the bridge verifies it. The EA-side client and the
/// tests share this so signer and verifier can never drift apart.
pub fn sign_request(secret: &str, token: &str, ts: &str, body: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(token.as_bytes());
    mac.update(b"|");
    mac.update(ts.as_bytes());
    mac.update(b"|");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sigbridge_core::BridgeConfig;

    const TOKEN: &str = "test-token";
    const SECRET: &str = "test-secret";

    fn auth() -> Authenticator {
        Authenticator::new(
            TOKEN.to_string(),
            SECRET.to_string(),
            NetworkPolicy::new(BridgeConfig::default_token_only_networks()),
            Duration::from_secs(300),
            1000,
        )
    }

    fn lan() -> IpAddr {
        "192.168.1.10".parse().unwrap()
    }

    fn wan() -> IpAddr {
        "203.0.113.5".parse().unwrap()
    }

    fn now_str() -> String {
        format!("{}", unix_now() as u64)
    }

    #[test]
    fn test_lan_token_only_accepts() {
        let creds = Credentials {
            token: Some(TOKEN),
            ..Default::default()
        };
        assert_eq!(auth().authorize(lan(), &creds, b""), Ok(AuthMode::TokenOnly));
    }

    #[test]
    fn test_missing_token_is_401_class() {
        let err = auth()
            .authorize(lan(), &Credentials::default(), b"")
            .unwrap_err();
        assert_eq!(err, AuthError::MissingToken);
        assert!(err.is_missing_credential());
    }

    #[test]
    fn test_wrong_token_is_403_class() {
        let creds = Credentials {
            token: Some("nope"),
            ..Default::default()
        };
        let err = auth().authorize(lan(), &creds, b"").unwrap_err();
        assert_eq!(err, AuthError::InvalidToken);
        assert!(!err.is_missing_credential());
    }

    #[test]
    fn test_wan_requires_hmac_headers() {
        let creds = Credentials {
            token: Some(TOKEN),
            ..Default::default()
        };
        assert_eq!(
            auth().authorize(wan(), &creds, b""),
            Err(AuthError::MissingHmacHeaders)
        );
    }

    #[test]
    fn test_valid_hmac_accepts() {
        let a = auth();
        let ts = now_str();
        let sig = sign_request(SECRET, TOKEN, &ts, b"");
        let creds = Credentials {
            token: Some(TOKEN),
            timestamp: Some(&ts),
            signature: Some(&sig),
        };
        assert_eq!(a.authorize(wan(), &creds, b""), Ok(AuthMode::Hmac));
    }

    #[test]
    fn test_exact_replay_rejected() {
        let a = auth();
        let ts = now_str();
        let sig = sign_request(SECRET, TOKEN, &ts, b"");
        let creds = Credentials {
            token: Some(TOKEN),
            timestamp: Some(&ts),
            signature: Some(&sig),
        };
        assert_eq!(a.authorize(wan(), &creds, b""), Ok(AuthMode::Hmac));
        assert_eq!(
            a.authorize(wan(), &creds, b""),
            Err(AuthError::StaleOrReplayed)
        );
    }

    #[test]
    fn test_stale_timestamp_rejected_despite_valid_signature() {
        let a = auth();
        let ts = format!("{}", unix_now() as u64 - 600);
        let sig = sign_request(SECRET, TOKEN, &ts, b"");
        let creds = Credentials {
            token: Some(TOKEN),
            timestamp: Some(&ts),
            signature: Some(&sig),
        };
        assert_eq!(
            a.authorize(wan(), &creds, b""),
            Err(AuthError::StaleOrReplayed)
        );
    }

    #[test]
    fn test_signature_over_wrong_body_rejected() {
        let a = auth();
        let ts = now_str();
        let sig = sign_request(SECRET, TOKEN, &ts, b"expected-body");
        let creds = Credentials {
            token: Some(TOKEN),
            timestamp: Some(&ts),
            signature: Some(&sig),
        };
        assert_eq!(
            a.authorize(wan(), &creds, b"tampered-body"),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_garbage_hex_signature_rejected() {
        let a = auth();
        let ts = now_str();
        let creds = Credentials {
            token: Some(TOKEN),
            timestamp: Some(&ts),
            signature: Some("zz-not-hex"),
        };
        assert_eq!(
            a.authorize(wan(), &creds, b""),
            Err(AuthError::InvalidSignature)
        );
    }

    #[test]
    fn test_token_only_mode_skips_replay_cache() {
        let a = auth();
        let creds = Credentials {
            token: Some(TOKEN),
            ..Default::default()
        };
        a.authorize(lan(), &creds, b"").unwrap();
        a.authorize(lan(), &creds, b"").unwrap();
        assert!(a.cache.lock().unwrap().is_empty());
    }
}

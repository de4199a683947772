use crate::store::QueueError;
use sigbridge_core::Signal;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// On-disk encoding for newly written signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalFormat {
    /// Structured schema v1 record (`*.sig.json`). Recommended.
    Json,
    /// Legacy `key=value` lines (`*.sig`), kept for old EA builds.
    Text,
}

impl SignalFormat {
    fn extension(&self) -> &'static str {
        match self {
            SignalFormat::Json => ".sig.json",
            SignalFormat::Text => ".sig",
        }
    }
}

impl std::str::FromStr for SignalFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(SignalFormat::Json),
            "text" => Ok(SignalFormat::Text),
            other => Err(format!("format must be 'json' or 'text', got '{}'", other)),
        }
    }
}

/// Write a signal file into the queue directory.
///
/// The write goes to a temp file in the same directory followed by a rename,
/// so a polling consumer can never observe a partial record. Filenames embed
/// the UTC timestamp, which keeps the directory listing in FIFO order.
pub fn write_signal(
    signal: &Signal,
    queue_dir: &Path,
    format: SignalFormat,
) -> Result<PathBuf, QueueError> {
    fs::create_dir_all(queue_dir)?;

    let name = format!(
        "{}_{}_{}{}",
        signal.symbol.replace('/', "_"),
        signal.side.as_str(),
        signal.ts.format("%Y%m%dT%H%M%SZ"),
        format.extension(),
    );
    let dest = queue_dir.join(&name);

    let body = match format {
        SignalFormat::Json => serde_json::to_string(signal).map_err(|e| {
            QueueError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?,
        SignalFormat::Text => encode_legacy(signal),
    };

    let tmp = queue_dir.join(format!(".{}.{}.tmp", name, Uuid::new_v4().simple()));
    fs::write(&tmp, body)?;
    fs::rename(&tmp, &dest)?;

    debug!(file = %dest.display(), "signal written");
    Ok(dest)
}

fn encode_legacy(signal: &Signal) -> String {
    fn opt<T: ToString>(v: &Option<T>) -> String {
        v.as_ref().map(|v| v.to_string()).unwrap_or_default()
    }

    format!(
        "symbol={}\nside={}\nvolume={}\nprice={}\nsl_pts={}\ntp_pts={}\nts={}\nid={}\n",
        signal.symbol,
        signal.side.as_str(),
        signal.volume,
        opt(&signal.price),
        opt(&signal.sl_pts),
        opt(&signal.tp_pts),
        signal.ts.to_rfc3339(),
        signal.id,
    )
}

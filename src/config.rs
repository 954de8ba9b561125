//! Configuration from the environment

use crate::extract::extract_gstin;
use crate::session::DEFAULT_SESSION_TIMEOUT_SECS;
use crate::tax::gst::state_for_gstin;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BUSINESS_ID: &str = "default";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: PathBuf,
    pub port: u16,
    /// All records are scoped to this business
    pub business_id: String,
    pub session_timeout_secs: i64,
    /// The business's own GSTIN. Without one, invoices carry no GST.
    pub gstin: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let db_path = lookup("MUNIM_DB_PATH").map_or_else(
            || {
                let home = lookup("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.munim/munim.db"))
            },
            PathBuf::from,
        );

        let port = lookup("MUNIM_PORT")
            .and_then(|p| p.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let business_id = lookup("MUNIM_BUSINESS_ID")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| DEFAULT_BUSINESS_ID.to_string());

        let session_timeout_secs = lookup("MUNIM_SESSION_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .filter(|secs: &i64| *secs > 0)
            .unwrap_or(DEFAULT_SESSION_TIMEOUT_SECS);

        let gstin = lookup("MUNIM_GSTIN").and_then(|raw| {
            let gstin = raw.trim().to_ascii_uppercase();
            if is_valid_gstin(&gstin) {
                Some(gstin)
            } else {
                tracing::warn!(gstin = %raw, "Ignoring MUNIM_GSTIN: not a valid GSTIN");
                None
            }
        });

        Self {
            db_path,
            port,
            business_id,
            session_timeout_secs,
            gstin,
        }
    }
}

/// Fifteen characters in GSTIN shape, starting with a known state code
fn is_valid_gstin(gstin: &str) -> bool {
    extract_gstin(gstin).value.as_deref() == Some(gstin) && state_for_gstin(gstin).is_some()
}

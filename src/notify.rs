//! Outbound webhook notifications.
//!
//! Posters and claimers can register callback URLs; lifecycle events are
//! delivered to them best-effort: fire-and-forget, bounded by a timeout,
//! failures logged and never surfaced to the caller that triggered the
//! transition. Bodies are signed with a keyed blake3 MAC when a signing
//! secret is configured. Callback URLs pass an SSRF filter before any
//! request leaves the process.

use crate::bounty::Bounty;
use crate::error::ApiError;
use serde_json::json;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, warn};

/// Header carrying the hex MAC of the request body.
pub const SIGNATURE_HEADER: &str = "X-Bounty-Signature";

/// Validate a callback/webhook URL. Only public http(s) targets are
/// allowed; localhost, private/loopback/link-local ranges and obviously
/// internal hostnames are rejected.
pub fn validate_callback_url(url: &str) -> bool {
    if url.is_empty() {
        return false;
    }
    let parsed = match reqwest::Url::parse(url) {
        Ok(u) => u,
        Err(_) => return false,
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let host = match parsed.host_str() {
        Some(h) => h.trim_start_matches('[').trim_end_matches(']'),
        None => return false,
    };

    let lowered = host.to_ascii_lowercase();
    if matches!(lowered.as_str(), "localhost" | "0.0.0.0") {
        return false;
    }
    if lowered.ends_with(".local") || lowered.ends_with(".internal") {
        return false;
    }

    if let Ok(ip) = lowered.parse::<IpAddr>() {
        return match ip {
            IpAddr::V4(v4) => {
                !(v4.is_private()
                    || v4.is_loopback()
                    || v4.is_link_local()
                    || v4.is_unspecified()
                    || v4.is_broadcast())
            }
            IpAddr::V6(v6) => {
                let segments = v6.segments();
                let unique_local = (segments[0] & 0xfe00) == 0xfc00;
                let link_local = (segments[0] & 0xffc0) == 0xfe80;
                !(v6.is_loopback() || v6.is_unspecified() || unique_local || link_local)
            }
        };
    }
    true
}

/// Compute the hex MAC for a request body. The signing key is derived from
/// the configured secret so operators can rotate a plain string.
pub fn sign_body(signing_secret: &str, body: &[u8]) -> String {
    let key = blake3::hash(signing_secret.as_bytes());
    blake3::keyed_hash(key.as_bytes(), body).to_hex().to_string()
}

/// Best-effort webhook sender.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    signing_secret: Option<String>,
}

impl Notifier {
    pub fn new(signing_secret: Option<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build webhook client: {}", e)))?;
        Ok(Self {
            client,
            signing_secret,
        })
    }

    /// `bounty.claimed`, delivered to the poster.
    pub fn bounty_claimed(&self, bounty: &Bounty) {
        let Some(url) = bounty.poster_callback_url.clone() else {
            return;
        };
        let payload = json!({
            "event": "bounty.claimed",
            "bounty": {
                "id": bounty.id,
                "title": bounty.title,
                "budget": bounty.budget,
                "claimed_by": bounty.claimed_by,
                "status": bounty.status.as_str(),
            },
        });
        self.dispatch(url, payload);
    }

    /// `bounty.fulfilled`, delivered to the poster and the claimer.
    pub fn bounty_fulfilled(&self, bounty: &Bounty) {
        let payload = json!({
            "event": "bounty.fulfilled",
            "bounty": {
                "id": bounty.id,
                "title": bounty.title,
                "budget": bounty.budget,
                "status": bounty.status.as_str(),
            },
        });
        for url in [
            bounty.poster_callback_url.clone(),
            bounty.claimer_callback_url.clone(),
        ]
        .into_iter()
        .flatten()
        {
            self.dispatch(url, payload.clone());
        }
    }

    fn dispatch(&self, url: String, payload: serde_json::Value) {
        if !validate_callback_url(&url) {
            warn!(%url, "refusing webhook delivery to non-public URL");
            return;
        }
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(h) => h,
            Err(_) => {
                debug!(%url, "no async runtime; webhook skipped");
                return;
            }
        };
        let client = self.client.clone();
        let signing_secret = self.signing_secret.clone();
        handle.spawn(async move {
            let body = match serde_json::to_vec(&payload) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "webhook payload serialization failed");
                    return;
                }
            };
            let mut request = client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, "application/json");
            if let Some(secret) = &signing_secret {
                request = request.header(SIGNATURE_HEADER, sign_body(secret, &body));
            }
            match request.body(body).send().await {
                Ok(response) => {
                    debug!(%url, status = %response.status(), "webhook delivered");
                }
                Err(e) => warn!(%url, error = %e, "webhook delivery failed"),
            }
        });
    }
}

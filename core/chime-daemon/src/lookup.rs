//! HTTP session lookup against the host API.
//!
//! The host exposes session metadata at `GET {base}/session/{id}`. Any
//! failure (network, non-2xx, bad body) is a [`LookupError`], which the
//! resolver treats identically to "not found" and recovers from with the
//! default title.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use chime_core::{LookedUpSession, LookupError, SessionLookup};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(2);

pub struct HttpSessionLookup {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSessionLookup {
    pub fn new(base_url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }

    fn session_url(&self, session_id: &str) -> String {
        format!("{}/session/{}", self.base_url.trim_end_matches('/'), session_id)
    }
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default, rename = "parentID")]
    parent_id: Option<String>,
}

#[async_trait]
impl SessionLookup for HttpSessionLookup {
    async fn fetch(&self, session_id: &str) -> Result<LookedUpSession, LookupError> {
        let url = self.session_url(session_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| LookupError(err.to_string()))?;

        if !response.status().is_success() {
            return Err(LookupError(format!(
                "host returned {} for {}",
                response.status(),
                url
            )));
        }

        let payload: SessionPayload = response
            .json()
            .await
            .map_err(|err| LookupError(format!("invalid session body: {}", err)))?;

        Ok(LookedUpSession {
            title: payload.title,
            parent_id: payload.parent_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_url_normalizes_trailing_slash() {
        let lookup = HttpSessionLookup::new("http://127.0.0.1:4096/".to_string());
        assert_eq!(
            lookup.session_url("session-1"),
            "http://127.0.0.1:4096/session/session-1"
        );
    }

    #[test]
    fn payload_tolerates_missing_fields() {
        let payload: SessionPayload = serde_json::from_str("{}").expect("empty payload");
        assert!(payload.title.is_none());
        assert!(payload.parent_id.is_none());

        let payload: SessionPayload =
            serde_json::from_str(r#"{"title":"Fix CI","parentID":"root","extra":1}"#)
                .expect("full payload");
        assert_eq!(payload.title.as_deref(), Some("Fix CI"));
        assert_eq!(payload.parent_id.as_deref(), Some("root"));
    }
}

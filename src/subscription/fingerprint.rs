//! Best-effort ISP fingerprint lookup.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Short label describing the host's network, e.g. `US-Cloudflare_Inc`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct IspFingerprint(String);

impl IspFingerprint {
    /// Label used when the lookup fails.
    pub const UNKNOWN: &'static str = "Unknown";

    /// Fallback fingerprint.
    #[must_use]
    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_owned())
    }

    /// Builds `{country}-{organisation}` with spaces replaced by `_`.
    #[must_use]
    pub fn from_parts(country: &str, organisation: &str) -> Self {
        Self(format!("{country}-{organisation}").replace(' ', "_"))
    }

    /// Label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IspFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NetworkMeta {
    country: Option<String>,
    as_organization: Option<String>,
}

/// Queries a network metadata endpoint with a short timeout.
#[derive(Clone, Debug)]
pub struct IspLookup {
    client: Option<reqwest::Client>,
    url: String,
}

impl IspLookup {
    /// Creates a lookup against `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LOOKUP_TIMEOUT)
            .build()
            .map_err(|err| warn!(error = %err, "fingerprint client unavailable"))
            .ok();
        Self {
            client,
            url: url.into(),
        }
    }

    /// Fetches the fingerprint, falling back to [`IspFingerprint::unknown`]
    /// on any failure.
    pub async fn fingerprint(&self) -> IspFingerprint {
        match self.fetch().await {
            Some(fingerprint) => {
                debug!(%fingerprint, "fingerprint resolved");
                fingerprint
            }
            None => IspFingerprint::unknown(),
        }
    }

    async fn fetch(&self) -> Option<IspFingerprint> {
        let client = self.client.as_ref()?;
        let response = client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| warn!(url = %self.url, error = %err, "fingerprint lookup failed"))
            .ok()?;
        if !response.status().is_success() {
            warn!(url = %self.url, status = %response.status(), "fingerprint lookup rejected");
            return None;
        }
        let meta: NetworkMeta = response
            .json()
            .await
            .map_err(|err| warn!(error = %err, "fingerprint response unreadable"))
            .ok()?;
        match (meta.country, meta.as_organization) {
            (Some(country), Some(organisation)) => {
                Some(IspFingerprint::from_parts(&country, &organisation))
            }
            _ => None,
        }
    }
}

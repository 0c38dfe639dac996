// Switch REST client
//
// Wraps `reqwest::Client` with relay URL construction, basic auth, the
// CSRF header the firmware demands on mutating requests, and status-code
// mapping. Every call is a single request; there is no server-side
// session to tear down.

use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::Outlet;
use crate::transport::TransportConfig;

/// Header value the REST API requires on every non-GET request.
const CSRF_HEADER: (&str, &str) = ("X-CSRF", "x");

const BODY_PREVIEW_CHARS: usize = 200;

/// HTTP client for a single Digital Loggers style web power switch.
///
/// Relay indices on the wire are zero-based; callers pass wire indices
/// and translate at their own boundary.
pub struct SwitchClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
}

impl SwitchClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the switch root, e.g. `http://10.0.0.10:80`.
    pub fn new(
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, username, password))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: impl Into<String>,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username: username.into(),
            password,
        }
    }

    /// The switch base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Operations ───────────────────────────────────────────────────

    /// Authentication handshake.
    ///
    /// The REST API is stateless, so "logging in" means proving the
    /// credentials against an authenticated endpoint. Returns the number
    /// of relays the switch reports.
    pub async fn login(&self) -> Result<usize, Error> {
        let outlets = self.outlets().await?;
        debug!(url = %self.base_url, outlets = outlets.len(), "switch authentication successful");
        Ok(outlets.len())
    }

    /// List every relay with its current state.
    pub async fn outlets(&self) -> Result<Vec<Outlet>, Error> {
        let url = self.relay_url("outlets/")?;
        self.get(url).await
    }

    /// Read a single relay's state.
    pub async fn outlet_state(&self, index: u32) -> Result<bool, Error> {
        let url = self.relay_url(&format!("outlets/{index}/state/"))?;
        self.get(url).await
    }

    /// Switch a relay on or off.
    ///
    /// Returns nothing: the firmware answers `204 No Content`. Callers
    /// that need the resulting state should read it back, since a locked
    /// relay silently ignores the write.
    pub async fn set_outlet_state(&self, index: u32, on: bool) -> Result<(), Error> {
        let url = self.relay_url(&format!("outlets/{index}/state/"))?;
        debug!("PUT {} value={}", url, on);

        let builder = self
            .authed(self.http.put(url))
            .header(CSRF_HEADER.0, CSRF_HEADER.1)
            .form(&[("value", if on { "true" } else { "false" })]);
        let resp = builder.send().await?;
        check_status(resp).await.map(|_| ())
    }

    /// Power-cycle a relay (off, firmware-defined delay, on).
    pub async fn cycle_outlet(&self, index: u32) -> Result<(), Error> {
        let url = self.relay_url(&format!("outlets/{index}/cycle/"))?;
        debug!("POST {}", url);

        let builder = self
            .authed(self.http.post(url))
            .header(CSRF_HEADER.0, CSRF_HEADER.1);
        let resp = builder.send().await?;
        check_status(resp).await.map(|_| ())
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/restapi/relay/{path}`.
    fn relay_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/restapi/relay/{path}"))?)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .basic_auth(&self.username, Some(self.password.expose_secret()))
            .header(reqwest::header::ACCEPT, "application/json")
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.authed(self.http.get(url)).send().await?;
        let body = check_status(resp).await?;
        trace!(len = body.len(), "response body received");

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }
}

/// Map auth failures and non-success codes to typed errors, returning
/// the body text otherwise.
async fn check_status(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();

    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(Error::Authentication {
            message: format!("switch rejected credentials (HTTP {})", status.as_u16()),
        });
    }

    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(Error::Status {
            status: status.as_u16(),
            body: preview(&body),
        });
    }

    Ok(resp.text().await?)
}

fn preview(body: &str) -> String {
    body.chars().take(BODY_PREVIEW_CHARS).collect()
}

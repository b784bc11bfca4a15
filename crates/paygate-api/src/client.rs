// REST client
//
// Wraps `reqwest::Client` with extension-root URL construction, wallet key
// headers, and error-body parsing. Endpoint groups (devices, catalogs,
// connectivity) are implemented as inherent methods in separate files to
// keep this module focused on transport mechanics.

use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::ErrorBody;
use crate::transport::TransportConfig;

/// Append ids as path segments after rejecting ones the URL parser would
/// fold away (`.`, `..`) or drop (empty).
pub(crate) fn push_ids(url: &mut Url, ids: &[&str]) -> Result<(), Error> {
    if let Some(bad) = ids.iter().find(|id| matches!(**id, "" | "." | "..")) {
        return Err(Error::InvalidId((*bad).to_owned()));
    }
    url.path_segments_mut()
        .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(ids);
    Ok(())
}

/// Header carrying the wallet key on every authenticated request.
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// HTTP client for the device API.
///
/// `base_url` is the extension root, e.g. `https://node.example/devicetimer`.
/// All REST routes hang off `{base_url}/api/v1/`; QR images and channel
/// endpoints are derived from the same root.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The extension root URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{path}` without doubling slashes.
    pub(crate) fn root_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Build `{base}/api/v1/{path}`.
    pub(crate) fn api_url(&self, path: &str) -> Result<Url, Error> {
        self.root_url(&format!("api/v1/{path}"))
    }

    /// Build `{base}/api/v1/{route}/{ids...}` with every id pushed as one
    /// percent-encoded segment, so an id can never add path components, a
    /// query or a fragment.
    pub(crate) fn api_url_with(&self, route: &str, ids: &[&str]) -> Result<Url, Error> {
        let mut url = self.api_url(route)?;
        push_ids(&mut url, ids)?;
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn authorize(builder: reqwest::RequestBuilder, key: Option<&SecretString>) -> reqwest::RequestBuilder {
        match key {
            Some(key) => builder.header(API_KEY_HEADER, key.expose_secret()),
            None => builder,
        }
    }

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: Url,
        key: Option<&SecretString>,
    ) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = Self::authorize(self.http.get(url), key).send().await?;
        Self::parse_json(resp).await
    }

    /// Send a POST request with JSON body and decode the JSON response.
    pub(crate) async fn post<T: DeserializeOwned>(
        &self,
        url: Url,
        key: &SecretString,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("POST {}", url);
        let resp = Self::authorize(self.http.post(url).json(body), Some(key))
            .send()
            .await?;
        Self::parse_json(resp).await
    }

    /// Send a PUT request with JSON body and decode the JSON response.
    pub(crate) async fn put<T: DeserializeOwned>(
        &self,
        url: Url,
        key: &SecretString,
        body: &(impl Serialize + Sync),
    ) -> Result<T, Error> {
        debug!("PUT {}", url);
        let resp = Self::authorize(self.http.put(url).json(body), Some(key))
            .send()
            .await?;
        Self::parse_json(resp).await
    }

    /// Send a DELETE request. Success is judged on status alone.
    pub(crate) async fn delete(&self, url: Url, key: &SecretString) -> Result<(), Error> {
        debug!("DELETE {}", url);
        let resp = Self::authorize(self.http.delete(url), Some(key))
            .send()
            .await?;
        Self::check_status(resp).await.map(drop)
    }

    /// Map non-success statuses into `Error`, pulling the server's `detail`
    /// message out of the body when present.
    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body).map_or_else(
            |_| body.chars().take(200).collect::<String>(),
            |parsed| parsed.message(),
        );

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(Error::Authentication { message });
        }

        Err(Error::Api {
            status: status.as_u16(),
            message,
        })
    }

    async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
        let resp = Self::check_status(resp).await?;
        let body = resp.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            let preview: String = body.chars().take(200).collect();
            Error::Deserialization {
                message: format!("{e} (body preview: {preview:?})"),
                body,
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn client(base: &str) -> ApiClient {
        ApiClient::with_client(reqwest::Client::new(), Url::parse(base).unwrap())
    }

    #[test]
    fn api_url_tolerates_trailing_slash() {
        let a = client("https://node.example/devicetimer");
        let b = client("https://node.example/devicetimer/");
        assert_eq!(
            a.api_url("device").unwrap().as_str(),
            "https://node.example/devicetimer/api/v1/device"
        );
        assert_eq!(a.api_url("device").unwrap(), b.api_url("device").unwrap());
    }

    #[test]
    fn root_url_keeps_port() {
        let c = client("http://127.0.0.1:5000/devicetimer");
        assert_eq!(
            c.root_url("device/a/b/qrcode").unwrap().as_str(),
            "http://127.0.0.1:5000/devicetimer/device/a/b/qrcode"
        );
    }
}

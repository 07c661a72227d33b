//! Shared JSON-over-HTTP transport for the HTTP provider families

use std::time::Duration;

use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::with_deadline;
use crate::classify::{self, ClassifyContext};
use crate::error::BridgeError;

/// HTTP client bound to one bridge
///
/// Carries the static headers (authentication and configured extras) sent
/// with every request, the call-level timeout and the classification context.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    headers: HeaderMap,
    timeout: Option<Duration>,
    ctx: ClassifyContext,
}

impl HttpClient {
    pub fn new(headers: HeaderMap, ctx: ClassifyContext) -> Self {
        Self {
            client: Client::new(),
            headers,
            timeout: ctx.timeout,
            ctx,
        }
    }

    /// Classification context for failures on this client
    pub const fn ctx(&self) -> &ClassifyContext {
        &self.ctx
    }

    fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> RequestBuilder {
        tracing::debug!(provider = %self.ctx.provider, model = %self.ctx.model, url, "sending request");
        self.client.post(url).headers(self.headers.clone()).json(body)
    }

    /// POST a JSON body and decode the JSON reply
    ///
    /// The timeout covers the whole exchange, body included.
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, BridgeError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut builder = self.post(url, body);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::error!(provider = %self.ctx.provider, error = %e, "upstream request failed");
            classify::transport(e, &self.ctx)
        })?;
        let response = self.ensure_success(response).await?;

        let bytes = response.bytes().await.map_err(|e| classify::transport(e, &self.ctx))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::warn!(provider = %self.ctx.provider, error = %e, "undecodable provider response");
            BridgeError::response_parsing(format!("failed to parse response: {e}"), Some(Box::new(e)))
        })
    }

    /// POST a JSON body and hand back the response for incremental reading
    ///
    /// The timeout covers the wait for response headers only, so a long
    /// stream is not cut off.
    pub async fn post_stream<B>(&self, url: &str, body: &B) -> Result<reqwest::Response, BridgeError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let response = with_deadline(self.timeout, self.post(url, body).send())
            .await?
            .map_err(|e| {
                tracing::error!(provider = %self.ctx.provider, error = %e, "upstream stream request failed");
                classify::transport(e, &self.ctx)
            })?;
        self.ensure_success(response).await
    }

    async fn ensure_success(&self, response: reqwest::Response) -> Result<reqwest::Response, BridgeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify::from_http(status, &headers, &body, &self.ctx))
    }
}

/// Configured extra headers, parsed
pub fn extra_headers(headers: &IndexMap<String, String>) -> Result<HeaderMap, BridgeError> {
    let mut map = HeaderMap::new();
    let mut violations = Vec::new();

    for (name, value) in headers {
        match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            (Err(_), _) => violations.push(format!("header name `{name}` is invalid")),
            (_, Err(_)) => violations.push(format!("value of header `{name}` is invalid")),
        }
    }

    if violations.is_empty() {
        Ok(map)
    } else {
        Err(BridgeError::configuration(violations))
    }
}

/// Problems with configured extra headers
pub fn header_violations(headers: &IndexMap<String, String>) -> Vec<String> {
    match extra_headers(headers) {
        Err(BridgeError::Configuration { violations, .. }) => violations,
        _ => Vec::new(),
    }
}

/// Sensitive header carrying a secret
pub(crate) fn secret_header(value: &str) -> Result<HeaderValue, BridgeError> {
    let mut header = HeaderValue::try_from(value)
        .map_err(|_| BridgeError::configuration(vec!["api_key contains characters not allowed in a header".to_owned()]))?;
    header.set_sensitive(true);
    Ok(header)
}

/// `Authorization: Bearer` value for an optional key
pub fn bearer(api_key: Option<&SecretString>) -> Result<Option<HeaderValue>, BridgeError> {
    api_key
        .map(|key| secret_header(&format!("Bearer {}", key.expose_secret())))
        .transpose()
}

/// Base URL without a trailing slash
pub fn base_url(configured: Option<&url::Url>, default: &str) -> String {
    configured
        .map_or(default, url::Url::as_str)
        .trim_end_matches('/')
        .to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extra_headers_parse_and_report_every_bad_entry() {
        let mut headers = IndexMap::new();
        headers.insert("x-team".to_owned(), "research".to_owned());
        assert_eq!(extra_headers(&headers).unwrap()["x-team"], "research");

        headers.insert("bad header".to_owned(), "v".to_owned());
        headers.insert("x-ok".to_owned(), "line\nbreak".to_owned());
        assert_eq!(header_violations(&headers).len(), 2);
    }

    #[test]
    fn secrets_are_marked_sensitive() {
        let key = SecretString::from("sk-test");
        let header = bearer(Some(&key)).unwrap().unwrap();
        assert!(header.is_sensitive());
        assert_eq!(header, "Bearer sk-test");
        assert!(bearer(None).unwrap().is_none());
    }

    #[test]
    fn base_url_trims_trailing_slash() {
        let url = url::Url::parse("http://localhost:8080/v1/").unwrap();
        assert_eq!(base_url(Some(&url), "https://api.example.com"), "http://localhost:8080/v1");
        assert_eq!(base_url(None, "https://api.example.com/"), "https://api.example.com");
    }
}

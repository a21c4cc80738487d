use crate::config::{HttpConfig, SiteConfig};
use crate::error::{ChapterZipError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// HTTP client carrying one source's fixed identity.
///
/// User agent, referer and extra headers are baked in when the client is
/// built, so every request to that source looks the same.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(http: &HttpConfig, site: &SiteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        if let Some(referer) = &site.referer {
            headers.insert(REFERER, header_value(referer)?);
        }

        if let Some(extra) = &site.headers {
            for (key, value) in extra {
                let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    config::ConfigError::Message(format!("invalid header name '{}': {}", key, e))
                })?;
                headers.insert(name, header_value(value)?);
            }
        }

        let user_agent = site.user_agent.as_deref().unwrap_or(&http.user_agent);

        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .connect_timeout(Duration::from_secs(http.connect_timeout_secs))
            .user_agent(user_agent)
            .default_headers(headers)
            .build()?;

        Ok(Self { client })
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.send(url, self.client.get(url)).await?;
        Ok(response.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        let response = self.send(url, self.client.get(url).query(query)).await?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url, self.client.get(url)).await?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn send(&self, url: &str, request: RequestBuilder) -> Result<Response> {
        debug!("GET {}", url);
        let response = request.send().await?;

        if !response.status().is_success() {
            return Err(ChapterZipError::status(url, response.status().as_u16()));
        }

        Ok(response)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        config::ConfigError::Message(format!("invalid header value '{}': {}", value, e)).into()
    })
}

/// Resolves `href` against `base`; absolute links pass through.
pub fn resolve_url(base: &str, href: &str) -> String {
    match url::Url::parse(base).and_then(|b| b.join(href)) {
        Ok(url) => url.to_string(),
        Err(_) => href.to_string(),
    }
}

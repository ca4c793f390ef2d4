//! REST transport.

use crate::error::{TransportError, TransportResult};
use crate::resolver::{query_params, with_query};
use async_trait::async_trait;
use modelkit_types::{HttpMethod, Params};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

/// A REST client.
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Issues `method` against `url`. For `get` the params become the query
    /// string; for every other method they are sent as a JSON body.
    async fn request(&self, url: &str, params: Params, method: HttpMethod)
        -> TransportResult<Value>;
}

fn to_reqwest(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Delete => Method::DELETE,
    }
}

/// Human-readable message for a failed response body.
///
/// Prefers `errors[].message`, then a top-level `message`, then the status
/// reason phrase.
pub fn error_message(body: &Value, status: StatusCode) -> String {
    if let Some(errors) = body.get("errors").and_then(Value::as_array) {
        let messages: Vec<&str> = errors
            .iter()
            .filter_map(|e| e.get("message").and_then(Value::as_str))
            .collect();
        if !messages.is_empty() {
            return messages.join(", ");
        }
    }
    if let Some(message) = body.get("message").and_then(Value::as_str) {
        return message.to_string();
    }
    status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
}

/// REST over reqwest.
pub struct HttpRestTransport {
    client: Client,
    base_url: Option<String>,
    kebab_case_query: bool,
}

impl HttpRestTransport {
    /// Creates a transport. Relative URLs are joined onto `base_url`.
    pub fn new(base_url: Option<String>, timeout: Duration) -> TransportResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/json;charset=UTF-8"),
        );

        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            kebab_case_query: false,
        })
    }

    /// Rewrites camel-case query keys to kebab case.
    pub fn with_kebab_case_query(mut self, enabled: bool) -> Self {
        self.kebab_case_query = enabled;
        self
    }

    /// The absolute URL a request to `url` goes to.
    pub fn endpoint(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            return url.to_string();
        }
        match &self.base_url {
            Some(base) => format!(
                "{}/{}",
                base.trim_end_matches('/'),
                url.trim_start_matches('/')
            ),
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl RestTransport for HttpRestTransport {
    async fn request(
        &self,
        url: &str,
        params: Params,
        method: HttpMethod,
    ) -> TransportResult<Value> {
        let endpoint = self.endpoint(url);

        let builder = if method.uses_query_string() {
            let query = query_params(&params, self.kebab_case_query);
            self.client.get(with_query(&endpoint, &query))
        } else {
            self.client
                .request(to_reqwest(method), &endpoint)
                .json(&Value::Object(params))
        };

        debug!(%method, %endpoint, "rest request");

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Network(format!("{method} {endpoint} failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TransportError::Network(format!("failed to read response: {e}")))?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else if status.is_success() {
            serde_json::from_str(&text)?
        } else {
            serde_json::from_str(&text).unwrap_or(Value::Null)
        };

        if !status.is_success() {
            let message = error_message(&body, status);
            warn!(status = status.as_u16(), %endpoint, %message, "rest request rejected");
            return Err(TransportError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }
}

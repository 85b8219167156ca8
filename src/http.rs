//! # HTTP Transport
//!
//! Thin wrapper over `reqwest` that every service goes through. It resolves
//! paths against the configured base URL, attaches the bearer token and a
//! per-request correlation id, turns non-2xx responses into
//! [`ClientError::Http`], and unwraps the server's response envelopes so
//! callers decode the payload they actually asked for.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use reqwest::Method;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{Span, debug, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::TokenStore;
use crate::config::AppConfig;
use crate::error::{ClientError, ClientResult};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Envelope markers that accompany a `data` payload.
const ENVELOPE_MARKERS: [&str; 4] = ["success", "message", "status", "ok"];

/// Shared API client. Cheap to clone.
#[derive(Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: Url,
    tokens: Arc<dyn TokenStore>,
}

impl HttpClient {
    pub fn new(base_url: &str, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        let base_url = Url::parse(base_url)?;
        let inner = reqwest::Client::builder()
            .user_agent(concat!("clinic-client/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            inner,
            base_url,
            tokens,
        })
    }

    pub fn from_config(config: &AppConfig, tokens: Arc<dyn TokenStore>) -> ClientResult<Self> {
        Self::new(&config.api_base_url, tokens)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Resolve `path` against the base URL, keeping any base path prefix.
    pub fn endpoint(&self, path: &str, query: &[(String, String)]) -> ClientResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let mut url = Url::parse(&format!("{}/{}", base, path.trim_start_matches('/')))?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }
        Ok(url)
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> ClientResult<T> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post<B, T>(&self, path: &str, query: &[(String, String)], body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, query, Some(body)).await
    }

    pub async fn patch<B, T>(&self, path: &str, query: &[(String, String)], body: &B) -> ClientResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = serde_json::to_value(body)?;
        self.request(Method::PATCH, path, query, Some(body)).await
    }

    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> ClientResult<T> {
        self.request(Method::DELETE, path, query, None).await
    }

    #[instrument(
        skip_all,
        fields(method = %method, path = %path, request_id = tracing::field::Empty, status = tracing::field::Empty)
    )]
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Value>,
    ) -> ClientResult<T> {
        let url = self.endpoint(path, query)?;
        let request_id = new_request_id();
        Span::current().record("request_id", request_id.as_str());

        let mut builder = self
            .inner
            .request(method.clone(), url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, request_id.as_str());
        if let Some(token) = self.tokens.access_token() {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        let started = Instant::now();
        let response = match builder.send().await {
            Ok(response) => response,
            Err(err) => {
                record_outcome(&method, "network", started);
                warn!(error = %err, "Request did not reach the server");
                return Err(ClientError::Network(err));
            }
        };

        let status = response.status();
        Span::current().record("status", status.as_u16());
        let raw = match response.text().await {
            Ok(raw) => raw,
            Err(err) => {
                record_outcome(&method, "network", started);
                warn!(error = %err, "Failed to read response body");
                return Err(ClientError::Network(err));
            }
        };

        if !status.is_success() {
            record_outcome(&method, "http_error", started);
            let err = ClientError::from_response(status, &raw);
            warn!(error = %err, "Request failed");
            return Err(err);
        }

        record_outcome(&method, "success", started);
        debug!(bytes = raw.len(), "Request succeeded");
        decode_body(&raw)
    }
}

fn record_outcome(method: &Method, outcome: &'static str, started: Instant) {
    counter!(
        "clinic_http_requests_total",
        "method" => method.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("clinic_http_request_duration_ms", "method" => method.to_string())
        .record(started.elapsed().as_secs_f64() * 1_000.0);
}

/// `corr-` followed by eight hex characters.
pub fn new_request_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("corr-{}", &id[..8])
}

/// Decode a 2xx body, unwrapping envelopes first. An empty body decodes as
/// JSON `null`, so `()` and `Option<_>` targets accept 204 responses.
pub fn decode_body<T: DeserializeOwned>(raw: &str) -> ClientResult<T> {
    let value = if raw.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(raw)?
    };
    Ok(serde_json::from_value(unwrap_envelope(value))?)
}

/// Strip the server's response wrappers.
///
/// * `{data: [..], meta: {..}, ..}` yields `{items: [..], meta, ..}` so list
///   decoding finds rows under `items`.
/// * `{data: X}`, optionally next to `success|message|status|ok` markers,
///   yields `X`. A bare row array decodes as a single-page list.
/// * Anything else is returned unchanged.
pub fn unwrap_envelope(value: Value) -> Value {
    let Value::Object(mut map) = value else {
        return value;
    };

    let data_is_rows = matches!(map.get("data"), Some(Value::Array(_)));
    if data_is_rows && map.contains_key("meta") {
        if let Some(rows) = map.remove("data") {
            map.insert("items".to_string(), rows);
        }
        return Value::Object(map);
    }

    let is_envelope = map.contains_key("data")
        && map
            .keys()
            .all(|k| k == "data" || ENVELOPE_MARKERS.contains(&k.as_str()));
    if is_envelope {
        return map.remove("data").unwrap_or(Value::Null);
    }
    Value::Object(map)
}

/// Percent-encode a single path segment such as a record id.
pub fn path_segment(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

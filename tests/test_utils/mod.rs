//! Shared fixtures for integration tests against a `wiremock` stub API.

#![allow(dead_code)]

use std::sync::Arc;

use clinic_client::HttpClient;
use clinic_client::auth::{MemoryTokenStore, TokenPair, TokenStore};
use serde_json::{Value, json};

/// Client pointed at `base_url` with an empty in-memory session.
pub fn anonymous_client(base_url: &str) -> (HttpClient, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::new());
    let tokens: Arc<dyn TokenStore> = store.clone();
    (HttpClient::new(base_url, tokens).unwrap(), store)
}

/// Client pointed at `base_url` that already holds `access`/`refresh-1`.
pub fn signed_in_client(base_url: &str, access: &str) -> (HttpClient, Arc<MemoryTokenStore>) {
    let store = Arc::new(MemoryTokenStore::with_tokens(TokenPair::new(access, "refresh-1")));
    let tokens: Arc<dyn TokenStore> = store.clone();
    (HttpClient::new(base_url, tokens).unwrap(), store)
}

pub fn meta(page: u32, per_page: u32, total: u64, total_pages: u32) -> Value {
    json!({
        "page": page,
        "per_page": per_page,
        "total": total,
        "total_pages": total_pages,
    })
}

pub fn patient(id: &str, first_name: &str) -> Value {
    json!({
        "id": id,
        "mrn": "MRN-000001",
        "first_name": first_name,
        "last_name": "Lee",
        "status": "active",
        "tags": [],
    })
}

pub fn appointment(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "patient_id": "p-1",
        "patient_name": "Sarah Lee",
        "start_time": "2024-03-11T09:00:00Z",
        "status": status,
        "type": "checkup",
    })
}

/// Query pairs of a request that reached the stub server, in order.
pub fn query_pairs(request: &wiremock::Request) -> Vec<(String, String)> {
    request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

pub fn query_value(request: &wiremock::Request, key: &str) -> Option<String> {
    request
        .url
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

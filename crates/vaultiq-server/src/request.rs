//! `RequestHandle` implemented over Axum's request parts.
//!
//! The host is responsible for populating the canonical `vaultiq.sid`
//! attribute before validation; here that's done by copying the
//! `X-Session-Id` header, the demo host's stand-in for whatever mechanism
//! (cookie, bearer token) a production host would use.

use std::collections::HashMap;

use axum::http::HeaderMap;
use vaultiq_core::validator::{RequestHandle, SESSION_ID_ATTRIBUTE};

pub struct AxumRequestHandle {
    headers: HeaderMap,
    attributes: HashMap<String, String>,
}

impl AxumRequestHandle {
    pub fn new(headers: HeaderMap) -> Self {
        let mut attributes = HashMap::new();
        if let Some(session_id) = headers
            .get("X-Session-Id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
        {
            attributes.insert(SESSION_ID_ATTRIBUTE.to_string(), session_id);
        }
        Self { headers, attributes }
    }
}

impl RequestHandle for AxumRequestHandle {
    fn header(&self, name: &str) -> Option<String> {
        self.headers.get(name)?.to_str().ok().map(str::to_string)
    }

    fn attribute(&self, key: &str) -> Option<String> {
        self.attributes.get(key).cloned()
    }
}

//! Supplier product details (LCSC).
//!
//! The product API returns a loosely typed JSON record under `result`. Field
//! names differ between API generations, so [`ApiDetails`] keeps the raw
//! object and exposes the handful of fields the manager uses through
//! accessors that try each known key in turn.
//!
//! Lookups are best-effort: a [`DetailsSource`] answers `None` on any
//! failure and the caller carries on without supplier data.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::SupplierConfig;
use crate::error::SupplierError;
use crate::symbol::classify::clean_description;

/// Longest manifest comment, in characters.
pub const SUMMARY_MAX_CHARS: usize = 100;

/// Supplier product record, as returned under `result`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ApiDetails(Map<String, Value>);

impl ApiDetails {
    /// Wraps a `result` object. Returns `None` for non-objects and for empty
    /// objects.
    #[must_use]
    pub fn from_result(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) if !map.is_empty() => Some(Self(map)),
            _ => None,
        }
    }

    /// Extracts the `result` object from a full API response body.
    #[must_use]
    pub fn from_response(body: Value) -> Option<Self> {
        match body {
            Value::Object(mut map) => map.remove("result").and_then(Self::from_result),
            _ => None,
        }
    }

    /// Returns `true` if the record has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Trimmed, non-empty string value of `key`.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)?
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    fn first_str(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get_str(key))
    }

    /// English product introduction, the free-text description.
    #[must_use]
    pub fn introduction(&self) -> Option<&str> {
        self.get_str("productIntroEn")
    }

    /// Manufacturer model / part number.
    #[must_use]
    pub fn model(&self) -> Option<&str> {
        self.first_str(&["productModel", "componentModelEn"])
    }

    /// Manufacturer (brand) name.
    #[must_use]
    pub fn brand(&self) -> Option<&str> {
        self.first_str(&["brandNameEn", "componentBrandEn"])
    }

    /// Leaf catalogue category.
    #[must_use]
    pub fn category(&self) -> Option<&str> {
        self.get_str("catalogName")
    }

    /// Parent catalogue category.
    #[must_use]
    pub fn parent_category(&self) -> Option<&str> {
        self.get_str("parentCatalogName")
    }

    /// One-line summary for the manifest: the cleaned introduction, cut to
    /// [`SUMMARY_MAX_CHARS`] with a `...` marker.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        let text = clean_description(self.introduction()?);
        if text.is_empty() {
            return None;
        }
        if text.chars().count() <= SUMMARY_MAX_CHARS {
            return Some(text);
        }
        let cut: String = text.chars().take(SUMMARY_MAX_CHARS - 3).collect();
        Some(format!("{cut}..."))
    }
}

/// Anything that can look up supplier details for a part.
#[async_trait]
pub trait DetailsSource: Send + Sync {
    /// Fetches details for `external_id`, or `None` when unavailable.
    async fn fetch_details(&self, external_id: &str) -> Option<ApiDetails>;
}

/// HTTP client for the LCSC product detail endpoint.
#[derive(Debug, Clone)]
pub struct LcscClient {
    client: Client,
    endpoint: String,
}

impl LcscClient {
    /// Creates a client from supplier settings.
    #[must_use]
    pub fn new(settings: &SupplierConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(settings.user_agent.clone())
            .build()
            .unwrap_or_default();

        Self {
            client,
            endpoint: settings.endpoint.clone(),
        }
    }

    /// Endpoint this client queries.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches details for `external_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails, the API answers with a
    /// non-success status, or the body has no `result` object.
    pub async fn fetch(&self, external_id: &str) -> Result<ApiDetails, SupplierError> {
        tracing::debug!(external_id, endpoint = %self.endpoint, "Fetching supplier details");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("productCode", external_id)])
            .header(ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SupplierError::Status {
                status: response.status().as_u16(),
            });
        }

        let body: Value = response.json().await?;
        ApiDetails::from_response(body).ok_or_else(|| SupplierError::NoResult {
            external_id: external_id.to_string(),
        })
    }
}

#[async_trait]
impl DetailsSource for LcscClient {
    async fn fetch_details(&self, external_id: &str) -> Option<ApiDetails> {
        match self.fetch(external_id).await {
            Ok(details) => Some(details),
            Err(e) => {
                tracing::warn!(external_id, error = %e, "Supplier details unavailable");
                None
            }
        }
    }
}

//! HTTP/JSON client for the Unimall B2B catalog API

use super::{CatalogGateway, PushAck, RemoteSnapshotEntry};
use crate::error::GatewayError;
use crate::product::{ProductRecord, Sku};
use async_trait::async_trait;
use reqwest::{header, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://b2b.unimall.lt/api/v1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_PAGE_SIZE: u32 = 100;
const MAX_ERROR_BODY_CHARS: usize = 256;

/// Connection settings for the remote catalog
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    /// Applied to every request; an expired timeout surfaces as `Unavailable`
    pub timeout: Duration,
    pub page_size: u32,
    pub user_agent: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            user_agent: "inventory_tracker/1.0".to_string(),
        }
    }
}

/// Row of `/productsQuantitiesAndPrices`
#[derive(Debug, Deserialize)]
struct QuantityPriceEntry {
    id: String,
    price: Decimal,
    quantity: i64,
    version: String,
}

/// Row of `/productsCatalogue`
#[derive(Debug, Deserialize)]
struct CatalogueItem {
    id: String,
    name: String,
}

/// One page of `/productsCatalogue`
#[derive(Debug, Deserialize)]
struct CataloguePage {
    #[serde(default)]
    data: Vec<CatalogueItem>,
    #[serde(default)]
    page: u32,
    #[serde(default)]
    last_page: u32,
}

/// Body of `GET /products/{sku}`
#[derive(Debug, Deserialize)]
struct ProductResponse {
    id: String,
    name: String,
    price: Decimal,
    quantity: i64,
    version: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PushRequest<'a> {
    name: &'a str,
    price: Decimal,
    quantity: u32,
    base_version: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    version: String,
}

/// Catalog gateway talking to the B2B REST API
#[derive(Debug, Clone)]
pub struct HttpCatalogGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl HttpCatalogGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        log::info!("Creating catalog client for {}", config.base_url);
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| GatewayError::Unavailable(format!("Failed to build HTTP client: {}", e)))?;

        let config = GatewayConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..config
        };

        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .get(self.url(path))
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
    }

    async fn fetch_quantities_and_prices(
        &self,
        since_version: Option<&str>,
    ) -> Result<Vec<QuantityPriceEntry>, GatewayError> {
        let mut request = self.get("/productsQuantitiesAndPrices");
        if let Some(since) = since_version {
            request = request.query(&[("since", since)]);
        }
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    /// Walk every catalogue page; any failing page fails the whole fetch
    async fn fetch_catalogue_names(&self) -> Result<HashMap<String, String>, GatewayError> {
        let mut names = HashMap::new();
        let mut page = 1;

        loop {
            log::debug!("Fetching catalogue page {}", page);
            let request = self.get("/productsCatalogue").query(&[
                ("page", page.to_string()),
                ("per_page", self.config.page_size.to_string()),
            ]);
            let response = check_status(request.send().await?).await?;
            let body: CataloguePage = response.json().await?;

            let received = body.data.len();
            names.extend(body.data.into_iter().map(|item| (item.id, item.name)));

            let last_page = body.last_page.max(body.page).max(page);
            if received == 0 || page >= last_page {
                break;
            }
            page += 1;
        }

        log::debug!("Catalogue provided {} product names", names.len());
        Ok(names)
    }
}

/// Map non-success statuses onto the gateway failure modes
async fn check_status(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        log::warn!("Catalog rate limited (retry after {:?})", retry_after);
        return Err(GatewayError::RateLimited { retry_after });
    }

    let body: String = response
        .text()
        .await
        .unwrap_or_default()
        .chars()
        .take(MAX_ERROR_BODY_CHARS)
        .collect();

    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        Err(GatewayError::Unavailable(format!("HTTP {}: {}", status, body)))
    } else {
        Err(GatewayError::Rejected(format!("HTTP {}: {}", status, body)))
    }
}

fn fallback_name(sku: &str) -> String {
    format!("Product {}", sku)
}

#[async_trait]
impl CatalogGateway for HttpCatalogGateway {
    async fn fetch_snapshot(
        &self,
        since_version: Option<&str>,
    ) -> Result<Vec<RemoteSnapshotEntry>, GatewayError> {
        log::info!("Fetching catalog snapshot from {}", self.config.base_url);

        let quantities = self.fetch_quantities_and_prices(since_version).await?;
        let names = self.fetch_catalogue_names().await?;

        let mut entries = Vec::with_capacity(quantities.len());
        for row in quantities {
            let sku = match Sku::parse(&row.id) {
                Ok(sku) => sku,
                Err(_) => {
                    log::warn!("Skipping catalog row with empty product id");
                    continue;
                }
            };
            let display_name = names
                .get(&row.id)
                .cloned()
                .unwrap_or_else(|| fallback_name(sku.as_str()));
            entries.push(RemoteSnapshotEntry {
                sku,
                display_name,
                unit_price: row.price,
                quantity_on_hand: row.quantity,
                remote_version: row.version,
            });
        }

        log::info!("Fetched {} catalog entries", entries.len());
        Ok(entries)
    }

    async fn fetch_product(&self, sku: &Sku) -> Result<Option<RemoteSnapshotEntry>, GatewayError> {
        let path = format!("/products/{}", urlencoding::encode(sku.as_str()));
        let response = self.get(&path).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: ProductResponse = check_status(response).await?.json().await?;
        let remote_sku = Sku::parse(&body.id).map_err(|e| GatewayError::Malformed(e.to_string()))?;

        Ok(Some(RemoteSnapshotEntry {
            sku: remote_sku,
            display_name: body.name,
            unit_price: body.price,
            quantity_on_hand: body.quantity,
            remote_version: body.version,
        }))
    }

    async fn push_local_change(&self, record: &ProductRecord) -> Result<PushAck, GatewayError> {
        let path = format!("/products/{}", urlencoding::encode(record.sku.as_str()));
        log::debug!("Pushing local change for {}", record.sku);

        let payload = PushRequest {
            name: &record.display_name,
            price: record.unit_price,
            quantity: record.quantity_on_hand,
            base_version: record.remote_version.as_deref(),
        };

        let response = self
            .client
            .put(self.url(&path))
            .bearer_auth(&self.config.api_key)
            .header(header::ACCEPT, "application/json")
            .json(&payload)
            .send()
            .await?;
        let body: PushResponse = check_status(response).await?.json().await?;

        Ok(PushAck {
            remote_version: body.version,
        })
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;

// In-memory stand-in for the upstream product service
// Usable directly as a ProductApi, or served over HTTP with `router` for black-box tests.

use std::sync::{
    atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::model::{Inventory, Product, ProductPayload};
use crate::upstream::{ProductApi, UpstreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerMode {
    Normal,
    CompleteOutage,
}

// One request as seen by the mock, in arrival order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamCall {
    ListProducts,
    GetProduct {
        product_id: String,
    },
    GetInventory {
        product_id: String,
        sub_inventory_id: String,
    },
    BookInventory {
        product_id: String,
        sub_inventory_id: String,
    },
}

type InventoryKey = (String, String);

pub struct MockUpstream {
    mode: AtomicU8,
    products: DashMap<String, Product>,
    inventory_responses: DashMap<InventoryKey, Inventory>,
    booking_responses: DashMap<InventoryKey, Bytes>,
    fail_next_reads: AtomicUsize,
    fail_next_writes: AtomicUsize,
    delay_ms: AtomicU64,
    calls: Mutex<Vec<UpstreamCall>>,
}

impl Default for MockUpstream {
    fn default() -> Self {
        Self::new()
    }
}

impl MockUpstream {
    pub fn new() -> Self {
        Self {
            mode: AtomicU8::new(0),
            products: DashMap::new(),
            inventory_responses: DashMap::new(),
            booking_responses: DashMap::new(),
            fail_next_reads: AtomicUsize::new(0),
            fail_next_writes: AtomicUsize::new(0),
            delay_ms: AtomicU64::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let mock = Self::new();
        for product in products {
            mock.upsert_product(product);
        }
        mock
    }

    // Three experiences with a mix of booked and free inventory
    pub fn with_sample_catalogue() -> Self {
        Self::with_products([
            sample_product(
                "p0001",
                "Circus show",
                "2 hours great show proformed by the world famous circus",
                &[true, false, false],
            ),
            sample_product(
                "p0002",
                "Castle tour",
                "Guided walk through the castle grounds",
                &[false, false, true],
            ),
            sample_product(
                "p0003",
                "Lunch meal",
                "Enjoy great lunch meal servered in the castle",
                &[false, true, true],
            ),
        ])
    }

    pub fn upsert_product(&self, product: Product) {
        self.products.insert(product.product_id.clone(), product);
    }

    pub fn product(&self, product_id: &str) -> Option<Product> {
        self.products.get(product_id).map(|p| p.clone())
    }

    // Always answer inventory reads for this address with `inventory`
    pub fn stub_inventory(&self, product_id: &str, sub_inventory_id: &str, inventory: Inventory) {
        self.inventory_responses
            .insert(key(product_id, sub_inventory_id), inventory);
    }

    // Always answer booking writes for this address with `body`, leaving the catalogue untouched
    pub fn stub_booking_response(
        &self,
        product_id: &str,
        sub_inventory_id: &str,
        body: impl Into<Bytes>,
    ) {
        self.booking_responses
            .insert(key(product_id, sub_inventory_id), body.into());
    }

    pub fn set_mode(&self, mode: ServerMode) {
        let mode_value = match mode {
            ServerMode::Normal => 0,
            ServerMode::CompleteOutage => 1,
        };
        self.mode.store(mode_value, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay_ms: u64) {
        self.delay_ms.store(delay_ms, Ordering::SeqCst);
    }

    pub fn fail_next_reads(&self, count: usize) {
        self.fail_next_reads.store(count, Ordering::SeqCst);
    }

    pub fn fail_next_writes(&self, count: usize) {
        self.fail_next_writes.store(count, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().clone()
    }

    pub fn booking_calls(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, UpstreamCall::BookInventory { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    async fn begin(&self, call: UpstreamCall, failures: &AtomicUsize) -> Result<(), UpstreamError> {
        self.calls.lock().push(call);

        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.mode.load(Ordering::SeqCst) == 1 {
            return Err(unavailable());
        }

        let injected = failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(UpstreamError::ApiResponse {
                status_code: 500,
                message: "Internal Server Error".to_string(),
            });
        }

        Ok(())
    }

    fn find_inventory(&self, product_id: &str, sub_inventory_id: &str) -> Result<Inventory, UpstreamError> {
        let product = self
            .products
            .get(product_id)
            .ok_or_else(|| not_found(format!("product {product_id} not found")))?;

        let full_id = format!("{product_id}{sub_inventory_id}");
        product
            .inventories
            .iter()
            .find(|inv| inv.inventory_id == full_id || inv.inventory_id == sub_inventory_id)
            .cloned()
            .ok_or_else(|| not_found(format!("inventory {full_id} not found")))
    }
}

#[async_trait]
impl ProductApi for MockUpstream {
    async fn list_products(&self) -> Result<ProductPayload, UpstreamError> {
        self.begin(UpstreamCall::ListProducts, &self.fail_next_reads)
            .await?;

        let mut products: Vec<Product> = self.products.iter().map(|p| p.value().clone()).collect();
        products.sort_by(|a, b| a.product_id.cmp(&b.product_id));
        encode(&products)
    }

    async fn get_product(&self, product_id: &str) -> Result<ProductPayload, UpstreamError> {
        self.begin(
            UpstreamCall::GetProduct {
                product_id: product_id.to_string(),
            },
            &self.fail_next_reads,
        )
        .await?;

        let product = self
            .product(product_id)
            .ok_or_else(|| not_found(format!("product {product_id} not found")))?;
        encode(&product)
    }

    async fn get_inventory(
        &self,
        product_id: &str,
        sub_inventory_id: &str,
    ) -> Result<Inventory, UpstreamError> {
        self.begin(
            UpstreamCall::GetInventory {
                product_id: product_id.to_string(),
                sub_inventory_id: sub_inventory_id.to_string(),
            },
            &self.fail_next_reads,
        )
        .await?;

        if let Some(stubbed) = self.inventory_responses.get(&key(product_id, sub_inventory_id)) {
            return Ok(stubbed.clone());
        }
        self.find_inventory(product_id, sub_inventory_id)
    }

    async fn book_inventory(
        &self,
        product_id: &str,
        sub_inventory_id: &str,
    ) -> Result<ProductPayload, UpstreamError> {
        self.begin(
            UpstreamCall::BookInventory {
                product_id: product_id.to_string(),
                sub_inventory_id: sub_inventory_id.to_string(),
            },
            &self.fail_next_writes,
        )
        .await?;

        if let Some(body) = self.booking_responses.get(&key(product_id, sub_inventory_id)) {
            return Ok(ProductPayload::new(body.clone()));
        }

        let mut product = self
            .products
            .get_mut(product_id)
            .ok_or_else(|| not_found(format!("product {product_id} not found")))?;

        let full_id = format!("{product_id}{sub_inventory_id}");
        let inventory = product
            .inventories
            .iter_mut()
            .find(|inv| inv.inventory_id == full_id || inv.inventory_id == sub_inventory_id)
            .ok_or_else(|| not_found(format!("inventory {full_id} not found")))?;

        // The system of record serializes bookings: a second write loses.
        if inventory.booked {
            return Err(UpstreamError::ApiResponse {
                status_code: 409,
                message: format!("inventory {full_id} already booked"),
            });
        }
        inventory.booked = true;

        encode(&*product)
    }
}

/// Serves the upstream path conventions on top of a shared [`MockUpstream`].
pub fn router(mock: Arc<MockUpstream>) -> Router {
    Router::new()
        .route("/products", get(list_products))
        .route("/product/:product_id", get(get_product))
        .route(
            "/product/:product_id/inventory/:sub_inventory_id",
            get(get_inventory).post(book_inventory),
        )
        .with_state(mock)
}

async fn list_products(State(mock): State<Arc<MockUpstream>>) -> Response {
    payload_response(mock.list_products().await)
}

async fn get_product(
    State(mock): State<Arc<MockUpstream>>,
    Path(product_id): Path<String>,
) -> Response {
    payload_response(mock.get_product(&product_id).await)
}

async fn get_inventory(
    State(mock): State<Arc<MockUpstream>>,
    Path((product_id, sub_inventory_id)): Path<(String, String)>,
) -> Response {
    match mock.get_inventory(&product_id, &sub_inventory_id).await {
        Ok(inventory) => Json(inventory).into_response(),
        Err(err) => error_response(err),
    }
}

async fn book_inventory(
    State(mock): State<Arc<MockUpstream>>,
    Path((product_id, sub_inventory_id)): Path<(String, String)>,
) -> Response {
    payload_response(mock.book_inventory(&product_id, &sub_inventory_id).await)
}

fn payload_response(result: Result<ProductPayload, UpstreamError>) -> Response {
    match result {
        Ok(payload) => (
            [(header::CONTENT_TYPE, "application/json")],
            payload.into_bytes(),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: UpstreamError) -> Response {
    match err {
        UpstreamError::ApiResponse {
            status_code,
            message,
        } => {
            let status =
                StatusCode::from_u16(status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, message).into_response()
        }
        other => (StatusCode::INTERNAL_SERVER_ERROR, other.to_string()).into_response(),
    }
}

fn sample_product(product_id: &str, content: &str, detail: &str, booked: &[bool]) -> Product {
    Product {
        product_id: product_id.to_string(),
        content: content.to_string(),
        experience_detail: detail.to_string(),
        inventories: booked
            .iter()
            .enumerate()
            .map(|(i, booked)| Inventory::new(format!("{product_id}i{:04}", i + 1), *booked))
            .collect(),
    }
}

fn key(product_id: &str, sub_inventory_id: &str) -> InventoryKey {
    (product_id.to_string(), sub_inventory_id.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<ProductPayload, UpstreamError> {
    serde_json::to_vec(value)
        .map(ProductPayload::new)
        .map_err(|e| UpstreamError::Decode(e.to_string()))
}

fn not_found(message: String) -> UpstreamError {
    UpstreamError::ApiResponse {
        status_code: 404,
        message,
    }
}

fn unavailable() -> UpstreamError {
    UpstreamError::ApiResponse {
        status_code: 503,
        message: "Service temporarily unavailable".to_string(),
    }
}

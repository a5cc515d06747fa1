// Product and inventory shapes exchanged with the upstream product service

use bytes::Bytes;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// Booking status of one inventory unit as reported by upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Inventory {
    // Never inspected by the gateway, so tolerate its absence.
    #[serde(default)]
    pub inventory_id: String,
    pub booked: bool,
}

impl Inventory {
    pub fn new(inventory_id: impl Into<String>, booked: bool) -> Self {
        Self {
            inventory_id: inventory_id.into(),
            booked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub product_id: String,
    pub content: String,
    pub experience_detail: String,
    #[serde(default)]
    pub inventories: Vec<Inventory>,
}

/// Upstream response body carried through the gateway byte-for-byte.
///
/// The gateway never reshapes product data; callers that want a typed view
/// can [`parse`](ProductPayload::parse) it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductPayload(Bytes);

impl ProductPayload {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self(body.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }

    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.0)
    }
}

impl From<Bytes> for ProductPayload {
    fn from(body: Bytes) -> Self {
        Self(body)
    }
}

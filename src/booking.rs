// Inventory booking: validate the identifier, read booking status upstream, then book if free

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

use crate::identifier::InventoryId;
use crate::model::ProductPayload;
use crate::upstream::{ProductApi, UpstreamError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("Invalid inventoryId")]
    InvalidIdentifier,

    #[error("This inventory has been booked.")]
    AlreadyBooked,

    #[error("Failed to read from product service: {0}")]
    UpstreamRead(#[source] UpstreamError),

    #[error("Failed to book with product service: {0}")]
    UpstreamWrite(#[source] UpstreamError),
}

impl BookingError {
    // Caller mistakes, as opposed to upstream trouble
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            BookingError::InvalidIdentifier | BookingError::AlreadyBooked
        )
    }

    pub fn upstream(&self) -> Option<&UpstreamError> {
        match self {
            BookingError::UpstreamRead(err) | BookingError::UpstreamWrite(err) => Some(err),
            _ => None,
        }
    }
}

/// Gate in front of the upstream booking write.
///
/// Stateless: each call reads the current status, then writes only if the
/// inventory is free. There is no lock spanning the two calls, so concurrent
/// callers may both see `booked == false` and both write; rejecting the loser
/// is the product service's job.
pub struct BookingWorkflow<C> {
    client: Arc<C>,
}

impl<C> Clone for BookingWorkflow<C> {
    fn clone(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
        }
    }
}

impl<C: ProductApi> BookingWorkflow<C> {
    pub fn new(client: Arc<C>) -> Self {
        Self { client }
    }

    pub async fn book_by_inventory_id(&self, id: &str) -> Result<ProductPayload, BookingError> {
        let inventory_id = match InventoryId::parse(id) {
            Ok(parsed) => parsed,
            Err(err) => {
                info!(inventory_id = %id, "rejected malformed inventory id");
                return Err(err);
            }
        };
        let product_id = inventory_id.product_id();
        let sub_inventory_id = inventory_id.sub_inventory_id();

        let inventory = self
            .client
            .get_inventory(product_id, sub_inventory_id)
            .await
            .map_err(|err| {
                warn!(%inventory_id, error = %err, "inventory status read failed");
                BookingError::UpstreamRead(err)
            })?;

        // Upstream is trusted even when it answers for a different inventory.
        if !inventory.inventory_id.is_empty()
            && inventory.inventory_id != inventory_id.as_str()
            && inventory.inventory_id != sub_inventory_id
        {
            warn!(
                %inventory_id,
                reported = %inventory.inventory_id,
                "upstream answered with a different inventory id"
            );
        }

        if inventory.booked {
            info!(%inventory_id, "inventory already booked");
            return Err(BookingError::AlreadyBooked);
        }

        let product = self
            .client
            .book_inventory(product_id, sub_inventory_id)
            .await
            .map_err(|err| {
                warn!(%inventory_id, error = %err, "booking write failed");
                BookingError::UpstreamWrite(err)
            })?;

        info!(%inventory_id, "inventory booked");
        Ok(product)
    }

    // Pass-throughs for the listing/detail endpoints
    pub async fn list_products(&self) -> Result<ProductPayload, BookingError> {
        self.client
            .list_products()
            .await
            .map_err(BookingError::UpstreamRead)
    }

    pub async fn get_product(&self, product_id: &str) -> Result<ProductPayload, BookingError> {
        self.client
            .get_product(product_id)
            .await
            .map_err(BookingError::UpstreamRead)
    }
}

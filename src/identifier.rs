// Composite inventory identifier: 5 chars of product id followed by 5 chars of sub-inventory id

use std::fmt;

use crate::booking::BookingError;

pub const INVENTORY_ID_LEN: usize = 10;
const PRODUCT_ID_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InventoryId(String);

impl InventoryId {
    /// Validates `raw` as exactly ten ASCII alphanumeric characters.
    ///
    /// No other structure is checked; the product/sub-inventory split is
    /// purely positional.
    pub fn parse(raw: &str) -> Result<Self, BookingError> {
        if raw.len() != INVENTORY_ID_LEN || !raw.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(BookingError::InvalidIdentifier);
        }

        Ok(Self(raw.to_string()))
    }

    pub fn product_id(&self) -> &str {
        // ASCII only, so byte offsets are char offsets
        &self.0[..PRODUCT_ID_LEN]
    }

    pub fn sub_inventory_id(&self) -> &str {
        &self.0[PRODUCT_ID_LEN..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InventoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_positionally() {
        let id = InventoryId::parse("p0003i0001").unwrap();
        assert_eq!(id.product_id(), "p0003");
        assert_eq!(id.sub_inventory_id(), "i0001");
        assert_eq!(id.to_string(), "p0003i0001");
    }

    #[test]
    fn rejects_wrong_lengths() {
        for raw in ["", "p0003", "p0003i000", "p0003i00011", "p0001111dsfdf"] {
            assert!(
                matches!(InventoryId::parse(raw), Err(BookingError::InvalidIdentifier)),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn rejects_non_alphanumeric_at_full_length() {
        for raw in ["p0003-0001", "p0003 i001", "p0003_0001", "p0003i000.", "p0003\ni001"] {
            assert_eq!(raw.len(), INVENTORY_ID_LEN);
            assert!(InventoryId::parse(raw).is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn rejects_unicode_alphanumerics() {
        // 'é' is alphabetic but outside [0-9A-Za-z]; 9 chars, 10 bytes
        assert_eq!("p0003i00é".len(), INVENTORY_ID_LEN);
        assert!(InventoryId::parse("p0003i00é").is_err());
        // 10 chars, 11 bytes
        assert!(InventoryId::parse("p0003i000é").is_err());
    }

    #[test]
    fn accepts_mixed_case() {
        let id = InventoryId::parse("ABCDEfghij").unwrap();
        assert_eq!(id.product_id(), "ABCDE");
        assert_eq!(id.sub_inventory_id(), "fghij");
    }
}

//! Warehouse inventory domain.
//!
//! Companies own items and shipments; shipment lines move an item's available
//! quantity in and out. All business rules live here as deterministic domain
//! logic (no IO, no storage): callers load records, invoke these operations,
//! and persist whatever changed in one unit of work.

pub mod allocation;
pub mod company;
pub mod error;
pub mod item;
pub mod measure;
pub mod shipment;
pub mod shipment_item;

pub use allocation::ItemAllocation;
pub use company::Company;
pub use error::{InventoryError, InventoryResult};
pub use item::{Item, ItemPatch, ItemRecord, NewItem};
pub use measure::{DimensionUnit, Dimensions, Weight, WeightUnit};
pub use shipment::{Direction, NewShipment, Shipment, ShipmentPatch, ShipmentRecord, ShipmentStatus};
pub use shipment_item::{ShipmentItem, ShipmentItemRecord};

#[cfg(test)]
mod tests {
    const SOURCES: [(&str, &str); 8] = [
        ("lib.rs", include_str!("lib.rs")),
        ("allocation.rs", include_str!("allocation.rs")),
        ("company.rs", include_str!("company.rs")),
        ("error.rs", include_str!("error.rs")),
        ("item.rs", include_str!("item.rs")),
        ("measure.rs", include_str!("measure.rs")),
        ("shipment.rs", include_str!("shipment.rs")),
        ("shipment_item.rs", include_str!("shipment_item.rs")),
    ];

    #[test]
    fn every_module_opens_with_a_module_doc() {
        for (name, source) in SOURCES {
            assert!(source.starts_with("//!"), "{name} has no module doc");
        }
    }

    #[test]
    fn code_lines_fit_in_one_hundred_columns() {
        for (name, source) in SOURCES {
            for (number, line) in source.lines().enumerate() {
                // rustfmt leaves long string literals alone.
                if line.trim_start().starts_with('"') {
                    continue;
                }
                assert!(
                    line.chars().count() <= 100,
                    "{name}:{} is {} columns wide",
                    number + 1,
                    line.chars().count()
                );
            }
        }
    }
}

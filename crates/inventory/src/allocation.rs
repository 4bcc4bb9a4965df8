//! Open inbound/allocated quantity of an item.

use serde::{Deserialize, Serialize};

use stocktrack_core::{Entity, ItemId};

use crate::shipment::{Direction, Shipment};
use crate::shipment_item::ShipmentItem;

/// How much of an item sits on open lines of unshipped shipments.
///
/// Only open lines on shipments that have not shipped count. Closing a
/// shipment drops its lines out of both totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemAllocation {
    inbound: i64,
    allocated: i64,
}

impl ItemAllocation {
    pub fn new(inbound: i64, allocated: i64) -> Self {
        Self { inbound, allocated }
    }

    /// Sum the open lines for `item_id` across `(shipment, line)` pairs.
    ///
    /// Pairs whose line does not belong to the paired shipment are ignored.
    pub fn tally<'a, I>(item_id: ItemId, lines: I) -> Self
    where
        I: IntoIterator<Item = (&'a Shipment, &'a ShipmentItem)>,
    {
        lines
            .into_iter()
            .filter(|(shipment, line)| {
                line.item_id() == item_id
                    && line.shipment_id() == shipment.id()
                    && line.is_open()
                    && !shipment.is_shipped()
            })
            .fold(Self::default(), |mut acc, (shipment, line)| {
                match shipment.direction() {
                    Direction::In => acc.inbound += line.quantity(),
                    Direction::Out => acc.allocated += line.quantity(),
                }
                acc
            })
    }

    /// Quantity on open lines of unshipped inbound shipments.
    pub fn quantity_inbound(&self) -> i64 {
        self.inbound
    }

    /// Quantity on open lines of unshipped outbound shipments.
    pub fn quantity_allocated(&self) -> i64 {
        self.allocated
    }

    pub fn can_have_shipping_disabled(&self) -> bool {
        self.inbound == 0 && self.allocated == 0
    }

    pub fn is_on_shipments(&self) -> bool {
        !self.can_have_shipping_disabled()
    }

    pub fn in_valid_delete_state(&self) -> bool {
        !self.is_on_shipments()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stocktrack_core::{CompanyId, ShipmentId, ShipmentItemId};

    use crate::shipment::{NewShipment, Shipment};
    use crate::shipment_item::ShipmentItemRecord;

    fn shipment(company_id: CompanyId, direction: Direction) -> Shipment {
        Shipment::new(
            ShipmentId::new(),
            NewShipment {
                company_id,
                to_address: "Test address 1234".to_string(),
                date_promised: Utc::now(),
                direction,
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn line(shipment: &Shipment, item_id: ItemId, quantity: i64, is_open: bool) -> ShipmentItem {
        ShipmentItem::from_record(ShipmentItemRecord {
            id: ShipmentItemId::new(),
            shipment_id: shipment.id(),
            item_id,
            quantity,
            is_open,
        })
    }

    #[test]
    fn tally_splits_inbound_and_allocated() {
        let company = CompanyId::new();
        let item = ItemId::new();
        let inbound = shipment(company, Direction::In);
        let outbound = shipment(company, Direction::Out);
        let lines = [
            (&inbound, line(&inbound, item, 7, true)),
            (&outbound, line(&outbound, item, 3, true)),
            (&outbound, line(&outbound, item, 2, true)),
            (&outbound, line(&outbound, ItemId::new(), 50, true)),
        ];

        let allocation = ItemAllocation::tally(item, lines.iter().map(|(s, l)| (*s, l)));
        assert_eq!(allocation.quantity_inbound(), 7);
        assert_eq!(allocation.quantity_allocated(), 5);
        assert!(allocation.is_on_shipments());
        assert!(!allocation.in_valid_delete_state());
    }

    #[test]
    fn closed_lines_and_shipped_shipments_do_not_count() {
        let company = CompanyId::new();
        let item = ItemId::new();
        let mut shipped = shipment(company, Direction::Out);
        let open_line_on_shipped = line(&shipped, item, 4, true);
        shipped.mark_shipped(Utc::now());
        let pending = shipment(company, Direction::Out);
        let closed_line = line(&pending, item, 9, false);

        let allocation = ItemAllocation::tally(
            item,
            [(&shipped, &open_line_on_shipped), (&pending, &closed_line)],
        );
        assert_eq!(allocation, ItemAllocation::default());
        assert!(allocation.can_have_shipping_disabled());
        assert!(allocation.in_valid_delete_state());
    }
}

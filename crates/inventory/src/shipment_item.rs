//! Shipment lines and the stock movements they cause.
//!
//! A line is OPEN until its shipment is marked shipped/received, then CLOSED.
//! Stock moves when an open line is created, re-quantified or released:
//!
//! | operation | OUT shipment          | IN shipment           |
//! |-----------|-----------------------|-----------------------|
//! | open      | available -= quantity | available += quantity |
//! | change    | available -= delta    | available += delta    |
//! | release   | available += quantity | available -= quantity |
//!
//! Closing a line moves nothing; it only drops the line out of the item's
//! inbound/allocated totals. Every check runs before the item is touched, so a
//! failed operation leaves both the item and the line exactly as they were.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktrack_core::{DomainError, Entity, ItemId, ShipmentId, ShipmentItemId};

use crate::error::{InventoryError, InventoryResult};
use crate::item::Item;
use crate::shipment::{Direction, Shipment};

/// Stored column values of a shipment line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentItemRecord {
    pub id: ShipmentItemId,
    pub shipment_id: ShipmentId,
    pub item_id: ItemId,
    pub quantity: i64,
    pub is_open: bool,
}

/// One line of a shipment: `quantity` units of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipmentItem {
    record: ShipmentItemRecord,
}

fn require_quantity(quantity: i64) -> InventoryResult<()> {
    if quantity < 0 {
        return Err(DomainError::validation(format!(
            "line quantity cannot be negative (got {quantity})"
        ))
        .into());
    }
    Ok(())
}

impl ShipmentItem {
    /// Create an open line and move stock for it.
    ///
    /// Checks, in order: the quantity is non-negative, the shipment has not
    /// shipped, item and shipment belong to the same company, the item is
    /// shippable (OUT only), and enough stock is available (OUT only).
    pub fn open(
        id: ShipmentItemId,
        shipment: &Shipment,
        item: &mut Item,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> InventoryResult<Self> {
        require_quantity(quantity)?;
        shipment.ensure_accepts_lines()?;

        if item.company_id() != shipment.company_id() {
            return Err(InventoryError::IncompatibleCompany {
                sku: item.sku().to_string(),
                item_company: item.company_id(),
                shipment_company: shipment.company_id(),
            });
        }

        let direction = shipment.direction();
        if direction == Direction::Out {
            if !item.is_shippable() {
                return Err(InventoryError::ItemNotShippable {
                    sku: item.sku().to_string(),
                });
            }
            if quantity > item.quantity_available() {
                return Err(InventoryError::InvalidInventoryQuantity {
                    sku: item.sku().to_string(),
                    requested: quantity,
                    available: item.quantity_available(),
                });
            }
        }

        item.adjust_available(direction.stock_delta(quantity), now)?;

        Ok(Self {
            record: ShipmentItemRecord {
                id,
                shipment_id: shipment.id(),
                item_id: item.id(),
                quantity,
                is_open: true,
            },
        })
    }

    pub fn from_record(record: ShipmentItemRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &ShipmentItemRecord {
        &self.record
    }

    pub fn into_record(self) -> ShipmentItemRecord {
        self.record
    }

    pub fn shipment_id(&self) -> ShipmentId {
        self.record.shipment_id
    }

    pub fn item_id(&self) -> ItemId {
        self.record.item_id
    }

    pub fn quantity(&self) -> i64 {
        self.record.quantity
    }

    pub fn is_open(&self) -> bool {
        self.record.is_open
    }

    /// Change the quantity of this (persisted) line to `new_quantity`.
    ///
    /// `self` is the prior state; the difference is what moves. On an OUT
    /// shipment the new quantity may use up to the item's available stock plus
    /// what this line already holds. On an IN shipment there is no bound: a
    /// reduction after the received stock went out again leaves the item
    /// negative, exactly as deleting the line would.
    ///
    /// Returns the signed change applied to `quantity_available`.
    pub fn change_quantity(
        &mut self,
        shipment: &Shipment,
        item: &mut Item,
        new_quantity: i64,
        now: DateTime<Utc>,
    ) -> InventoryResult<i64> {
        self.ensure_belongs_to(shipment, item)?;
        self.ensure_open()?;
        require_quantity(new_quantity)?;

        let old_quantity = self.record.quantity;
        let direction = shipment.direction();
        let stock_delta = direction.stock_delta(new_quantity - old_quantity);

        if direction == Direction::Out
            && new_quantity > item.quantity_available().saturating_add(old_quantity)
        {
            return Err(InventoryError::InvalidInventoryQuantityEdit {
                sku: item.sku().to_string(),
                current: old_quantity,
                requested: new_quantity,
                available: item.quantity_available(),
            });
        }

        item.adjust_available(stock_delta, now)?;
        self.record.quantity = new_quantity;
        Ok(stock_delta)
    }

    /// Reverse this line's stock movement ahead of deleting it.
    ///
    /// No bound is checked: the movement being reversed was validated when it
    /// was made. Returns the signed change applied to `quantity_available`.
    pub fn release(
        &self,
        shipment: &Shipment,
        item: &mut Item,
        now: DateTime<Utc>,
    ) -> InventoryResult<i64> {
        self.ensure_belongs_to(shipment, item)?;
        self.ensure_open()?;

        let stock_delta = -shipment.direction().stock_delta(self.record.quantity);
        item.adjust_available(stock_delta, now)?;
        Ok(stock_delta)
    }

    /// OPEN -> CLOSED. Returns `false` if the line was already closed.
    pub fn close(&mut self) -> bool {
        let was_open = self.record.is_open;
        self.record.is_open = false;
        was_open
    }

    fn ensure_open(&self) -> InventoryResult<()> {
        if !self.record.is_open {
            return Err(InventoryError::ShipmentItemClosed {
                shipment_item_id: self.record.id,
            });
        }
        Ok(())
    }

    fn ensure_belongs_to(&self, shipment: &Shipment, item: &Item) -> InventoryResult<()> {
        if self.record.shipment_id != shipment.id() || self.record.item_id != item.id() {
            return Err(DomainError::invariant(format!(
                "line {} does not belong to shipment {} and item {}",
                self.record.id,
                shipment.id(),
                item.id()
            ))
            .into());
        }
        Ok(())
    }
}

impl Entity for ShipmentItem {
    type Id = ShipmentItemId;

    fn id(&self) -> ShipmentItemId {
        self.record.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stocktrack_core::CompanyId;

    use crate::item::NewItem;
    use crate::measure::{DimensionUnit, Dimensions, Weight, WeightUnit};
    use crate::shipment::NewShipment;

    fn item(company_id: CompanyId, available: i64, shippable: bool) -> Item {
        Item::new(
            ItemId::new(),
            NewItem {
                sku: "BLU-SHRT-LG".to_string(),
                company_id,
                product_name: "Blue Shirt (Large)".to_string(),
                weight: Weight {
                    value: 10.0,
                    unit: WeightUnit::Kg,
                },
                dimensions: Dimensions {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                    unit: DimensionUnit::M,
                },
                is_shippable: shippable,
                initial_quantity: available,
            },
            Utc::now(),
        )
        .unwrap()
    }

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

    fn open(shipment: &Shipment, item: &mut Item, quantity: i64) -> InventoryResult<ShipmentItem> {
        ShipmentItem::open(ShipmentItemId::new(), shipment, item, quantity, Utc::now())
    }

    #[test]
    fn outbound_line_allocates_stock() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let mut it = item(company, 10, true);

        let line = open(&out, &mut it, 5).unwrap();
        assert!(line.is_open());
        assert_eq!(line.quantity(), 5);
        assert_eq!(it.quantity_available(), 5);
    }

    #[test]
    fn inbound_line_adds_stock_even_when_not_shippable() {
        let company = CompanyId::new();
        let inbound = shipment(company, Direction::In);
        let mut it = item(company, 0, false);

        open(&inbound, &mut it, 10).unwrap();
        assert_eq!(it.quantity_available(), 10);
    }

    #[test]
    fn company_mismatch_is_rejected_first() {
        let out = shipment(CompanyId::new(), Direction::Out);
        let mut it = item(CompanyId::new(), 100, false);

        let err = open(&out, &mut it, 10).unwrap_err();
        assert_eq!(err.code(), "incompatible_company");
        assert_eq!(it.quantity_available(), 100);
    }

    #[test]
    fn non_shippable_item_cannot_go_out() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let mut it = item(company, 100, false);

        let err = open(&out, &mut it, 10).unwrap_err();
        assert_eq!(err.code(), "item_not_shippable");
        assert_eq!(it.quantity_available(), 100);
    }

    #[test]
    fn overshoot_on_create_leaves_stock_untouched() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let mut it = item(company, 4, true);

        let err = open(&out, &mut it, 5).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InvalidInventoryQuantity {
                sku: "BLU-SHRT-LG".to_string(),
                requested: 5,
                available: 4,
            }
        );
        assert_eq!(it.quantity_available(), 4);
    }

    #[test]
    fn negative_quantity_is_a_validation_error() {
        let company = CompanyId::new();
        let inbound = shipment(company, Direction::In);
        let mut it = item(company, 0, true);

        let err = open(&inbound, &mut it, -1).unwrap_err();
        assert_eq!(err.code(), "validation_error");
    }

    #[test]
    fn lines_cannot_be_added_after_shipping() {
        let company = CompanyId::new();
        let mut out = shipment(company, Direction::Out);
        out.mark_shipped(Utc::now());
        let mut it = item(company, 10, true);

        let err = open(&out, &mut it, 1).unwrap_err();
        assert_eq!(err.code(), "shipment_already_shipped");
        assert_eq!(it.quantity_available(), 10);
    }

    #[test]
    fn outbound_edit_may_use_the_lines_own_allocation() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let mut it = item(company, 10, true);
        let mut line = open(&out, &mut it, 5).unwrap();

        assert_eq!(line.change_quantity(&out, &mut it, 10, Utc::now()).unwrap(), -5);
        assert_eq!(it.quantity_available(), 0);
        assert_eq!(line.quantity(), 10);

        assert_eq!(line.change_quantity(&out, &mut it, 5, Utc::now()).unwrap(), 5);
        assert_eq!(it.quantity_available(), 5);
    }

    #[test]
    fn outbound_edit_overshoot_is_rejected() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let mut it = item(company, 10, true);
        let mut line = open(&out, &mut it, 5).unwrap();

        let err = line.change_quantity(&out, &mut it, 11, Utc::now()).unwrap_err();
        assert_eq!(
            err,
            InventoryError::InvalidInventoryQuantityEdit {
                sku: "BLU-SHRT-LG".to_string(),
                current: 5,
                requested: 11,
                available: 5,
            }
        );
        assert_eq!(it.quantity_available(), 5);
        assert_eq!(line.quantity(), 5);
    }

    #[test]
    fn inbound_edit_is_unbounded_like_inbound_release() {
        let company = CompanyId::new();
        let inbound = shipment(company, Direction::In);
        let out = shipment(company, Direction::Out);
        let mut it = item(company, 0, true);
        let mut receipt = open(&inbound, &mut it, 10).unwrap();

        receipt.change_quantity(&inbound, &mut it, 1_000, Utc::now()).unwrap();
        assert_eq!(it.quantity_available(), 1_000);

        open(&out, &mut it, 995).unwrap();
        assert_eq!(it.quantity_available(), 5);

        // Same outcome as releasing the receipt: the shortfall shows as negative stock.
        assert_eq!(receipt.change_quantity(&inbound, &mut it, 0, Utc::now()).unwrap(), -1_000);
        assert_eq!(it.quantity_available(), -995);
        receipt.change_quantity(&inbound, &mut it, 995, Utc::now()).unwrap();
        assert_eq!(it.quantity_available(), 0);
    }

    #[test]
    fn stock_overflow_is_rejected_before_anything_moves() {
        let company = CompanyId::new();
        let inbound = shipment(company, Direction::In);
        let mut it = item(company, 1, true);

        let err = open(&inbound, &mut it, i64::MAX).unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(it.quantity_available(), 1);

        let mut receipt = open(&inbound, &mut it, 10).unwrap();
        let err = receipt
            .change_quantity(&inbound, &mut it, i64::MAX, Utc::now())
            .unwrap_err();
        assert_eq!(err.code(), "validation_error");
        assert_eq!(it.quantity_available(), 11);
        assert_eq!(receipt.quantity(), 10);
    }

    #[test]
    fn outbound_edit_bound_holds_at_the_top_of_the_range() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let mut it = item(company, i64::MAX, true);
        let mut line = open(&out, &mut it, 5).unwrap();

        line.change_quantity(&out, &mut it, i64::MAX, Utc::now()).unwrap();
        assert_eq!(it.quantity_available(), 0);
        assert_eq!(line.quantity(), i64::MAX);

        line.change_quantity(&out, &mut it, 0, Utc::now()).unwrap();
        assert_eq!(it.quantity_available(), i64::MAX);
    }

    #[test]
    fn release_reverses_the_movement() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let inbound = shipment(company, Direction::In);
        let mut it = item(company, 10, true);

        let sale = open(&out, &mut it, 7).unwrap();
        assert_eq!(sale.release(&out, &mut it, Utc::now()).unwrap(), 7);
        assert_eq!(it.quantity_available(), 10);

        let receipt = open(&inbound, &mut it, 3).unwrap();
        assert_eq!(it.quantity_available(), 13);
        assert_eq!(receipt.release(&inbound, &mut it, Utc::now()).unwrap(), -3);
        assert_eq!(it.quantity_available(), 10);
    }

    #[test]
    fn closed_lines_are_inert() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let mut it = item(company, 10, true);
        let mut line = open(&out, &mut it, 4).unwrap();

        assert!(line.close());
        assert!(!line.close());
        assert_eq!(it.quantity_available(), 6);

        let err = line.change_quantity(&out, &mut it, 1, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "shipment_item_closed");
        let err = line.release(&out, &mut it, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "shipment_item_closed");
        assert_eq!(it.quantity_available(), 6);
    }

    #[test]
    fn line_must_match_the_shipment_and_item_it_is_given() {
        let company = CompanyId::new();
        let out = shipment(company, Direction::Out);
        let other = shipment(company, Direction::Out);
        let mut it = item(company, 10, true);
        let mut line = open(&out, &mut it, 4).unwrap();

        let err = line.change_quantity(&other, &mut it, 1, Utc::now()).unwrap_err();
        assert_eq!(err.code(), "invariant_violation");
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Open { outbound: bool, quantity: i64 },
            Change { index: usize, quantity: i64 },
            Release { index: usize },
        }

        fn op() -> impl Strategy<Value = Op> {
            prop_oneof![
                (any::<bool>(), 0i64..40)
                    .prop_map(|(outbound, quantity)| Op::Open { outbound, quantity }),
                (any::<usize>(), 0i64..40)
                    .prop_map(|(index, quantity)| Op::Change { index, quantity }),
                any::<usize>().prop_map(|index| Op::Release { index }),
            ]
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 500,
                ..ProptestConfig::default()
            })]

            /// Property: as long as receipts are only cut or released while their
            /// stock is on hand, available stock never goes negative and always
            /// equals the opening balance plus net open lines.
            #[test]
            fn available_is_net_of_open_lines(
                opening in 0i64..50,
                ops in proptest::collection::vec(op(), 0..40)
            ) {
                let company = CompanyId::new();
                let out = shipment(company, Direction::Out);
                let inbound = shipment(company, Direction::In);
                let mut it = item(company, opening, true);
                let mut lines: Vec<(bool, ShipmentItem)> = Vec::new();

                for op in ops {
                    match op {
                        Op::Open { outbound, quantity } => {
                            let s = if outbound { &out } else { &inbound };
                            if let Ok(line) = open(s, &mut it, quantity) {
                                lines.push((outbound, line));
                            }
                        }
                        Op::Change { index, quantity } if !lines.is_empty() => {
                            let idx = index % lines.len();
                            let (outbound, line) = &mut lines[idx];
                            let s = if *outbound { &out } else { &inbound };
                            // Cutting a receipt below what is still on hand would
                            // go negative; only cut it when it fits.
                            if *outbound || it.quantity_available() + quantity >= line.quantity() {
                                let _ = line.change_quantity(s, &mut it, quantity, Utc::now());
                            }
                        }
                        Op::Release { index } if !lines.is_empty() => {
                            let idx = index % lines.len();
                            let (outbound, line) = lines.remove(idx);
                            let s = if outbound { &out } else { &inbound };
                            // Releasing a receipt whose stock is already promised
                            // out would go negative; only release when it fits.
                            if outbound || it.quantity_available() >= line.quantity() {
                                line.release(s, &mut it, Utc::now()).unwrap();
                            } else {
                                lines.push((outbound, line));
                            }
                        }
                        _ => {}
                    }

                    prop_assert!(it.quantity_available() >= 0);
                }

                let net: i64 = lines
                    .iter()
                    .map(|(outbound, line)| {
                        if *outbound {
                            -line.quantity()
                        } else {
                            line.quantity()
                        }
                    })
                    .sum();
                prop_assert_eq!(it.quantity_available(), opening + net);
            }

            /// Property: opening then releasing an outbound line restores stock exactly.
            #[test]
            fn open_then_release_restores_stock(opening in 0i64..1_000, quantity in 0i64..1_000) {
                let company = CompanyId::new();
                let out = shipment(company, Direction::Out);
                let mut it = item(company, opening, true);

                match open(&out, &mut it, quantity) {
                    Ok(line) => {
                        prop_assert_eq!(it.quantity_available(), opening - quantity);
                        line.release(&out, &mut it, Utc::now()).unwrap();
                    }
                    Err(err) => {
                        prop_assert!(quantity > opening);
                        prop_assert_eq!(err.code(), "invalid_inventory_quantity");
                    }
                }
                prop_assert_eq!(it.quantity_available(), opening);
            }
        }
    }
}

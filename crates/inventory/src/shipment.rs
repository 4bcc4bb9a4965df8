//! Shipment headers.
//!
//! A shipment has a direction (IN receives stock, OUT sends it) and a status
//! derived from `date_shipped`. Stock itself moves through its lines, see
//! [`crate::shipment_item`].

use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stocktrack_core::{CompanyId, DomainError, DomainResult, Entity, ShipmentId};

use crate::error::{InventoryError, InventoryResult};

/// Which way a shipment moves stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Receiving stock into the warehouse.
    In,
    /// Sending stock out of the warehouse.
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }

    /// Signed effect of `quantity` units on available stock.
    pub fn stock_delta(self, quantity: i64) -> i64 {
        match self {
            Direction::In => quantity,
            Direction::Out => -quantity,
        }
    }
}

impl FromStr for Direction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            other => Err(DomainError::validation(format!(
                "direction must be IN or OUT (got {other:?})"
            ))),
        }
    }
}

/// Derived shipment status. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipmentStatus {
    Pending,
    Shipped,
    PendingReceipt,
    Received,
}

impl ShipmentStatus {
    pub fn derive(direction: Direction, is_shipped: bool) -> Self {
        match (direction, is_shipped) {
            (Direction::Out, true) => ShipmentStatus::Shipped,
            (Direction::Out, false) => ShipmentStatus::Pending,
            (Direction::In, true) => ShipmentStatus::Received,
            (Direction::In, false) => ShipmentStatus::PendingReceipt,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            ShipmentStatus::Pending => "Pending",
            ShipmentStatus::Shipped => "Shipped",
            ShipmentStatus::PendingReceipt => "Pending Receipt",
            ShipmentStatus::Received => "Received",
        }
    }
}

impl core::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Stored column values of a shipment header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentRecord {
    pub id: ShipmentId,
    pub company_id: CompanyId,
    pub to_address: String,
    pub date_created: DateTime<Utc>,
    pub date_promised: DateTime<Utc>,
    pub is_shipped: bool,
    pub date_shipped: Option<DateTime<Utc>>,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShipment {
    pub company_id: CompanyId,
    pub to_address: String,
    pub date_promised: DateTime<Utc>,
    pub direction: Direction,
}

/// Partial update of a shipment header. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShipmentPatch {
    pub to_address: Option<String>,
    pub date_promised: Option<DateTime<Utc>>,
    pub direction: Option<Direction>,
}

/// A shipment header grouping lines that move in one direction for one company.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shipment {
    record: ShipmentRecord,
}

fn require_address(address: &str) -> DomainResult<String> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("to_address cannot be empty"));
    }
    Ok(trimmed.to_string())
}

impl Shipment {
    pub fn new(id: ShipmentId, input: NewShipment, now: DateTime<Utc>) -> DomainResult<Self> {
        let to_address = require_address(&input.to_address)?;
        Ok(Self {
            record: ShipmentRecord {
                id,
                company_id: input.company_id,
                to_address,
                date_created: now,
                date_promised: input.date_promised,
                is_shipped: false,
                date_shipped: None,
                direction: input.direction,
            },
        })
    }

    pub fn from_record(record: ShipmentRecord) -> Self {
        Self { record }
    }

    pub fn record(&self) -> &ShipmentRecord {
        &self.record
    }

    pub fn into_record(self) -> ShipmentRecord {
        self.record
    }

    pub fn company_id(&self) -> CompanyId {
        self.record.company_id
    }

    pub fn to_address(&self) -> &str {
        &self.record.to_address
    }

    pub fn date_created(&self) -> DateTime<Utc> {
        self.record.date_created
    }

    pub fn date_promised(&self) -> DateTime<Utc> {
        self.record.date_promised
    }

    pub fn is_shipped(&self) -> bool {
        self.record.is_shipped
    }

    pub fn date_shipped(&self) -> Option<DateTime<Utc>> {
        self.record.date_shipped
    }

    pub fn direction(&self) -> Direction {
        self.record.direction
    }

    pub fn status(&self) -> ShipmentStatus {
        ShipmentStatus::derive(self.record.direction, self.record.is_shipped)
    }

    /// Mark the shipment shipped (OUT) or received (IN).
    ///
    /// Returns `false` if it was already shipped; the first shipping date is kept.
    /// Closing the lines is the caller's job, in the same unit of work.
    pub fn mark_shipped(&mut self, date: DateTime<Utc>) -> bool {
        if self.record.is_shipped {
            return false;
        }
        self.record.is_shipped = true;
        self.record.date_shipped = Some(date);
        true
    }

    /// Fails once the shipment has shipped: new lines would never count.
    pub fn ensure_accepts_lines(&self) -> InventoryResult<()> {
        if self.record.is_shipped {
            return Err(InventoryError::ShipmentAlreadyShipped {
                shipment_id: self.record.id,
            });
        }
        Ok(())
    }

    /// Apply a header edit. Direction may only change while the shipment has no
    /// lines and has not shipped.
    pub fn apply_patch(&mut self, patch: ShipmentPatch, has_lines: bool) -> InventoryResult<()> {
        let to_address = patch.to_address.as_deref().map(require_address).transpose()?;
        if let Some(direction) = patch.direction {
            if direction != self.record.direction && (has_lines || self.record.is_shipped) {
                return Err(InventoryError::ShipmentDirectionLocked {
                    shipment_id: self.record.id,
                });
            }
        }

        if let Some(address) = to_address {
            self.record.to_address = address;
        }
        if let Some(date) = patch.date_promised {
            self.record.date_promised = date;
        }
        if let Some(direction) = patch.direction {
            self.record.direction = direction;
        }
        Ok(())
    }
}

impl Entity for Shipment {
    type Id = ShipmentId;

    fn id(&self) -> ShipmentId {
        self.record.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipment(direction: Direction) -> Shipment {
        Shipment::new(
            ShipmentId::new(),
            NewShipment {
                company_id: CompanyId::new(),
                to_address: "Test address 1234".to_string(),
                date_promised: Utc::now(),
                direction,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[test]
    fn status_is_derived_from_direction_and_shipped_flag() {
        assert_eq!(ShipmentStatus::derive(Direction::Out, true).label(), "Shipped");
        assert_eq!(ShipmentStatus::derive(Direction::Out, false).label(), "Pending");
        assert_eq!(ShipmentStatus::derive(Direction::In, true).label(), "Received");
        assert_eq!(
            ShipmentStatus::derive(Direction::In, false).to_string(),
            "Pending Receipt"
        );
    }

    #[test]
    fn mark_shipped_keeps_first_date() {
        let mut s = shipment(Direction::In);
        assert_eq!(s.status(), ShipmentStatus::PendingReceipt);

        let first = Utc::now();
        assert!(s.mark_shipped(first));
        assert!(!s.mark_shipped(first + chrono::Duration::days(1)));
        assert_eq!(s.date_shipped(), Some(first));
        assert_eq!(s.status(), ShipmentStatus::Received);
        assert_eq!(s.ensure_accepts_lines().unwrap_err().code(), "shipment_already_shipped");
    }

    #[test]
    fn blank_address_is_rejected() {
        let input = NewShipment {
            company_id: CompanyId::new(),
            to_address: "  ".to_string(),
            date_promised: Utc::now(),
            direction: Direction::Out,
        };
        assert!(Shipment::new(ShipmentId::new(), input, Utc::now()).is_err());
    }

    #[test]
    fn direction_is_locked_once_lines_exist() {
        let mut s = shipment(Direction::Out);
        let flip = ShipmentPatch {
            direction: Some(Direction::In),
            to_address: Some("New address".to_string()),
            ..ShipmentPatch::default()
        };
        let err = s.apply_patch(flip.clone(), true).unwrap_err();
        assert_eq!(err.code(), "shipment_direction_locked");
        assert_eq!(s.to_address(), "Test address 1234");

        s.apply_patch(flip, false).unwrap();
        assert_eq!(s.direction(), Direction::In);
        assert_eq!(s.to_address(), "New address");
    }

    #[test]
    fn direction_parses_from_wire_codes() {
        assert_eq!("OUT".parse::<Direction>().unwrap(), Direction::Out);
        assert!("out".parse::<Direction>().is_err());
        assert_eq!(Direction::Out.stock_delta(5), -5);
        assert_eq!(Direction::In.stock_delta(5), 5);
    }
}

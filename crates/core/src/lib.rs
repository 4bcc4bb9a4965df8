//! `stocktrack-core`: shared building blocks for the warehouse domain.
//!
//! This crate contains **pure** primitives (no storage, no IO).

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{require_text, DomainError, DomainResult};
pub use id::{CompanyId, ItemId, ShipmentId, ShipmentItemId};
pub use value_object::ValueObject;

//! Value object trait: equality by value, not identity.
//!
//! A weight of `10 kg` is the same weight wherever it appears; it has no id of
//! its own. Value objects are immutable: to "change" one, build a new one.

/// Marker trait for value objects.
///
/// ```ignore
/// #[derive(Debug, Clone, PartialEq)]
/// struct Weight { value: f64, unit: WeightUnit }
///
/// impl ValueObject for Weight {}
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

//! Physical measurements of an item: weight and bounding-box dimensions.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stocktrack_core::{DomainError, DomainResult, ValueObject};

const KG_PER_LB: f64 = 0.453_592_37;
const KG_PER_OZ: f64 = KG_PER_LB / 16.0;
const M_PER_FT: f64 = 0.3048;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lb,
    Oz,
}

impl WeightUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            WeightUnit::Kg => "kg",
            WeightUnit::Lb => "lb",
            WeightUnit::Oz => "oz",
        }
    }

    fn kilograms_per_unit(self) -> f64 {
        match self {
            WeightUnit::Kg => 1.0,
            WeightUnit::Lb => KG_PER_LB,
            WeightUnit::Oz => KG_PER_OZ,
        }
    }
}

impl FromStr for WeightUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "kg" => Ok(WeightUnit::Kg),
            "lb" => Ok(WeightUnit::Lb),
            "oz" => Ok(WeightUnit::Oz),
            other => Err(DomainError::validation(format!(
                "weight unit must be one of kg, lb, oz (got {other:?})"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionUnit {
    #[default]
    M,
    Ft,
}

impl DimensionUnit {
    pub fn as_str(self) -> &'static str {
        match self {
            DimensionUnit::M => "m",
            DimensionUnit::Ft => "ft",
        }
    }

    fn meters_per_unit(self) -> f64 {
        match self {
            DimensionUnit::M => 1.0,
            DimensionUnit::Ft => M_PER_FT,
        }
    }
}

impl FromStr for DimensionUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "m" => Ok(DimensionUnit::M),
            "ft" => Ok(DimensionUnit::Ft),
            other => Err(DomainError::validation(format!(
                "dimension unit must be one of m, ft (got {other:?})"
            ))),
        }
    }
}

fn require_measure(field: &str, value: f64) -> DomainResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(DomainError::validation(format!(
            "{field} must be a finite, non-negative number (got {value})"
        )));
    }
    Ok(())
}

/// Weight of a single unit of an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Weight {
    pub value: f64,
    #[serde(default)]
    pub unit: WeightUnit,
}

impl ValueObject for Weight {}

impl Weight {
    pub fn new(value: f64, unit: WeightUnit) -> DomainResult<Self> {
        let weight = Self { value, unit };
        weight.validate()?;
        Ok(weight)
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_measure("weight", self.value)
    }

    pub fn in_kilograms(&self) -> f64 {
        self.value * self.unit.kilograms_per_unit()
    }
}

/// Bounding box of a single unit of an item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub unit: DimensionUnit,
}

impl ValueObject for Dimensions {}

impl Dimensions {
    pub fn new(x: f64, y: f64, z: f64, unit: DimensionUnit) -> DomainResult<Self> {
        let dims = Self { x, y, z, unit };
        dims.validate()?;
        Ok(dims)
    }

    pub fn validate(&self) -> DomainResult<()> {
        require_measure("dimension x", self.x)?;
        require_measure("dimension y", self.y)?;
        require_measure("dimension z", self.z)
    }

    pub fn volume_cubic_meters(&self) -> f64 {
        let m = self.unit.meters_per_unit();
        (self.x * m) * (self.y * m) * (self.z * m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn weight_converts_to_kilograms() {
        assert!(close(Weight::new(10.0, WeightUnit::Kg).unwrap().in_kilograms(), 10.0));
        assert!(close(Weight::new(1.0, WeightUnit::Lb).unwrap().in_kilograms(), 0.45359237));
        assert!(close(Weight::new(16.0, WeightUnit::Oz).unwrap().in_kilograms(), 0.45359237));
    }

    #[test]
    fn volume_converts_feet_to_cubic_meters() {
        let dims = Dimensions::new(1.0, 2.0, 3.0, DimensionUnit::M).unwrap();
        assert!(close(dims.volume_cubic_meters(), 6.0));

        let cube_foot = Dimensions::new(1.0, 1.0, 1.0, DimensionUnit::Ft).unwrap();
        assert!(close(cube_foot.volume_cubic_meters(), 0.3048 * 0.3048 * 0.3048));
    }

    #[test]
    fn negative_or_non_finite_measures_are_rejected() {
        assert!(Weight::new(-1.0, WeightUnit::Kg).is_err());
        assert!(Weight::new(f64::NAN, WeightUnit::Kg).is_err());
        assert!(Dimensions::new(1.0, f64::INFINITY, 1.0, DimensionUnit::M).is_err());
    }

    #[test]
    fn units_parse_from_their_codes() {
        assert_eq!("lb".parse::<WeightUnit>().unwrap(), WeightUnit::Lb);
        assert_eq!("ft".parse::<DimensionUnit>().unwrap(), DimensionUnit::Ft);
        assert!("stone".parse::<WeightUnit>().is_err());
        assert_eq!(WeightUnit::Oz.as_str(), "oz");
    }
}

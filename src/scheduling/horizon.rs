use qtty::{Hour, Quantity};

use super::error::BuildError;
use crate::units::{self, SameDim};

/// Discrete planning horizon: `slots` equal slots of `slot_hours` hours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Horizon {
    slots: usize,
    slot_length: Quantity<Hour>,
}

impl Horizon {
    /// Horizon of `slots` slots, each lasting `slot_length` in any time unit.
    pub fn new<U: SameDim<Hour>>(
        slots: usize,
        slot_length: Quantity<U>,
    ) -> Result<Self, BuildError> {
        Self::from_hours(slots, units::hours(slot_length))
    }

    pub fn from_hours(slots: usize, slot_hours: f64) -> Result<Self, BuildError> {
        if slots == 0 {
            return Err(BuildError::EmptyHorizon);
        }
        if !slot_hours.is_finite() || slot_hours <= 0.0 {
            return Err(BuildError::InvalidSlotLength(slot_hours));
        }
        Ok(Self {
            slots,
            slot_length: Quantity::new(slot_hours),
        })
    }

    /// `slots` one-hour slots.
    ///
    /// # Panics
    ///
    /// If `slots` is zero.
    pub fn hourly(slots: usize) -> Self {
        assert!(slots > 0, "horizon must contain at least one slot");
        Self {
            slots,
            slot_length: Quantity::new(1.0),
        }
    }

    pub fn slots(&self) -> usize {
        self.slots
    }

    pub fn slot_length(&self) -> Quantity<Hour> {
        self.slot_length
    }

    pub fn slot_hours(&self) -> f64 {
        self.slot_length.value()
    }

    pub fn contains(&self, slot: usize) -> bool {
        slot < self.slots
    }
}

impl Default for Horizon {
    fn default() -> Self {
        Self::hourly(24)
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for Horizon {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("Horizon", 2)?;
        s.serialize_field("slots", &self.slots)?;
        s.serialize_field("slot_hours", &self.slot_hours())?;
        s.end()
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for Horizon {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(serde::Deserialize)]
        struct Raw {
            slots: usize,
            slot_hours: f64,
        }

        let raw = Raw::deserialize(deserializer)?;
        Self::from_hours(raw.slots, raw.slot_hours).map_err(serde::de::Error::custom)
    }
}

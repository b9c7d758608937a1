use std::collections::BTreeMap;

use super::error::BuildError;
use super::horizon::Horizon;

/// Unit energy price of every slot.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PriceCurve {
    prices: Vec<f64>,
}

impl PriceCurve {
    pub fn new(prices: Vec<f64>) -> Self {
        Self { prices }
    }

    /// Same price in every slot.
    pub fn flat(slots: usize, price: f64) -> Self {
        Self::new(vec![price; slots])
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn get(&self, slot: usize) -> Option<f64> {
        self.prices.get(slot).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.prices
    }

    pub(crate) fn check(&self, horizon: &Horizon) -> Result<(), BuildError> {
        if self.prices.len() != horizon.slots() {
            return Err(BuildError::PriceLengthMismatch {
                expected: horizon.slots(),
                actual: self.prices.len(),
            });
        }
        match self.prices.iter().position(|p| !p.is_finite()) {
            Some(slot) => Err(BuildError::NonFinitePrice { slot }),
            None => Ok(()),
        }
    }
}

impl From<Vec<f64>> for PriceCurve {
    fn from(prices: Vec<f64>) -> Self {
        Self::new(prices)
    }
}

impl std::ops::Index<usize> for PriceCurve {
    type Output = f64;

    fn index(&self, slot: usize) -> &f64 {
        &self.prices[slot]
    }
}

/// Per-slot limits on the total power one agent may draw.
///
/// A cap applies to each agent separately; it never couples two agents.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GroupCaps {
    limits: BTreeMap<usize, f64>,
}

impl GroupCaps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cap(mut self, slot: usize, limit: f64) -> Self {
        self.set(slot, limit);
        self
    }

    pub fn set(&mut self, slot: usize, limit: f64) {
        self.limits.insert(slot, limit);
    }

    pub fn get(&self, slot: usize) -> Option<f64> {
        self.limits.get(&slot).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.limits.iter().map(|(&s, &l)| (s, l))
    }

    pub fn len(&self) -> usize {
        self.limits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.limits.is_empty()
    }

    pub(crate) fn check(&self, horizon: &Horizon) -> Result<(), BuildError> {
        for (slot, limit) in self.iter() {
            if !horizon.contains(slot) || !limit.is_finite() || limit < 0.0 {
                return Err(BuildError::InvalidGroupCap { slot, limit });
            }
        }
        Ok(())
    }
}

impl FromIterator<(usize, f64)> for GroupCaps {
    fn from_iter<I: IntoIterator<Item = (usize, f64)>>(iter: I) -> Self {
        Self {
            limits: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_length_must_match_horizon() {
        let h = Horizon::hourly(3);
        assert!(PriceCurve::flat(3, 1.0).check(&h).is_ok());
        assert_eq!(
            PriceCurve::new(vec![1.0, 2.0]).check(&h),
            Err(BuildError::PriceLengthMismatch {
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_non_finite_price_is_rejected() {
        let h = Horizon::hourly(3);
        let prices = PriceCurve::new(vec![1.0, f64::INFINITY, 2.0]);
        assert_eq!(prices.check(&h), Err(BuildError::NonFinitePrice { slot: 1 }));
    }

    #[test]
    fn test_negative_prices_are_allowed() {
        let h = Horizon::hourly(2);
        assert!(PriceCurve::new(vec![-1.0, 2.0]).check(&h).is_ok());
    }

    #[test]
    fn test_group_caps_are_validated() {
        let h = Horizon::hourly(24);
        let caps: GroupCaps = [(11, 2.0), (13, 2.0)].into_iter().collect();
        assert!(caps.check(&h).is_ok());
        assert_eq!(caps.get(11), Some(2.0));
        assert_eq!(caps.get(12), None);

        let outside = GroupCaps::new().with_cap(24, 1.0);
        assert_eq!(
            outside.check(&h),
            Err(BuildError::InvalidGroupCap {
                slot: 24,
                limit: 1.0
            })
        );
        assert!(GroupCaps::new().with_cap(3, -0.5).check(&h).is_err());
    }

    #[test]
    fn test_group_caps_iterate_in_slot_order() {
        let caps = GroupCaps::new().with_cap(21, 2.0).with_cap(11, 1.0);
        let slots: Vec<_> = caps.iter().map(|(s, _)| s).collect();
        assert_eq!(slots, vec![11, 21]);
    }
}

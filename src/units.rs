//! Time-unit helpers for slot lengths.
//!
//! Scheduling math runs in hours: allocations are power per slot and energy is
//! `power × slot_hours`. Callers may describe a slot in any time unit
//! (minutes, seconds, days); the conversion to hours is checked at compile
//! time through [`SameDim`].

use qtty::{Hour, Quantity, Unit};

/// Marker trait for units that share the same physical dimension.
///
/// Automatically implemented for any pair of units where `From::Dim == To::Dim`.
///
/// ```
/// use qtty::{Hour, Minute};
/// use loadshift::units::SameDim;
///
/// fn accepts_time<U: SameDim<Hour>>() {}
///
/// accepts_time::<Minute>();
/// ```
pub trait SameDim<To: Unit>: Unit<Dim = To::Dim> {}

impl<From, To> SameDim<To> for From
where
    From: Unit,
    To: Unit<Dim = From::Dim>,
{
}

/// Converts a quantity to another unit of the same dimension.
#[inline]
pub const fn convert<From, To>(q: Quantity<From>) -> Quantity<To>
where
    From: SameDim<To>,
    To: Unit,
{
    q.to_const::<To>()
}

/// Length of `duration` in hours.
#[inline]
pub fn hours<U: SameDim<Hour>>(duration: Quantity<U>) -> f64 {
    convert::<U, Hour>(duration).value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtty::{Day, Minute, Second};

    #[test]
    fn test_quarter_hour_slot() {
        let slot = Quantity::<Minute>::new(15.0);
        assert!((hours(slot) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_day_is_twenty_four_hours() {
        assert!((hours(Quantity::<Day>::new(1.0)) - 24.0).abs() < 1e-12);
    }

    #[test]
    fn test_seconds_to_hours() {
        assert!((hours(Quantity::<Second>::new(5400.0)) - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_convert_round_trip_through_minutes() {
        let h = Quantity::<Hour>::new(2.0);
        let m: Quantity<Minute> = convert(h);
        assert!((m.value() - 120.0).abs() < 1e-12);
        let back: Quantity<Hour> = convert(m);
        assert!((back.value() - 2.0).abs() < 1e-12);
    }
}

use pitchside_shared::Money;

use crate::BookingError;

/// Cost of playing `minutes` on a field charged `price_per_hour`, rounded to the cent.
pub fn match_cost(price_per_hour: Money, minutes: i32) -> Result<Money, BookingError> {
    if !(75..=90).contains(&minutes) {
        return Err(BookingError::Validation("Match duration must be between 75 and 90 minutes".into()));
    }
    if price_per_hour.minor() < 0 {
        return Err(BookingError::Validation("pricePerHour cannot be negative".into()));
    }
    let minor = (price_per_hour.minor() as f64 * minutes as f64 / 60.0).round() as i64;
    Ok(Money::from_minor(minor))
}

/// Takings of a booking of any length, rounded to the cent.
pub fn booking_revenue(price_per_hour: Money, minutes: i32) -> Result<Money, BookingError> {
    let minor = (i128::from(price_per_hour.minor()) * i128::from(minutes.max(0)) + 30) / 60;
    i64::try_from(minor)
        .map(Money::from_minor)
        .map_err(|_| BookingError::Validation("Revenue is too large".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_cost() {
        let hourly = Money::from_minor(6000);
        assert_eq!(match_cost(hourly, 90).unwrap(), Money::from_minor(9000));
        assert_eq!(match_cost(hourly, 75).unwrap(), Money::from_minor(7500));
        assert_eq!(match_cost(Money::from_minor(3333), 80).unwrap(), Money::from_minor(4444));
    }

    #[test]
    fn test_match_cost_rejects_odd_durations() {
        assert!(match_cost(Money::from_minor(6000), 60).is_err());
        assert!(match_cost(Money::from_minor(6000), 120).is_err());
    }

    #[test]
    fn test_booking_revenue_covers_any_length() {
        assert_eq!(booking_revenue(Money::from_minor(6000), 120).unwrap(), Money::from_minor(12000));
        assert_eq!(booking_revenue(Money::from_minor(3333), 80).unwrap(), Money::from_minor(4444));
        assert!(booking_revenue(Money::from_minor(i64::MAX), 90).is_err());
    }
}

//! Shipping rate table
//!
//! Deterministic lookup by (division, district). The bands are a literal
//! table so a new rate is one row, not another branch in a conditional
//! chain. Amounts are minor units (poisha) converted to 2-dp decimals.

use rust_decimal::Decimal;

/// One rate band; `district: None` matches any district in the division
struct RateBand {
    division: &'static str,
    district: Option<&'static str>,
    rate_minor: i64,
}

const RATE_BANDS: &[RateBand] = &[
    RateBand {
        division: "Dhaka",
        district: Some("Dhaka"),
        rate_minor: 40_00,
    },
    RateBand {
        division: "Mymensingh",
        district: None,
        rate_minor: 60_00,
    },
    RateBand {
        division: "Chittagong",
        district: None,
        rate_minor: 120_00,
    },
];

/// Everything outside the named bands, including Dhaka division outside
/// Dhaka district
const DEFAULT_RATE_MINOR: i64 = 100_00;

/// Shipping charge for a destination, 2 decimal places
pub fn shipping_charge(division: &str, district: &str) -> Decimal {
    let rate_minor = RATE_BANDS
        .iter()
        .find(|band| {
            band.division == division && band.district.is_none_or(|d| d == district)
        })
        .map(|band| band.rate_minor)
        .unwrap_or(DEFAULT_RATE_MINOR);
    Decimal::new(rate_minor, 2)
}

//! Order number generation
//!
//! Format: `YYYYMMDD` + 2-digit daily sequence, e.g. `2024060107`. The
//! printed number is a support-facing wire contract — customers quote it
//! on the phone — so the field is never widened silently: the 100th order
//! of a calendar day is refused loudly instead.

use thiserror::Error;

/// Highest sequence the 2-digit suffix can carry
const MAX_DAILY_SEQUENCE: u32 = 99;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NumberError {
    #[error("daily order number sequence exhausted for {0}")]
    SequenceExhausted(String),

    #[error("malformed order number in index: {0}")]
    Malformed(String),
}

/// Derive the next order number for a date prefix
///
/// `last_for_day` is the lexicographically greatest existing number with
/// this prefix (the store scans its unique index for it, inside the same
/// write transaction that will insert the result).
pub fn next_order_number(
    last_for_day: Option<&str>,
    date_prefix: &str,
) -> Result<String, NumberError> {
    let sequence = match last_for_day {
        None => 1,
        Some(last) => {
            let suffix = last
                .strip_prefix(date_prefix)
                .ok_or_else(|| NumberError::Malformed(last.to_string()))?;
            let last_seq: u32 = suffix
                .parse()
                .map_err(|_| NumberError::Malformed(last.to_string()))?;
            last_seq + 1
        }
    };
    if sequence > MAX_DAILY_SEQUENCE {
        return Err(NumberError::SequenceExhausted(date_prefix.to_string()));
    }
    Ok(format!("{date_prefix}{sequence:02}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_order_of_the_day_is_01() {
        assert_eq!(next_order_number(None, "20240601").unwrap(), "2024060101");
    }

    #[test]
    fn sequence_increments() {
        assert_eq!(
            next_order_number(Some("2024060107"), "20240601").unwrap(),
            "2024060108"
        );
    }

    #[test]
    fn sequence_99_is_the_ceiling() {
        assert_eq!(
            next_order_number(Some("2024060198"), "20240601").unwrap(),
            "2024060199"
        );
        assert_eq!(
            next_order_number(Some("2024060199"), "20240601"),
            Err(NumberError::SequenceExhausted("20240601".to_string()))
        );
    }

    #[test]
    fn malformed_index_entries_are_rejected() {
        assert!(matches!(
            next_order_number(Some("20240601xx"), "20240601"),
            Err(NumberError::Malformed(_))
        ));
        assert!(matches!(
            next_order_number(Some("1999010101"), "20240601"),
            Err(NumberError::Malformed(_))
        ));
    }
}

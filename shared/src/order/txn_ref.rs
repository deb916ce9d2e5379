//! Gateway transaction reference
//!
//! Wire contract: `ORDER_{order_id}_{user_id}_{nonce}`, where the nonce is
//! eight lowercase hex digits. The gateway echoes this string back on every
//! callback; the second `_`-separated field is always the order id, the
//! third the owning user id. The nonce segment is optional on parse so
//! references issued before it existed still resolve.
//!
//! Parsing fails closed: anything malformed is an error the caller treats
//! as "unknown order", never a panic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Structured transaction reference sent to the payment gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TxnRef {
    pub order_id: u64,
    pub user_id: u64,
    /// Random disambiguator so re-initiated sessions get distinct references
    pub nonce: u32,
}

/// Transaction reference parse failure
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TxnRefParseError {
    #[error("missing ORDER prefix")]
    BadPrefix,
    #[error("malformed transaction reference: {0}")]
    Malformed(String),
}

impl TxnRef {
    /// Build a fresh reference with a random nonce
    pub fn new(order_id: u64, user_id: u64) -> Self {
        Self {
            order_id,
            user_id,
            nonce: rand::random(),
        }
    }

    /// Parse a reference echoed back by the gateway
    pub fn parse(raw: &str) -> Result<Self, TxnRefParseError> {
        let parts: Vec<&str> = raw.split('_').collect();
        if parts.first() != Some(&"ORDER") {
            return Err(TxnRefParseError::BadPrefix);
        }
        if parts.len() < 3 || parts.len() > 4 {
            return Err(TxnRefParseError::Malformed(format!(
                "expected 3 or 4 segments, got {}",
                parts.len()
            )));
        }
        let order_id: u64 = parts[1]
            .parse()
            .map_err(|_| TxnRefParseError::Malformed(format!("bad order id: {}", parts[1])))?;
        let user_id: u64 = parts[2]
            .parse()
            .map_err(|_| TxnRefParseError::Malformed(format!("bad user id: {}", parts[2])))?;
        let nonce = match parts.get(3) {
            Some(hex) => u32::from_str_radix(hex, 16)
                .map_err(|_| TxnRefParseError::Malformed(format!("bad nonce: {hex}")))?,
            None => 0,
        };
        Ok(Self {
            order_id,
            user_id,
            nonce,
        })
    }
}

impl fmt::Display for TxnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ORDER_{}_{}_{:08x}",
            self.order_id, self.user_id, self.nonce
        )
    }
}

impl FromStr for TxnRef {
    type Err = TxnRefParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

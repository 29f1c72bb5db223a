/*
[INPUT]:  Gate.io v4 spot schema definitions and serde requirements
[OUTPUT]: Typed Rust model structs with serialization support
[POS]:    Data layer - type definitions for API communication
[UPDATE]: When API schema changes or new types added
*/

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{OrderStatus, OrderType, Side, TimeInForce};

/// GET /spot/time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerTime {
    /// Milliseconds since epoch
    pub server_time: i64,
}

/// Entry of GET /spot/accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpotAccount {
    pub currency: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub available: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub locked: Decimal,
    #[serde(default)]
    pub update_id: Option<i64>,
}

/// Spot order as returned by the order endpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    #[serde(default)]
    pub text: Option<String>,
    pub currency_pair: String,
    pub status: OrderStatus,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: Side,
    #[serde(with = "rust_decimal::serde::str")]
    pub amount: Decimal,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default)]
    pub left: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::str_option")]
    #[serde(default)]
    pub filled_total: Option<Decimal>,
    #[serde(default)]
    pub create_time_ms: Option<i64>,
    #[serde(default)]
    pub update_time_ms: Option<i64>,
}

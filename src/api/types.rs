use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_with::{DisplayFromStr, PickFirst, TimestampMilliSeconds, serde_as};

use crate::types::{Address, ChainId, Decimal};

/// Platform-wide parameters returned by `GET /system/config`.
///
/// Fetched once per client and treated as read-only afterwards.
#[serde_as]
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SystemConfig {
    pub gateway_url: String,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub chain_id: ChainId,
    #[serde(default)]
    pub block_explorer_url: Option<String>,
    pub settlement_address: Address,
    pub settlement_decimals: u32,
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub l1_chain_id: ChainId,
    #[serde(default)]
    pub bridged_tokens: Vec<BridgedToken>,
    #[serde(default)]
    pub liquidation_fee: Option<Decimal>,
}

#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BridgedToken {
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub l1_token_address: Address,
    pub l1_bridge_address: Address,
    pub l2_token_address: Address,
    pub l2_bridge_address: Address,
}

#[serde_as]
#[non_exhaustive]
#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct SystemTime {
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub server_time: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuthResponse {
    pub(crate) jwt_token: String,
}

/// Margin summary of the authenticated account, `GET /account`.
#[serde_as]
#[non_exhaustive]
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AccountSummary {
    pub account: Address,
    pub account_value: Decimal,
    pub free_collateral: Decimal,
    pub initial_margin_requirement: Decimal,
    pub maintenance_margin_requirement: Decimal,
    pub status: String,
    #[serde_as(as = "TimestampMilliSeconds<i64>")]
    pub updated_at: DateTime<Utc>,
}

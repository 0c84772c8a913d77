pub use alloy::primitives::{Address, ChainId};
pub use rust_decimal::Decimal;

//! Partial-credential account built from an L2 subkey alone.
//!
//! The account owns the subkey signer and the session JWT. One instance is
//! shared by the REST and streaming transports, so refreshing the JWT here
//! re-authenticates both channels.

use std::borrow::Cow;
use std::str::FromStr as _;
use std::sync::RwLock;

use alloy::dyn_abi::Eip712Domain;
use alloy::primitives::{FixedBytes, U256, hex};
use alloy::signers::Signer as _;
use alloy::signers::local::PrivateKeySigner;
use alloy::sol_types::SolStruct as _;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret as _, SecretString};

use crate::api::SystemConfig;
use crate::error::Error;
use crate::types::{Address, ChainId};
use crate::{Result, Timestamp};

pub const VAREN_ACCOUNT: &str = "VAREN-ACCOUNT";
pub const VAREN_SIGNATURE: &str = "VAREN-SIGNATURE";
pub const VAREN_TIMESTAMP: &str = "VAREN-TIMESTAMP";
pub const VAREN_SIGNATURE_EXPIRATION: &str = "VAREN-SIGNATURE-EXPIRATION";

const DOMAIN_NAME: Option<Cow<'static, str>> = Some(Cow::Borrowed("Varen"));
const VERSION: Option<Cow<'static, str>> = Some(Cow::Borrowed("1"));

/// Lifetime of an auth signature, in seconds.
const AUTH_SIGNATURE_TTL: Timestamp = 24 * 60 * 60;

alloy::sol! {
    struct VarenAuth {
        address account;
        string method;
        string path;
        uint256 timestamp;
        uint256 expiration;
    }
}

#[derive(Debug)]
pub struct SubkeyAccount {
    address: Address,
    signer: PrivateKeySigner,
    domain: Eip712Domain,
    jwt: RwLock<Option<SecretString>>,
}

impl SubkeyAccount {
    /// Builds the account from system config and the L2 subkey material.
    ///
    /// Both values are hex quantities. Short values are left-padded, so `0xABC`
    /// is the scalar `0x0…0abc`. `l2_address` is the main account the subkey
    /// acts for, not the subkey's own address.
    pub fn new(config: &SystemConfig, l2_private_key: SecretString, l2_address: &str) -> Result<Self> {
        if config.chain_id == 0 {
            return Err(Error::validation("system config has no chain id"));
        }

        let secret = hex_quantity::<32>(l2_private_key.expose_secret(), "L2 private key")?;
        let signer = PrivateKeySigner::from_bytes(&secret)
            .map_err(|e| Error::validation(format!("invalid L2 private key: {e}")))?
            .with_chain_id(Some(config.chain_id));
        let address = Address::from(hex_quantity::<20>(l2_address, "L2 address")?);

        let domain = Eip712Domain {
            name: DOMAIN_NAME,
            version: VERSION,
            chain_id: Some(U256::from(config.chain_id)),
            verifying_contract: Some(config.settlement_address),
            ..Eip712Domain::default()
        };

        Ok(Self {
            address,
            signer,
            domain,
            jwt: RwLock::new(None),
        })
    }

    /// Main account address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Address derived from the subkey itself.
    #[must_use]
    pub fn signer_address(&self) -> Address {
        self.signer.address()
    }

    #[must_use]
    pub fn chain_id(&self) -> Option<ChainId> {
        self.signer.chain_id()
    }

    /// Signs an auth request for `method path` and returns the `VAREN-*` headers.
    pub async fn auth_headers(
        &self,
        method: &Method,
        path: &str,
        timestamp: Timestamp,
    ) -> Result<HeaderMap> {
        let expiration = timestamp + AUTH_SIGNATURE_TTL;
        let auth = VarenAuth {
            account: self.address,
            method: method.as_str().to_owned(),
            path: path.to_owned(),
            timestamp: U256::from(timestamp.unsigned_abs()),
            expiration: U256::from(expiration.unsigned_abs()),
        };

        let hash = auth.eip712_signing_hash(&self.domain);
        let signature = self.signer.sign_hash(&hash).await?;

        let mut map = HeaderMap::new();
        map.insert(VAREN_ACCOUNT, self.address.to_string().parse()?);
        map.insert(
            VAREN_SIGNATURE,
            HeaderValue::from_str(&hex::encode_prefixed(signature.as_bytes()))?,
        );
        map.insert(VAREN_TIMESTAMP, timestamp.to_string().parse()?);
        map.insert(VAREN_SIGNATURE_EXPIRATION, expiration.to_string().parse()?);

        Ok(map)
    }

    /// Current session token, if the REST channel has authenticated.
    pub fn jwt(&self) -> Result<Option<SecretString>> {
        let guard = self
            .jwt
            .read()
            .map_err(|e| Error::synchronization(format!("jwt lock poisoned: {e}")))?;
        Ok(guard.clone())
    }

    pub fn set_jwt(&self, token: SecretString) -> Result<()> {
        let mut guard = self
            .jwt
            .write()
            .map_err(|e| Error::synchronization(format!("jwt lock poisoned: {e}")))?;
        *guard = Some(token);
        Ok(())
    }

    pub fn clear_jwt(&self) -> Result<()> {
        let mut guard = self
            .jwt
            .write()
            .map_err(|e| Error::synchronization(format!("jwt lock poisoned: {e}")))?;
        *guard = None;
        Ok(())
    }
}

/// Parses a `0x`-prefixed or bare hex quantity into `N` big-endian bytes.
fn hex_quantity<const N: usize>(value: &str, what: &str) -> Result<FixedBytes<N>> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);

    if digits.is_empty() {
        return Err(Error::validation(format!("invalid {what}: no hex digits")));
    }
    if digits.len() > N * 2 {
        return Err(Error::validation(format!(
            "invalid {what}: longer than {N} bytes"
        )));
    }

    FixedBytes::<N>::from_str(&format!("{digits:0>width$}", width = N * 2))
        .map_err(|e| Error::validation(format!("invalid {what}: {e}")))
}

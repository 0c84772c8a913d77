#![cfg_attr(doc, doc = include_str!("../README.md"))]

pub mod account;
pub mod api;
pub mod environment;
pub mod error;
pub mod initializer;
pub mod logging;
pub mod subkey;
pub mod transport;
pub mod types;
pub mod ws;

use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Request};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::logging::Logger;

pub use account::SubkeyAccount;
pub use environment::Environment;
pub use error::Error;
pub use initializer::AccountInitializer;
pub use subkey::{RawSubkeyConfig, SubkeyConfig, SubkeyOptions, VarenSubkey};

pub type Result<T> = std::result::Result<T, Error>;

/// Unix timestamp in seconds.
pub type Timestamp = i64;

/// Sends `request` with the extra `headers` and deserializes a successful JSON body.
///
/// Non-2xx responses become [`error::Kind::Status`] errors carrying the response body.
/// Events go to `logger`.
pub(crate) async fn request<Response: DeserializeOwned>(
    client: &ReqwestClient,
    mut request: Request,
    headers: Option<HeaderMap>,
    logger: &Logger,
) -> Result<Response> {
    let method = request.method().clone();
    let path = request.url().path().to_owned();

    if let Some(h) = headers {
        request.headers_mut().extend(h);
    }

    let response = client.execute(request).await?;
    let status_code = response.status();
    if !status_code.is_success() {
        let message = response.text().await.unwrap_or_default();

        logger.in_scope(|| {
            warn!(status = %status_code, method = %method, path = %path, message = %message, "request failed");
        });

        return Err(Error::status(status_code, method, path, message));
    }

    let body = response.bytes().await?;
    deserialize(&body, logger)
}

/// Deserializes `body`, reporting the failing field path on error and logging unknown fields.
fn deserialize<T: DeserializeOwned>(body: &[u8], logger: &Logger) -> Result<T> {
    let mut ignored = Vec::new();
    let mut de = serde_json::Deserializer::from_slice(body);

    let value: T = serde_path_to_error::deserialize(serde_ignored::Deserializer::new(
        &mut de,
        &mut |path: serde_ignored::Path<'_>| ignored.push(path.to_string()),
    ))?;
    de.end()?;

    if !ignored.is_empty() {
        logger.in_scope(|| debug!(fields = ?ignored, "ignored unknown response fields"));
    }

    Ok(value)
}

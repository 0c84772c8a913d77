use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

/// Uniform "make sure the account is ready" step across authentication variants.
///
/// Variants holding full credentials may have to sign and call out before an
/// account exists. Subkey clients finish that work during construction and
/// answer immediately.
#[async_trait]
pub trait AccountInitializer: Send + Sync {
    type Account: Send + Sync;

    async fn ensure_initialized(&self) -> Result<Arc<Self::Account>>;
}

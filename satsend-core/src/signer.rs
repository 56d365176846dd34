//! Signing boundary
//!
//! Key material never enters the engine. A [`TransactionSigner`] receives the
//! unsigned [`TransactionTemplate`] and hands back fully signed wire bytes;
//! the engine does not inspect the signatures, it only decodes the bytes to
//! learn the transaction id before broadcasting.

use std::future::Future;

use crate::error::SignerError;
use crate::template::TransactionTemplate;

/// External capability that turns a template into signed transaction bytes
pub trait TransactionSigner {
    /// Sign every input of `template` and return the consensus-encoded transaction.
    fn sign(
        &self,
        template: &TransactionTemplate,
    ) -> impl Future<Output = Result<Vec<u8>, SignerError>> + Send;
}

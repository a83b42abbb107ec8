//! Storage abstractions for ledger persistence.
//!
//! The ledger is persisted whole: every save replaces the previous
//! contents, and a load returns the full sequence of delivered fingerprints.
//!
//! ```text
//! data/
//! └── delivered.json        # ["3f2a…", "9b1c…", ...]
//! ```

pub mod local;

use async_trait::async_trait;

use crate::error::Result;
use crate::pipeline::Fingerprint;

// Re-export for convenience
pub use local::LocalStorage;

/// Trait for ledger storage backends.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Read every persisted fingerprint.
    ///
    /// Returns `Ok(None)` when nothing was ever persisted and
    /// [`crate::error::AppError::CorruptLedger`] when the data cannot be decoded.
    async fn load(&self) -> Result<Option<Vec<Fingerprint>>>;

    /// Replace the persisted contents with `fingerprints`.
    async fn save(&self, fingerprints: &[Fingerprint]) -> Result<()>;

    /// Human readable location for logs.
    fn location(&self) -> String;
}

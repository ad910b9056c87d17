//! # The supervision contract.
//!
//! A [`Collaborator`] is anything the control plane can watch and restart: a
//! database connection, a chat session client, a catalog loader. Its business
//! logic is opaque; only `probe` / `start` / `stop` are visible.
//!
//! The common handle type is [`CollaboratorRef`], an `Arc<dyn Collaborator>`.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CollaboratorError;

/// Result of one health probe as reported by the collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Health {
    pub healthy: bool,
    pub details: String,
}

impl Health {
    pub fn healthy(details: impl Into<String>) -> Self {
        Self {
            healthy: true,
            details: details.into(),
        }
    }

    pub fn unhealthy(details: impl Into<String>) -> Self {
        Self {
            healthy: false,
            details: details.into(),
        }
    }
}

/// # Supervised external dependency.
///
/// Implementations must be safe to call concurrently; the supervisor
/// serialises `start`/`stop` per collaborator but may probe at any time.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use servicevisor::{Collaborator, CollaboratorError, Health};
///
/// struct Catalog;
///
/// #[async_trait]
/// impl Collaborator for Catalog {
///     fn name(&self) -> &str { "catalog" }
///
///     async fn probe(&self) -> Health {
///         Health::healthy("128 products loaded")
///     }
///
///     async fn start(&self) -> Result<(), CollaboratorError> { Ok(()) }
///     async fn stop(&self) -> Result<(), CollaboratorError> { Ok(()) }
/// }
/// ```
#[async_trait]
pub trait Collaborator: Send + Sync + 'static {
    /// Stable service name; the registry key.
    fn name(&self) -> &str;

    /// Reports current health. Must not hang indefinitely; the caller bounds
    /// it with a timeout regardless.
    async fn probe(&self) -> Health;

    async fn start(&self) -> Result<(), CollaboratorError>;

    async fn stop(&self) -> Result<(), CollaboratorError>;

    /// Optional functional check run by the diagnostic command.
    ///
    /// `None` means the collaborator has no self-test. `Some(Ok(details))`
    /// passes, `Some(Err(_))` fails.
    async fn self_test(&self) -> Option<Result<String, CollaboratorError>> {
        None
    }
}

/// Shared handle to a collaborator.
pub type CollaboratorRef = Arc<dyn Collaborator>;

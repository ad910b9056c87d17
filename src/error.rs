//! Error types used by the control plane and its collaborators.
//!
//! - [`CollaboratorError`]: returned by a collaborator's `start()` / `stop()`.
//! - [`ProbeError`]: why a probe reported a service as unhealthy.
//! - [`RestartError`]: why a restart attempt did not bring the service back.
//! - [`DeliveryError`]: why an event could not be handed to a subscriber.
//! - [`RuntimeError`]: failures of the supervisor loop itself.
//! - [`BuildError`]: invalid wiring detected while building the supervisor.
//! - [`EndpointError`]: unparsable endpoint given on the command line.
//!
//! Every enum exposes `as_label()`, a short stable snake_case label for logs.
//! None of these errors ever escapes a control command: commands fold them
//! into structured reports (see [`crate::control`]).

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// Error reported by a collaborator's lifecycle operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct CollaboratorError {
    message: String,
}

impl CollaboratorError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<std::io::Error> for CollaboratorError {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

impl From<reqwest::Error> for CollaboratorError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// # Reasons a probe marks a service unhealthy.
///
/// Probe errors are always recovered locally: they become an `Error` status
/// with the error text as details and are never propagated further.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The probe did not answer within its timeout.
    #[error("probe timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The collaborator answered and reported itself unhealthy.
    #[error("{details}")]
    Failure { details: String },

    /// The collaborator's probe panicked.
    #[error("probe panicked: {info}")]
    Panicked { info: String },
}

impl ProbeError {
    pub fn as_label(&self) -> &'static str {
        match self {
            ProbeError::Timeout { .. } => "probe_timeout",
            ProbeError::Failure { .. } => "probe_failure",
            ProbeError::Panicked { .. } => "probe_panicked",
        }
    }
}

/// # Reasons a restart attempt failed.
///
/// Shared between every caller of one single-flight restart, hence `Clone`.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RestartError {
    /// No collaborator is registered under this name.
    #[error("unknown service '{name}'")]
    UnknownService { name: String },

    /// `start()` returned an error.
    #[error("start failed: {error}")]
    Start { error: CollaboratorError },

    /// `stop()` or `start()` did not return within the lifecycle timeout.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// The restart task was aborted before it produced a result.
    #[error("restart aborted")]
    Aborted,
}

impl RestartError {
    pub fn as_label(&self) -> &'static str {
        match self {
            RestartError::UnknownService { .. } => "restart_unknown_service",
            RestartError::Start { .. } => "restart_start_failed",
            RestartError::Timeout { .. } => "restart_timeout",
            RestartError::Aborted => "restart_aborted",
        }
    }
}

/// # Reasons an event could not be delivered to one subscriber.
///
/// A delivery failure only ever removes the affected subscriber.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber's mailbox is saturated.
    #[error("subscriber mailbox full")]
    Full,

    /// The subscriber went away.
    #[error("subscriber closed")]
    Closed,

    /// The sink refused the event (e.g. a socket write failed).
    #[error("subscriber rejected event: {reason}")]
    Rejected { reason: String },
}

impl DeliveryError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        DeliveryError::Rejected {
            reason: reason.into(),
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            DeliveryError::Full => "delivery_full",
            DeliveryError::Closed => "delivery_closed",
            DeliveryError::Rejected { .. } => "delivery_rejected",
        }
    }
}

/// # Errors produced by the supervisor loop itself.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period elapsed with restarts still in flight.
    #[error("shutdown timeout {grace:?} exceeded; restarts still in flight: {stuck:?}")]
    GraceExceeded {
        grace: Duration,
        stuck: Vec<String>,
    },

    /// `run()` was called while another `run()` is active.
    #[error("supervisor loop is already running")]
    AlreadyRunning,
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use servicevisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::AlreadyRunning => "runtime_already_running",
        }
    }
}

/// # Wiring errors detected by [`SupervisorBuilder::build`](crate::SupervisorBuilder::build).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("service '{name}' registered twice")]
    DuplicateService { name: String },

    #[error("no collaborators registered")]
    NoCollaborators,
}

impl BuildError {
    pub fn as_label(&self) -> &'static str {
        match self {
            BuildError::DuplicateService { .. } => "build_duplicate_service",
            BuildError::NoCollaborators => "build_no_collaborators",
        }
    }
}

/// # Invalid `name=scheme://target` endpoint specification.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("expected name=scheme://target, got '{input}'")]
    Malformed { input: String },

    #[error("unsupported endpoint scheme in '{input}' (use tcp:// or http(s)://)")]
    UnsupportedScheme { input: String },
}

impl EndpointError {
    pub fn as_label(&self) -> &'static str {
        match self {
            EndpointError::Malformed { .. } => "endpoint_malformed",
            EndpointError::UnsupportedScheme { .. } => "endpoint_unsupported_scheme",
        }
    }
}

/// Extracts a readable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

//! Lifecycle engine for a single DigitalOcean droplet.
//!
//! Drives a remote droplet from its current state to a declared
//! [`DesiredSpec`], waiting out asynchronous provisioning and producing a
//! [`CanonicalState`] after every confirmed read.

pub mod classify;
pub mod config;
pub mod digitalocean;
pub mod lifecycle;
pub mod plan;
pub mod poll;
pub mod state;
pub mod types;

use async_trait::async_trait;

pub use classify::{ClientError, ErrorClass, classify};
pub use config::LifecycleConfig;
pub use lifecycle::{LifecycleManager, ReadOutcome};
pub use poll::PollConfig;
pub use state::{CanonicalState, project};
pub use types::{
    ActionId, ActionStatus, Change, DesiredSpec, DropletId, DropletStatus, RemoteResource,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("remote rejected request: {0}")]
    RemoteRejected(ClientError),

    #[error("transient remote fault: {0}")]
    Transient(ClientError),

    #[error("not found: {0}")]
    NotFound(ClientError),

    #[error("droplet {id} did not become active in time (last status: {last_status})")]
    ProvisionTimeout { id: DropletId, last_status: String },

    #[error("droplet {0} was not destroyed in time")]
    DestroyTimeout(DropletId),

    #[error("{operation} timed out or was cancelled")]
    Timeout {
        operation: &'static str,
        id: Option<DropletId>,
    },

    #[error("{operation} of droplet {id} failed on the provider (action {action})")]
    ActionFailed {
        id: DropletId,
        action: ActionId,
        operation: &'static str,
    },

    #[error("unexpected droplet state: {0}")]
    UnexpectedState(String),

    #[error("changing {0} requires replacing the droplet")]
    RequiresReplacement(&'static str),

    #[error("invalid id: {0}")]
    InvalidId(String),

    #[error("missing env var: {0}")]
    MissingEnv(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Remote failure class, or `None` for errors raised locally from bad
    /// input or configuration.
    pub fn class(&self) -> Option<ErrorClass> {
        match self {
            Self::RemoteRejected(_) | Self::ActionFailed { .. } => {
                Some(ErrorClass::RemoteRejected)
            }
            Self::Transient(_) => Some(ErrorClass::Transient),
            Self::NotFound(_) => Some(ErrorClass::NotFound),
            Self::ProvisionTimeout { .. } | Self::DestroyTimeout(_) | Self::Timeout { .. } => {
                Some(ErrorClass::Timeout)
            }
            Self::UnexpectedState(_)
            | Self::RequiresReplacement(_)
            | Self::InvalidId(_)
            | Self::MissingEnv(_)
            | Self::InvalidConfig(_) => None,
        }
    }
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err.class() {
            ErrorClass::NotFound => Self::NotFound(err),
            ErrorClass::RemoteRejected => Self::RemoteRejected(err),
            ErrorClass::Transient | ErrorClass::Timeout => Self::Transient(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Call contract of the remote compute provider.
///
/// Implementations only translate transport; retry, polling and the meaning
/// of a 404 are decided by the [`LifecycleManager`].
#[async_trait]
pub trait ComputeClient: Send + Sync + 'static {
    /// Submit creation. Returns the provider's initial snapshot.
    async fn create(&self, spec: &DesiredSpec) -> ClientResult<RemoteResource>;

    async fn retrieve(&self, id: DropletId) -> ClientResult<RemoteResource>;

    /// Submit one mutating operation. Acceptance only; the change is
    /// confirmed by later reads.
    async fn update(&self, id: DropletId, change: &Change) -> ClientResult<ActionId>;

    async fn action_status(&self, action: ActionId) -> ClientResult<ActionStatus>;

    async fn destroy(&self, id: DropletId) -> ClientResult<()>;
}

//! Session service contract
//!
//! The connection flow needs four asynchronous requests: a player identity
//! token, the deployment listing, a connection to a chosen deployment, and
//! the player spawn. Each returns a [`Pending`] handle the state machine
//! polls from its tick loop. Implementations decide the transport; the
//! state machine only sees this trait.

use shared::pending::Pending;
use shared::{DeploymentInfo, ErrorCode};
use std::fmt;

/// Parameters for the player identity token request, taken from the session
/// blackboard.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRequest {
    pub dev_auth_token: String,
    pub player_id: String,
    pub display_name: String,
}

/// A failed service request: machine-readable code plus human-readable
/// detail for the status display.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceError {
    pub code: ErrorCode,
    pub detail: String,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.code, self.detail)
    }
}

impl std::error::Error for ServiceError {}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// An established connection to a deployment. Stored on the blackboard once
/// the connect step succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHandle {
    pub deployment_name: String,
    pub session_token: String,
    pub host: String,
    pub port: u16,
}

/// Issues the connection flow's asynchronous requests. Every method returns
/// immediately with a pending handle; the result is read by non-blocking
/// polls. Payloads must only be read out of a confirmed-success result.
pub trait SessionService {
    fn request_player_identity_token(
        &self,
        request: &TokenRequest,
    ) -> Pending<ServiceResult<String>>;

    fn list_deployments(
        &self,
        player_identity_token: &str,
    ) -> Pending<ServiceResult<Vec<DeploymentInfo>>>;

    fn connect(
        &self,
        deployment_name: &str,
        player_identity_token: &str,
    ) -> Pending<ServiceResult<SessionHandle>>;

    fn spawn_player(&self, session: &SessionHandle) -> Pending<ServiceResult<()>>;
}

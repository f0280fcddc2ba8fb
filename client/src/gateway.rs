//! UDP session gateway transport
//!
//! Production implementation of the [`SessionService`] contract. Each
//! request binds an ephemeral UDP socket, sends one bincode-encoded
//! [`GatewayRequest`] to the configured gateway address, and waits (on a
//! worker task, never on the tick thread) for the matching response within
//! a fixed timeout. A gateway-side error response surfaces as a
//! [`ServiceError`] carrying the gateway's code and detail.

use crate::service::{ServiceError, ServiceResult, SessionHandle, SessionService, TokenRequest};
use bincode::{deserialize, serialize};
use log::debug;
use shared::pending::Pending;
use shared::{DeploymentInfo, ErrorCode, GatewayRequest, GatewayResponse};
use std::fmt::Display;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct GatewayClient {
    gateway_addr: SocketAddr,
    request_timeout: Duration,
}

impl GatewayClient {
    pub fn new(gateway_addr: SocketAddr) -> Self {
        Self {
            gateway_addr,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Runs one request/response exchange on a worker task and resolves the
    /// returned slot with the decoded payload.
    fn request<T, F>(&self, request: GatewayRequest, decode: F) -> Pending<ServiceResult<T>>
    where
        T: Send + 'static,
        F: FnOnce(GatewayResponse) -> ServiceResult<T> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let gateway_addr = self.gateway_addr;
        let request_timeout = self.request_timeout;

        let worker = tokio::spawn(async move {
            let result = match exchange(gateway_addr, request_timeout, request).await {
                Ok(response) => decode(response),
                Err(err) => Err(err),
            };
            let _ = tx.send(result);
        });

        Pending::new(rx, worker)
    }
}

async fn exchange(
    gateway_addr: SocketAddr,
    request_timeout: Duration,
    request: GatewayRequest,
) -> ServiceResult<GatewayResponse> {
    let socket = UdpSocket::bind("0.0.0.0:0").await.map_err(internal)?;
    let data = serialize(&request).map_err(internal)?;

    debug!("sending gateway request to {}", gateway_addr);
    socket.send_to(&data, gateway_addr).await.map_err(internal)?;

    let mut buffer = [0u8; 8192];
    let (len, _) = tokio::time::timeout(request_timeout, socket.recv_from(&mut buffer))
        .await
        .map_err(|_| ServiceError {
            code: ErrorCode::Timeout,
            detail: "gateway did not answer in time".to_string(),
        })?
        .map_err(internal)?;

    let response: GatewayResponse = deserialize(&buffer[..len]).map_err(internal)?;

    match response {
        GatewayResponse::Error { code, detail } => Err(ServiceError { code, detail }),
        other => Ok(other),
    }
}

fn internal<E: Display>(err: E) -> ServiceError {
    ServiceError {
        code: ErrorCode::Internal,
        detail: err.to_string(),
    }
}

fn unexpected_response() -> ServiceError {
    ServiceError {
        code: ErrorCode::Internal,
        detail: "unexpected response type from gateway".to_string(),
    }
}

impl SessionService for GatewayClient {
    fn request_player_identity_token(
        &self,
        request: &TokenRequest,
    ) -> Pending<ServiceResult<String>> {
        self.request(
            GatewayRequest::PlayerIdentityToken {
                dev_auth_token: request.dev_auth_token.clone(),
                player_id: request.player_id.clone(),
                display_name: request.display_name.clone(),
            },
            |response| match response {
                GatewayResponse::PlayerIdentityToken {
                    player_identity_token,
                } => Ok(player_identity_token),
                _ => Err(unexpected_response()),
            },
        )
    }

    fn list_deployments(
        &self,
        player_identity_token: &str,
    ) -> Pending<ServiceResult<Vec<DeploymentInfo>>> {
        self.request(
            GatewayRequest::ListDeployments {
                player_identity_token: player_identity_token.to_string(),
            },
            |response| match response {
                GatewayResponse::Deployments { deployments } => Ok(deployments),
                _ => Err(unexpected_response()),
            },
        )
    }

    fn connect(
        &self,
        deployment_name: &str,
        player_identity_token: &str,
    ) -> Pending<ServiceResult<SessionHandle>> {
        let deployment_name = deployment_name.to_string();
        self.request(
            GatewayRequest::Connect {
                deployment_name: deployment_name.clone(),
                player_identity_token: player_identity_token.to_string(),
            },
            move |response| match response {
                GatewayResponse::Connected {
                    session_token,
                    host,
                    port,
                } => Ok(SessionHandle {
                    deployment_name,
                    session_token,
                    host,
                    port,
                }),
                _ => Err(unexpected_response()),
            },
        )
    }

    fn spawn_player(&self, session: &SessionHandle) -> Pending<ServiceResult<()>> {
        self.request(
            GatewayRequest::SpawnPlayer {
                session_token: session.session_token.clone(),
            },
            |response| match response {
                GatewayResponse::PlayerSpawned => Ok(()),
                _ => Err(unexpected_response()),
            },
        )
    }
}

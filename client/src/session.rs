//! Client connection state machine
//!
//! Walks a player through token acquisition, deployment discovery,
//! connection and spawn. Exactly one state is live at a time; each state
//! owns at most one outstanding request, polls it once per tick, and takes
//! at most one transition per tick. A failed request is reported to the
//! status sink and the machine returns to `Start` after a fixed cooldown so
//! a broken backend cannot produce a tight retry loop.
//!
//! Whichever transition fires (success, failure or a forced reset), the
//! departing state's request handle is released before the next state
//! becomes live, so an abandoned state can never leak a pending operation.

use crate::service::{ServiceResult, SessionHandle, SessionService, TokenRequest};
use log::warn;
use shared::pending::Pending;
use shared::status::{Severity, StatusSink};
use shared::DeploymentInfo;
use std::time::{Duration, Instant};

/// Delay before a failed flow returns to `Start`.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(2);

/// Per-connection-attempt data accumulated across states. Owned by the
/// machine for its entire lifetime and mutated only from the tick thread.
#[derive(Debug, Clone, Default)]
pub struct Blackboard {
    pub player_id: String,
    pub display_name: String,
    pub dev_auth_token: String,
    pub player_identity_token: Option<String>,
    pub deployments: Vec<DeploymentInfo>,
    pub selected_deployment: Option<String>,
    pub session: Option<SessionHandle>,
}

/// What the flow does once the deployment listing has arrived. Call sites
/// differ: a connect button wants to join immediately, a browser screen
/// only wants the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterDiscovery {
    /// Continue into `Connect` with the selected (or first joinable)
    /// deployment.
    AutoConnect,
    /// Store the listing and return to `Start`.
    Idle,
}

enum SessionState {
    Start,
    Cooldown {
        until: Instant,
    },
    GetPlayerIdentityToken {
        next: AfterDiscovery,
        request: Pending<ServiceResult<String>>,
    },
    GetDeployments {
        next: AfterDiscovery,
        request: Pending<ServiceResult<Vec<DeploymentInfo>>>,
    },
    Connect {
        deployment_name: String,
        request: Pending<ServiceResult<SessionHandle>>,
    },
    Spawn {
        request: Pending<ServiceResult<()>>,
    },
    Established,
}

/// Observable phase of the machine, for drivers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Start,
    Cooldown,
    GetPlayerIdentityToken,
    GetDeployments,
    Connect,
    Spawn,
    Established,
}

pub struct ConnectionStateMachine<S: SessionService> {
    service: S,
    blackboard: Blackboard,
    state: SessionState,
    cooldown: Duration,
    sink: Box<dyn StatusSink>,
}

impl<S: SessionService> ConnectionStateMachine<S> {
    pub fn new(service: S, blackboard: Blackboard, sink: Box<dyn StatusSink>) -> Self {
        Self {
            service,
            blackboard,
            state: SessionState::Start,
            cooldown: DEFAULT_COOLDOWN,
            sink,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn phase(&self) -> SessionPhase {
        match &self.state {
            SessionState::Start => SessionPhase::Start,
            SessionState::Cooldown { .. } => SessionPhase::Cooldown,
            SessionState::GetPlayerIdentityToken { .. } => SessionPhase::GetPlayerIdentityToken,
            SessionState::GetDeployments { .. } => SessionPhase::GetDeployments,
            SessionState::Connect { .. } => SessionPhase::Connect,
            SessionState::Spawn { .. } => SessionPhase::Spawn,
            SessionState::Established => SessionPhase::Established,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(self.state, SessionState::Established)
    }

    /// Begins the flow by issuing the token request. Only valid from
    /// `Start`; returns false (and does nothing) from any other phase.
    pub fn try_connect(&mut self, next: AfterDiscovery) -> bool {
        if !matches!(self.state, SessionState::Start) {
            return false;
        }

        let request = self.service.request_player_identity_token(&TokenRequest {
            dev_auth_token: self.blackboard.dev_auth_token.clone(),
            player_id: self.blackboard.player_id.clone(),
            display_name: self.blackboard.display_name.clone(),
        });
        self.state = SessionState::GetPlayerIdentityToken { next, request };
        true
    }

    /// Forced abort: exits the live state, releasing its request handle,
    /// before `Start` becomes active. No cooldown applies.
    pub fn reset(&mut self) {
        let state = std::mem::replace(&mut self.state, SessionState::Start);
        exit_state(state);
        self.blackboard.session = None;
    }

    /// Advances the machine by one tick: polls the live state's request at
    /// most once and takes at most one transition.
    pub fn tick(&mut self, now: Instant) {
        let state = std::mem::replace(&mut self.state, SessionState::Start);
        self.state = self.step(state, now);
    }

    fn step(&mut self, state: SessionState, now: Instant) -> SessionState {
        match state {
            SessionState::Start => SessionState::Start,
            SessionState::Established => SessionState::Established,

            SessionState::Cooldown { until } => {
                if now >= until {
                    SessionState::Start
                } else {
                    SessionState::Cooldown { until }
                }
            }

            SessionState::GetPlayerIdentityToken { next, mut request } => {
                let Some(result) = request.try_take() else {
                    return SessionState::GetPlayerIdentityToken { next, request };
                };
                request.release();

                // The payload is only read out of a confirmed success.
                match result {
                    Err(err) => self.fail(
                        now,
                        &format!("Failed to retrieve player identity token.\n Error code: {}", err),
                    ),
                    Ok(token) => {
                        self.blackboard.player_identity_token = Some(token.clone());
                        let request = self.service.list_deployments(&token);
                        SessionState::GetDeployments { next, request }
                    }
                }
            }

            SessionState::GetDeployments { next, mut request } => {
                let Some(result) = request.try_take() else {
                    return SessionState::GetDeployments { next, request };
                };
                request.release();

                match result {
                    Err(err) => self.fail(
                        now,
                        &format!("Failed to retrieve deployments.\n Error code: {}", err),
                    ),
                    Ok(deployments) => {
                        self.blackboard.deployments = deployments;
                        match next {
                            AfterDiscovery::Idle => SessionState::Start,
                            AfterDiscovery::AutoConnect => match self.pick_deployment() {
                                None => self.fail(now, "No joinable deployment available."),
                                Some(deployment_name) => {
                                    let token = self
                                        .blackboard
                                        .player_identity_token
                                        .clone()
                                        .unwrap_or_default();
                                    let request = self.service.connect(&deployment_name, &token);
                                    SessionState::Connect {
                                        deployment_name,
                                        request,
                                    }
                                }
                            },
                        }
                    }
                }
            }

            SessionState::Connect {
                deployment_name,
                mut request,
            } => {
                let Some(result) = request.try_take() else {
                    return SessionState::Connect {
                        deployment_name,
                        request,
                    };
                };
                request.release();

                match result {
                    Err(err) => self.fail(
                        now,
                        &format!("Failed to connect to '{}'.\n Error code: {}", deployment_name, err),
                    ),
                    Ok(session) => {
                        let request = self.service.spawn_player(&session);
                        self.blackboard.session = Some(session);
                        SessionState::Spawn { request }
                    }
                }
            }

            SessionState::Spawn { mut request } => {
                let Some(result) = request.try_take() else {
                    return SessionState::Spawn { request };
                };
                request.release();

                match result {
                    Err(err) => {
                        self.blackboard.session = None;
                        self.fail(now, &format!("Failed to spawn player.\n Error code: {}", err))
                    }
                    Ok(()) => {
                        self.sink.report("Connected.", Severity::Info);
                        SessionState::Established
                    }
                }
            }
        }
    }

    /// Uniform failure policy: report, then hold in cooldown until `Start`
    /// becomes active again.
    fn fail(&mut self, now: Instant, message: &str) -> SessionState {
        warn!("{}", message);
        self.sink.report(message, Severity::Error);
        SessionState::Cooldown {
            until: now + self.cooldown,
        }
    }

    /// The deployment to join: the explicitly selected one if it is in the
    /// listing, otherwise the first joinable entry.
    fn pick_deployment(&self) -> Option<String> {
        if let Some(selected) = &self.blackboard.selected_deployment {
            return self
                .blackboard
                .deployments
                .iter()
                .find(|info| &info.name == selected)
                .map(|info| info.name.clone());
        }

        self.blackboard
            .deployments
            .iter()
            .find(|info| info.is_joinable())
            .map(|info| info.name.clone())
    }
}

/// Releases whatever handle the departing state still owns. Every path out
/// of a state funnels through here or through the inline release in
/// `step`.
fn exit_state(state: SessionState) {
    match state {
        SessionState::GetPlayerIdentityToken { mut request, .. } => request.release(),
        SessionState::GetDeployments { mut request, .. } => request.release(),
        SessionState::Connect { mut request, .. } => request.release(),
        SessionState::Spawn { mut request, .. } => request.release(),
        SessionState::Start | SessionState::Cooldown { .. } | SessionState::Established => {}
    }
}

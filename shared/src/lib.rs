pub mod pending;
pub mod status;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Cloud region a deployment runs in. The lowercase form is what the cloud
/// CLI and the gateway wire format use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentRegion {
    #[default]
    Us,
    Eu,
    Ap,
    Cn,
}

impl DeploymentRegion {
    pub const ALL: [DeploymentRegion; 4] = [
        DeploymentRegion::Us,
        DeploymentRegion::Eu,
        DeploymentRegion::Ap,
        DeploymentRegion::Cn,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentRegion::Us => "us",
            DeploymentRegion::Eu => "eu",
            DeploymentRegion::Ap => "ap",
            DeploymentRegion::Cn => "cn",
        }
    }
}

impl fmt::Display for DeploymentRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeploymentRegion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "us" => Ok(DeploymentRegion::Us),
            "eu" => Ok(DeploymentRegion::Eu),
            "ap" => Ok(DeploymentRegion::Ap),
            "cn" => Ok(DeploymentRegion::Cn),
            other => Err(format!("unknown region '{}'", other)),
        }
    }
}

/// Lifecycle state of a live deployment as reported by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DeploymentStatus {
    Starting,
    #[default]
    Running,
    Stopping,
    Error,
}

/// A live deployment as seen by the discovery listing. This is the read-side
/// view; the launcher's editable configuration types live in the launcher
/// crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentInfo {
    pub name: String,
    pub region: DeploymentRegion,
    pub tags: Vec<String>,
    pub status: DeploymentStatus,
    pub players: u32,
    pub max_players: u32,
}

impl DeploymentInfo {
    /// A deployment accepts new sessions only while running and below
    /// capacity.
    pub fn is_joinable(&self) -> bool {
        self.status == DeploymentStatus::Running && self.players < self.max_players
    }
}

/// Error classification shared between the gateway wire format and the
/// client-side service contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    CapacityReached,
    Timeout,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::Unauthorized => "unauthorized",
            ErrorCode::NotFound => "not found",
            ErrorCode::CapacityReached => "capacity reached",
            ErrorCode::Timeout => "timeout",
            ErrorCode::Internal => "internal error",
        };
        f.write_str(text)
    }
}

/// Requests a client sends to the session gateway.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum GatewayRequest {
    PlayerIdentityToken {
        dev_auth_token: String,
        player_id: String,
        display_name: String,
    },
    ListDeployments {
        player_identity_token: String,
    },
    Connect {
        deployment_name: String,
        player_identity_token: String,
    },
    SpawnPlayer {
        session_token: String,
    },
}

/// Responses the session gateway sends back. `Error` carries a code plus a
/// human-readable detail for the status display.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum GatewayResponse {
    PlayerIdentityToken {
        player_identity_token: String,
    },
    Deployments {
        deployments: Vec<DeploymentInfo>,
    },
    Connected {
        session_token: String,
        host: String,
        port: u16,
    },
    PlayerSpawned,
    Error {
        code: ErrorCode,
        detail: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_parse_roundtrip() {
        for region in DeploymentRegion::ALL {
            let parsed: DeploymentRegion = region.as_str().parse().unwrap();
            assert_eq!(parsed, region);
        }

        assert!("mars".parse::<DeploymentRegion>().is_err());
        assert_eq!("EU".parse::<DeploymentRegion>().unwrap(), DeploymentRegion::Eu);
    }

    #[test]
    fn test_deployment_joinable() {
        let mut info = DeploymentInfo {
            name: "prod_game".to_string(),
            region: DeploymentRegion::Eu,
            tags: vec!["dev_login".to_string()],
            status: DeploymentStatus::Running,
            players: 10,
            max_players: 100,
        };

        assert!(info.is_joinable());

        info.players = 100;
        assert!(!info.is_joinable());

        info.players = 10;
        info.status = DeploymentStatus::Starting;
        assert!(!info.is_joinable());
    }

    #[test]
    fn test_gateway_request_roundtrip() {
        let request = GatewayRequest::PlayerIdentityToken {
            dev_auth_token: "dat_123".to_string(),
            player_id: "player_1".to_string(),
            display_name: "Player One".to_string(),
        };

        let bytes = bincode::serialize(&request).unwrap();
        let decoded: GatewayRequest = bincode::deserialize(&bytes).unwrap();

        match decoded {
            GatewayRequest::PlayerIdentityToken {
                dev_auth_token,
                player_id,
                display_name,
            } => {
                assert_eq!(dev_auth_token, "dat_123");
                assert_eq!(player_id, "player_1");
                assert_eq!(display_name, "Player One");
            }
            _ => panic!("Wrong request type after deserialization"),
        }
    }

    #[test]
    fn test_gateway_error_roundtrip() {
        let response = GatewayResponse::Error {
            code: ErrorCode::CapacityReached,
            detail: "deployment is full".to_string(),
        };

        let bytes = bincode::serialize(&response).unwrap();
        let decoded: GatewayResponse = bincode::deserialize(&bytes).unwrap();

        match decoded {
            GatewayResponse::Error { code, detail } => {
                assert_eq!(code, ErrorCode::CapacityReached);
                assert_eq!(detail, "deployment is full");
            }
            _ => panic!("Wrong response type after deserialization"),
        }
    }
}

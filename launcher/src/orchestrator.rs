//! Binding between validated configuration and command invocations
//!
//! The orchestrator turns a launcher action into a [`CommandTask`] against
//! the cloud CLI. An action whose configuration fails validation is refused
//! locally; no task is created and the errors are returned to the caller.
//! Every task carries a deep copy of the configuration it was built from.

use crate::command::{CommandInvocation, CommandTask, OutputCapture};
use crate::config::{AssemblyConfig, DeploymentConfig, SimulatedPlayerDeploymentConfig};
use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Location of the external cloud CLI and the project directory it runs in.
#[derive(Debug, Clone)]
pub struct CloudCli {
    pub executable: String,
    pub project_root: PathBuf,
}

impl CloudCli {
    pub fn new(executable: &str, project_root: PathBuf) -> Self {
        Self {
            executable: executable.to_string(),
            project_root,
        }
    }
}

/// An action was refused because its configuration has validation errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationFailed(pub Vec<String>);

impl fmt::Display for ValidationFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration has errors: {}", self.0.join("; "))
    }
}

impl Error for ValidationFailed {}

/// Dispatches launcher actions for one project.
#[derive(Debug)]
pub struct Orchestrator {
    project_name: String,
    cli: CloudCli,
}

impl Orchestrator {
    pub fn new(project_name: &str, cli: CloudCli) -> Self {
        Self {
            project_name: project_name.to_string(),
            cli,
        }
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Uploads the assembly. The returned task's context is a snapshot of
    /// the assembly config at dispatch time.
    pub fn upload_assembly(
        &self,
        config: &AssemblyConfig,
    ) -> Result<CommandTask<AssemblyConfig>, ValidationFailed> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ValidationFailed(errors));
        }

        let args = self.upload_args(config);
        Ok(CommandTask::spawn(self.invocation(args), config.deep_copy()))
    }

    /// Launches the primary deployment of `config`.
    pub fn launch_deployment(
        &self,
        config: &DeploymentConfig,
    ) -> Result<CommandTask<DeploymentConfig>, ValidationFailed> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ValidationFailed(errors));
        }

        let args = self.launch_args(config);
        Ok(CommandTask::spawn(self.invocation(args), config.deep_copy()))
    }

    /// Launches every simulated-player deployment of `config`, one task per
    /// entry, each bound to a snapshot of its own entry.
    pub fn launch_simulated_players(
        &self,
        config: &DeploymentConfig,
    ) -> Result<Vec<CommandTask<SimulatedPlayerDeploymentConfig>>, ValidationFailed> {
        let errors = config.validate();
        if !errors.is_empty() {
            return Err(ValidationFailed(errors));
        }

        let tasks = config
            .simulated_players
            .iter()
            .map(|entry| {
                let args = self.simulated_launch_args(config, entry);
                CommandTask::spawn(self.invocation(args), entry.clone())
            })
            .collect();
        Ok(tasks)
    }

    /// Stops a running deployment by name. The context is the deployment
    /// name itself.
    pub fn stop_deployment(&self, name: &str) -> Result<CommandTask<String>, ValidationFailed> {
        if name.is_empty() {
            return Err(ValidationFailed(vec![
                "cannot stop a deployment without a name".to_string(),
            ]));
        }

        let args = vec![
            "cloud".to_string(),
            "delete".to_string(),
            name.to_string(),
            "--project_name".to_string(),
            self.project_name.clone(),
            "--json_output".to_string(),
        ];
        Ok(CommandTask::spawn(self.invocation(args), name.to_string()))
    }

    /// Lists the project's live deployments. The captured stdout carries
    /// the CLI's JSON listing.
    pub fn list_deployments(&self) -> CommandTask<String> {
        let args = vec![
            "cloud".to_string(),
            "list".to_string(),
            "--project_name".to_string(),
            self.project_name.clone(),
            "--json_output".to_string(),
        ];
        CommandTask::spawn(self.invocation(args), self.project_name.clone())
    }

    fn invocation(&self, args: Vec<String>) -> CommandInvocation {
        CommandInvocation {
            program: self.cli.executable.clone(),
            working_dir: self.cli.project_root.clone(),
            args,
            capture: OutputCapture::both(),
        }
    }

    fn upload_args(&self, config: &AssemblyConfig) -> Vec<String> {
        let mut args = vec![
            "cloud".to_string(),
            "upload".to_string(),
            config.assembly_name.clone(),
            "--project_name".to_string(),
            self.project_name.clone(),
            "--json_output".to_string(),
        ];

        if config.force_upload {
            args.push("--force".to_string());
        }

        args
    }

    fn launch_args(&self, config: &DeploymentConfig) -> Vec<String> {
        let deployment = &config.deployment;
        let mut args = vec![
            "cloud".to_string(),
            "launch".to_string(),
            config.assembly_name.clone(),
            deployment.launch_config_path.clone(),
            deployment.name.clone(),
            "--snapshot".to_string(),
            deployment.snapshot_path.clone(),
            "--cluster_region".to_string(),
            deployment.region.to_string(),
        ];

        if !deployment.tags.is_empty() {
            args.push("--tags".to_string());
            args.push(deployment.tags.join(","));
        }

        args.push("--project_name".to_string());
        args.push(self.project_name.clone());
        args.push("--json_output".to_string());
        args
    }

    fn simulated_launch_args(
        &self,
        config: &DeploymentConfig,
        entry: &SimulatedPlayerDeploymentConfig,
    ) -> Vec<String> {
        let mut args = vec![
            "cloud".to_string(),
            "launch".to_string(),
            config.assembly_name.clone(),
            entry.base.launch_config_path.clone(),
            entry.base.name.clone(),
            "--snapshot".to_string(),
            entry.base.snapshot_path.clone(),
            "--cluster_region".to_string(),
            entry.base.region.to_string(),
            "--target_deployment".to_string(),
            entry.target_deployment_name.clone(),
        ];

        if !entry.base.tags.is_empty() {
            args.push("--tags".to_string());
            args.push(entry.base.tags.join(","));
        }

        args.push("--project_name".to_string());
        args.push(self.project_name.clone());
        args.push("--json_output".to_string());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandOutcome;
    use shared::DeploymentRegion;
    use std::time::Duration;

    fn test_cli() -> CloudCli {
        // Tests never want to reach a real CLI; `true` exits 0 and ignores
        // its arguments.
        CloudCli::new("true", std::env::temp_dir())
    }

    fn launchable_config() -> DeploymentConfig {
        let mut config = DeploymentConfig {
            assembly_name: "game_build_1".to_string(),
            ..DeploymentConfig::default()
        };
        config.deployment.name = "prod_game".to_string();
        config.deployment.snapshot_path = "snapshots/default.snapshot".to_string();
        config.deployment.launch_config_path = "configs/launch.json".to_string();
        config.deployment.region = DeploymentRegion::Eu;
        config
    }

    async fn wait_done<C>(task: &mut CommandTask<C>) -> CommandOutcome {
        for _ in 0..500 {
            if let Some(outcome) = task.try_result() {
                return outcome.clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("task did not finish");
    }

    #[tokio::test]
    async fn test_invalid_config_creates_no_task() {
        let orchestrator = Orchestrator::new("my_project", test_cli());
        let mut config = launchable_config();
        config.deployment.name = String::new();

        let result = orchestrator.launch_deployment(&config);
        match result {
            Err(ValidationFailed(errors)) => {
                assert!(!errors.is_empty());
            }
            Ok(_) => panic!("expected validation failure"),
        }
    }

    #[tokio::test]
    async fn test_launch_task_carries_config_snapshot() {
        let orchestrator = Orchestrator::new("my_project", test_cli());
        let mut config = launchable_config();

        let mut task = orchestrator.launch_deployment(&config).unwrap();

        // Editing the live config after dispatch must not affect the task's
        // context.
        config.deployment.name = "edited_later".to_string();

        assert_eq!(task.context().deployment.name, "prod_game");
        let outcome = wait_done(&mut task).await;
        assert!(matches!(outcome, CommandOutcome::Finished(_)));
        assert_eq!(task.context().deployment.name, "prod_game");
    }

    #[tokio::test]
    async fn test_upload_args_include_force_flag() {
        let orchestrator = Orchestrator::new("my_project", test_cli());

        let config = AssemblyConfig {
            assembly_name: "game_build_1".to_string(),
            force_upload: true,
        };
        let args = orchestrator.upload_args(&config);
        assert_eq!(
            args,
            vec![
                "cloud",
                "upload",
                "game_build_1",
                "--project_name",
                "my_project",
                "--json_output",
                "--force",
            ]
        );

        let plain = AssemblyConfig {
            assembly_name: "game_build_1".to_string(),
            force_upload: false,
        };
        assert!(!orchestrator.upload_args(&plain).contains(&"--force".to_string()));
    }

    #[tokio::test]
    async fn test_launch_args_layout() {
        let orchestrator = Orchestrator::new("my_project", test_cli());
        let mut config = launchable_config();
        config.deployment.tags = vec!["dev_login".to_string(), "eu_players".to_string()];

        let args = orchestrator.launch_args(&config);
        assert_eq!(
            args,
            vec![
                "cloud",
                "launch",
                "game_build_1",
                "configs/launch.json",
                "prod_game",
                "--snapshot",
                "snapshots/default.snapshot",
                "--cluster_region",
                "eu",
                "--tags",
                "dev_login,eu_players",
                "--project_name",
                "my_project",
                "--json_output",
            ]
        );
    }

    #[tokio::test]
    async fn test_simulated_launch_targets_primary() {
        let orchestrator = Orchestrator::new("my_project", test_cli());
        let mut config = launchable_config();
        config.add_simulated_player();
        config.simulated_players[0].base.snapshot_path = "snapshots/sim.snapshot".to_string();
        config.simulated_players[0].base.launch_config_path = "configs/sim.json".to_string();

        let args = orchestrator.simulated_launch_args(&config, &config.simulated_players[0]);
        assert!(args.contains(&"prod_game_sim1".to_string()));
        assert!(args.contains(&"--target_deployment".to_string()));
        assert!(args.contains(&"prod_game".to_string()));

        let tasks = orchestrator.launch_simulated_players(&config).unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].context().base.name, "prod_game_sim1");
    }

    #[tokio::test]
    async fn test_stop_requires_name() {
        let orchestrator = Orchestrator::new("my_project", test_cli());
        assert!(orchestrator.stop_deployment("").is_err());

        let mut task = orchestrator.stop_deployment("prod_game").unwrap();
        assert_eq!(task.context(), "prod_game");
        let _ = wait_done(&mut task).await;
    }

    #[tokio::test]
    async fn test_list_runs_to_completion() {
        let orchestrator = Orchestrator::new("my_project", test_cli());
        let mut task = orchestrator.list_deployments();
        let outcome = wait_done(&mut task).await;
        match outcome {
            CommandOutcome::Finished(result) => assert!(result.success()),
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}

//! Deployment configuration model
//!
//! This module holds the editable configuration a launcher session works
//! with: one assembly upload config plus an ordered list of deployment
//! configs, each owning its simulated-player sub-deployments. Editing
//! always goes through a deep copy that replaces the original only when the
//! edit commits, so a half-finished edit can be discarded without touching
//! the committed state. Validation never blocks editing; it only blocks
//! launching.

use serde::{Deserialize, Serialize};
use shared::DeploymentRegion;
use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

/// Fields shared by a primary deployment and its simulated-player
/// deployments. `name` is the identity key within a launcher session.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct BaseDeploymentConfig {
    pub name: String,
    pub snapshot_path: String,
    pub launch_config_path: String,
    pub region: DeploymentRegion,
    pub tags: Vec<String>,
}

impl BaseDeploymentConfig {
    /// Removes empty and duplicate tags, keeping first-occurrence order.
    /// Applied whenever an edit commits.
    pub fn prune_tags(&mut self) {
        let mut seen = Vec::new();
        self.tags.retain(|tag| {
            if tag.is_empty() || seen.contains(tag) {
                return false;
            }
            seen.push(tag.clone());
            true
        });
    }

    fn collect_errors(&self, label: &str, errors: &mut Vec<String>) {
        if self.name.is_empty() {
            errors.push(format!("{} has no name", label));
        } else if !is_valid_deployment_name(&self.name) {
            errors.push(format!(
                "{} name '{}' must be 2-32 lowercase alphanumeric or underscore characters",
                label, self.name
            ));
        }

        if self.snapshot_path.is_empty() {
            errors.push(format!("{} has no snapshot path", label));
        }

        if self.launch_config_path.is_empty() {
            errors.push(format!("{} has no launch config path", label));
        }
    }
}

/// A load-generating deployment targeting the primary deployment. Its name
/// and target are derived, never edited directly.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SimulatedPlayerDeploymentConfig {
    pub base: BaseDeploymentConfig,
    pub target_deployment_name: String,
}

/// A primary deployment plus its simulated-player sub-deployments and the
/// assembly it launches from.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DeploymentConfig {
    pub assembly_name: String,
    pub deployment: BaseDeploymentConfig,
    pub simulated_players: Vec<SimulatedPlayerDeploymentConfig>,
}

impl DeploymentConfig {
    /// Full, independent copy. Cannot fail and shares no mutable state with
    /// the original; the copy-before-edit protocol relies on both.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Renames the primary deployment and re-derives every simulated-player
    /// entry from the new name.
    pub fn set_primary_name(&mut self, name: &str) {
        self.deployment.name = name.to_string();
        self.derive_simulated_names();
    }

    /// Appends a simulated-player entry already carrying its derived name
    /// and target.
    pub fn add_simulated_player(&mut self) -> &SimulatedPlayerDeploymentConfig {
        let index = self.simulated_players.len();
        let mut entry = SimulatedPlayerDeploymentConfig::default();
        entry.base.name = format!("{}_sim{}", self.deployment.name, index + 1);
        entry.base.region = self.deployment.region;
        entry.target_deployment_name = self.deployment.name.clone();

        self.simulated_players.push(entry);
        &self.simulated_players[index]
    }

    /// Removes the simulated-player entry at `index` and re-indexes the
    /// remaining entries contiguously. Returns false if the index is out of
    /// range.
    pub fn remove_simulated_player(&mut self, index: usize) -> bool {
        if index >= self.simulated_players.len() {
            return false;
        }

        self.simulated_players.remove(index);
        self.derive_simulated_names();
        true
    }

    /// Re-applies the naming rule to every simulated-player entry:
    /// `{primary}_sim{index+1}` with the target pointing at the primary.
    /// Pure re-indexing; called from the two structural mutation sites
    /// (primary rename, entry removal).
    pub fn derive_simulated_names(&mut self) {
        for (index, entry) in self.simulated_players.iter_mut().enumerate() {
            entry.base.name = format!("{}_sim{}", self.deployment.name, index + 1);
            entry.target_deployment_name = self.deployment.name.clone();
        }
    }

    /// Collects human-readable configuration errors. Never fails; an empty
    /// result means the config is launchable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.assembly_name.is_empty() {
            errors.push("deployment has no assembly name".to_string());
        } else if !is_valid_assembly_name(&self.assembly_name) {
            errors.push(format!(
                "assembly name '{}' must be 5-64 alphanumeric, underscore, dot or dash characters",
                self.assembly_name
            ));
        }

        self.deployment.collect_errors("deployment", &mut errors);

        let mut names = vec![self.deployment.name.clone()];
        for (index, entry) in self.simulated_players.iter().enumerate() {
            let label = format!("simulated player deployment {}", index + 1);
            entry.base.collect_errors(&label, &mut errors);

            if entry.target_deployment_name != self.deployment.name {
                errors.push(format!("{} does not target the primary deployment", label));
            }

            if names.contains(&entry.base.name) {
                errors.push(format!("{} duplicates name '{}'", label, entry.base.name));
            }
            names.push(entry.base.name.clone());
        }

        errors
    }
}

/// Assembly upload settings. One instance per launcher session, replaced
/// whole when an edit commits.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AssemblyConfig {
    pub assembly_name: String,
    pub force_upload: bool,
}

impl AssemblyConfig {
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.assembly_name.is_empty() {
            errors.push("assembly has no name".to_string());
        } else if !is_valid_assembly_name(&self.assembly_name) {
            errors.push(format!(
                "assembly name '{}' must be 5-64 alphanumeric, underscore, dot or dash characters",
                self.assembly_name
            ));
        }

        errors
    }
}

/// Everything a launcher session persists for one project.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LauncherConfig {
    pub assembly: AssemblyConfig,
    pub deployments: Vec<DeploymentConfig>,
}

/// On-disk format: project name to launcher config, ordered for stable
/// output.
pub type ProjectConfigs = BTreeMap<String, LauncherConfig>;

/// Loads the persisted configuration map. A missing file is an empty map,
/// not an error; the launcher creates it on first save.
pub fn load_configs(path: &Path) -> Result<ProjectConfigs, Box<dyn Error>> {
    if !path.exists() {
        return Ok(ProjectConfigs::new());
    }

    let text = fs::read_to_string(path)?;
    let configs = serde_json::from_str(&text)?;
    Ok(configs)
}

pub fn save_configs(path: &Path, configs: &ProjectConfigs) -> Result<(), Box<dyn Error>> {
    let text = serde_json::to_string_pretty(configs)?;
    fs::write(path, text)?;
    Ok(())
}

/// Exclusive owner of one project's configuration for the lifetime of a
/// launcher session.
///
/// All mutation goes through the edit methods, which clone the current
/// value, hand the clone to the caller's closure, and commit it only when
/// the closure returns true. A cancelled edit leaves the committed state
/// untouched.
#[derive(Debug)]
pub struct LauncherSession {
    project_name: String,
    config: LauncherConfig,
}

impl LauncherSession {
    pub fn new(project_name: &str, config: LauncherConfig) -> Self {
        Self {
            project_name: project_name.to_string(),
            config,
        }
    }

    /// Opens the session for one project out of the persisted map, starting
    /// from defaults when the project has no saved entry yet.
    pub fn load(path: &Path, project_name: &str) -> Result<Self, Box<dyn Error>> {
        let mut configs = load_configs(path)?;
        let config = configs.remove(project_name).unwrap_or_default();
        Ok(Self::new(project_name, config))
    }

    /// Writes this session's config back into the persisted map.
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn Error>> {
        let mut configs = load_configs(path)?;
        configs.insert(self.project_name.clone(), self.config.clone());
        save_configs(path, &configs)
    }

    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    pub fn assembly(&self) -> &AssemblyConfig {
        &self.config.assembly
    }

    pub fn deployments(&self) -> &[DeploymentConfig] {
        &self.config.deployments
    }

    /// Deployment name is the identity key within a session.
    pub fn find_deployment(&self, name: &str) -> Option<&DeploymentConfig> {
        self.config
            .deployments
            .iter()
            .find(|config| config.deployment.name == name)
    }

    /// Edits the assembly config through a deep copy; commits the copy only
    /// if the closure returns true.
    pub fn edit_assembly<F>(&mut self, edit: F) -> bool
    where
        F: FnOnce(&mut AssemblyConfig) -> bool,
    {
        let mut copy = self.config.assembly.deep_copy();
        if !edit(&mut copy) {
            return false;
        }

        self.config.assembly = copy;
        true
    }

    /// Edits the deployment config at `index` through a deep copy. On
    /// commit, tags are pruned and, if the edit renamed the primary
    /// deployment, the simulated names are re-derived.
    pub fn edit_deployment<F>(&mut self, index: usize, edit: F) -> bool
    where
        F: FnOnce(&mut DeploymentConfig) -> bool,
    {
        let Some(current) = self.config.deployments.get(index) else {
            return false;
        };

        let previous_name = current.deployment.name.clone();
        let mut copy = current.deep_copy();
        if !edit(&mut copy) {
            return false;
        }

        copy.deployment.prune_tags();
        for entry in &mut copy.simulated_players {
            entry.base.prune_tags();
        }

        if copy.deployment.name != previous_name {
            copy.derive_simulated_names();
        }

        self.config.deployments[index] = copy;
        true
    }

    /// Appends a new deployment config seeded with a positional name and
    /// the session's assembly name.
    pub fn add_deployment(&mut self) -> &DeploymentConfig {
        let index = self.config.deployments.len();
        let mut config = DeploymentConfig {
            assembly_name: self.config.assembly.assembly_name.clone(),
            ..DeploymentConfig::default()
        };
        config.deployment.name = format!("deployment_{}", index);

        self.config.deployments.push(config);
        &self.config.deployments[index]
    }

    pub fn remove_deployment(&mut self, index: usize) -> bool {
        if index >= self.config.deployments.len() {
            return false;
        }

        self.config.deployments.remove(index);
        true
    }

    /// Stamps the session assembly name onto every deployment config.
    pub fn copy_assembly_to_deployments(&mut self) {
        let assembly_name = self.config.assembly.assembly_name.clone();
        for config in &mut self.config.deployments {
            config.assembly_name = assembly_name.clone();
        }
    }
}

fn is_valid_deployment_name(name: &str) -> bool {
    (2..=32).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn is_valid_assembly_name(name: &str) -> bool {
    (5..=64).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn launchable_config(name: &str) -> DeploymentConfig {
        let mut config = DeploymentConfig {
            assembly_name: "game_build_1".to_string(),
            ..DeploymentConfig::default()
        };
        config.deployment.name = name.to_string();
        config.deployment.snapshot_path = "snapshots/default.snapshot".to_string();
        config.deployment.launch_config_path = "configs/launch.json".to_string();
        config
    }

    fn fill_simulated_paths(config: &mut DeploymentConfig) {
        for entry in &mut config.simulated_players {
            entry.base.snapshot_path = "snapshots/default.snapshot".to_string();
            entry.base.launch_config_path = "configs/sim_launch.json".to_string();
        }
    }

    #[test]
    fn test_deep_copy_does_not_alias() {
        let mut original = launchable_config("prod_game");
        original.deployment.tags.push("dev_login".to_string());
        original.add_simulated_player();

        let mut copy = original.deep_copy();
        copy.deployment.name = "other_name".to_string();
        copy.deployment.tags.push("extra".to_string());
        copy.simulated_players[0].base.name = "mangled".to_string();

        assert_eq!(original.deployment.name, "prod_game");
        assert_eq!(original.deployment.tags, vec!["dev_login".to_string()]);
        assert_eq!(original.simulated_players[0].base.name, "prod_game_sim1");
    }

    #[test]
    fn test_rename_cascades_to_simulated_players() {
        let mut config = launchable_config("prod_game");
        config.add_simulated_player();
        config.add_simulated_player();
        config.add_simulated_player();

        config.set_primary_name("staging_game");

        for (index, entry) in config.simulated_players.iter().enumerate() {
            assert_eq!(entry.base.name, format!("staging_game_sim{}", index + 1));
            assert_eq!(entry.target_deployment_name, "staging_game");
        }
    }

    #[test]
    fn test_remove_simulated_player_reindexes() {
        let mut config = launchable_config("prod_game");
        config.add_simulated_player();
        config.add_simulated_player();
        config.add_simulated_player();

        assert!(config.remove_simulated_player(1));

        assert_eq!(config.simulated_players.len(), 2);
        assert_eq!(config.simulated_players[0].base.name, "prod_game_sim1");
        assert_eq!(config.simulated_players[1].base.name, "prod_game_sim2");

        assert!(!config.remove_simulated_player(5));
    }

    #[test]
    fn test_validate_empty_name() {
        let mut config = launchable_config("prod_game");
        config.deployment.name = String::new();

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("no name")));
    }

    #[test]
    fn test_validate_bad_charset() {
        let mut config = launchable_config("Prod-Game");
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("lowercase")));

        config.deployment.name = "x".to_string();
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_validate_complete_config_passes() {
        let mut config = launchable_config("prod_game");
        config.add_simulated_player();
        fill_simulated_paths(&mut config);

        assert_eq!(config.validate(), Vec::<String>::new());
    }

    #[test]
    fn test_validate_missing_paths() {
        let mut config = launchable_config("prod_game");
        config.deployment.snapshot_path = String::new();
        config.deployment.launch_config_path = String::new();

        let errors = config.validate();
        assert!(errors.iter().any(|e| e.contains("snapshot path")));
        assert!(errors.iter().any(|e| e.contains("launch config path")));
    }

    #[test]
    fn test_validate_assembly_name() {
        let mut assembly = AssemblyConfig {
            assembly_name: "game_build_0806".to_string(),
            force_upload: false,
        };
        assert!(assembly.validate().is_empty());

        assembly.assembly_name = "ab".to_string();
        assert!(!assembly.validate().is_empty());

        assembly.assembly_name = "bad name!".to_string();
        assert!(!assembly.validate().is_empty());

        assembly.assembly_name = String::new();
        assert!(assembly
            .validate()
            .iter()
            .any(|e| e.contains("no name")));
    }

    #[test]
    fn test_prune_tags() {
        let mut base = BaseDeploymentConfig {
            tags: vec![
                "dev_login".to_string(),
                String::new(),
                "dev_login".to_string(),
                "eu_players".to_string(),
            ],
            ..BaseDeploymentConfig::default()
        };

        base.prune_tags();

        assert_eq!(
            base.tags,
            vec!["dev_login".to_string(), "eu_players".to_string()]
        );
    }

    #[test]
    fn test_edit_commit_replaces_value() {
        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.add_deployment();

        let committed = session.edit_deployment(0, |config| {
            config.deployment.snapshot_path = "snapshots/a.snapshot".to_string();
            true
        });

        assert!(committed);
        assert_eq!(
            session.deployments()[0].deployment.snapshot_path,
            "snapshots/a.snapshot"
        );
    }

    #[test]
    fn test_edit_cancel_discards_copy() {
        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.add_deployment();

        let committed = session.edit_deployment(0, |config| {
            config.deployment.name = "discarded".to_string();
            false
        });

        assert!(!committed);
        assert_eq!(session.deployments()[0].deployment.name, "deployment_0");
    }

    #[test]
    fn test_edit_rename_rederives_simulated_names() {
        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.add_deployment();
        session.edit_deployment(0, |config| {
            config.add_simulated_player();
            config.add_simulated_player();
            true
        });

        session.edit_deployment(0, |config| {
            config.deployment.name = "renamed_game".to_string();
            true
        });

        let config = &session.deployments()[0];
        assert_eq!(config.simulated_players[0].base.name, "renamed_game_sim1");
        assert_eq!(config.simulated_players[1].base.name, "renamed_game_sim2");
        assert_eq!(
            config.simulated_players[1].target_deployment_name,
            "renamed_game"
        );
    }

    #[test]
    fn test_edit_commit_prunes_tags() {
        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.add_deployment();

        session.edit_deployment(0, |config| {
            config.deployment.tags = vec![
                "one".to_string(),
                String::new(),
                "one".to_string(),
            ];
            true
        });

        assert_eq!(
            session.deployments()[0].deployment.tags,
            vec!["one".to_string()]
        );
    }

    #[test]
    fn test_add_deployment_seeds_names() {
        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.edit_assembly(|assembly| {
            assembly.assembly_name = "game_build_1".to_string();
            true
        });

        session.add_deployment();
        session.add_deployment();

        assert_eq!(session.deployments()[0].deployment.name, "deployment_0");
        assert_eq!(session.deployments()[1].deployment.name, "deployment_1");
        assert_eq!(session.deployments()[1].assembly_name, "game_build_1");
    }

    #[test]
    fn test_copy_assembly_to_deployments() {
        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.add_deployment();
        session.add_deployment();
        session.edit_assembly(|assembly| {
            assembly.assembly_name = "fresh_build".to_string();
            true
        });

        session.copy_assembly_to_deployments();

        for config in session.deployments() {
            assert_eq!(config.assembly_name, "fresh_build");
        }
    }

    #[test]
    fn test_find_deployment_by_name() {
        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.add_deployment();
        session.add_deployment();

        assert!(session.find_deployment("deployment_1").is_some());
        assert!(session.find_deployment("missing").is_none());
    }

    #[test]
    fn test_persistence_roundtrip() {
        let dir = std::env::temp_dir().join("launcher_config_test");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("configs.json");
        let _ = fs::remove_file(&path);

        // Missing file loads as empty.
        assert!(load_configs(&path).unwrap().is_empty());

        let mut session = LauncherSession::new("my_project", LauncherConfig::default());
        session.add_deployment();
        session.edit_deployment(0, |config| {
            config.set_primary_name("prod_game");
            config.add_simulated_player();
            true
        });
        session.save(&path).unwrap();

        let reloaded = LauncherSession::load(&path, "my_project").unwrap();
        assert_eq!(reloaded.deployments().len(), 1);
        assert_eq!(
            reloaded.deployments()[0].simulated_players[0].base.name,
            "prod_game_sim1"
        );

        // Unknown project starts from defaults.
        let fresh = LauncherSession::load(&path, "other_project").unwrap();
        assert!(fresh.deployments().is_empty());

        let _ = fs::remove_file(&path);
    }
}

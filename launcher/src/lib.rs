//! # Deployment Launcher Library
//!
//! This library implements the operator side of the deployment workflow:
//! defining and editing deployment configurations, uploading game assemblies,
//! and launching, stopping and listing cloud deployments of the multiplayer
//! game server, including auxiliary simulated-player deployments that
//! generate synthetic load against a target deployment.
//!
//! ## Architecture Overview
//!
//! The launcher never blocks on external work. Every long-running action is
//! wrapped in a [`command::CommandTask`] that runs the external cloud CLI on
//! a worker task; the caller polls the task from its own tick loop and may
//! cancel it cooperatively at any point. Each task carries an immutable
//! snapshot of the configuration that produced it, so results remain
//! attributable even while the operator keeps editing the live config.
//!
//! ## Module Organization
//!
//! ### Config Module (`config`)
//! The editable configuration model and its session owner:
//! - Deployment, simulated-player and assembly configs with validation
//! - Copy-before-edit commit/cancel editing
//! - Derived naming of simulated-player deployments
//! - JSON persistence keyed by project name
//!
//! ### Command Module (`command`)
//! The cancellable asynchronous command wrapper:
//! - Fixed argument-list invocations of the external cloud CLI
//! - Non-blocking idempotent result polling
//! - Cooperative cancellation and exact-once release
//!
//! ### Orchestrator Module (`orchestrator`)
//! Binds validated configuration to command invocations:
//! - Refuses actions whose configuration has validation errors
//! - Builds the CLI argument lists for upload/launch/stop/list
//! - Hands the task back to the caller for polling and cancellation

pub mod command;
pub mod config;
pub mod orchestrator;

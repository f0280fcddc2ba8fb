//! # Game Client Connection Library
//!
//! This library walks a player from a cold start to a live session on a
//! cloud deployment of the multiplayer game server. The sequence is always
//! the same: acquire a player identity token, discover the candidate
//! deployments, connect to one, spawn the player.
//!
//! ## Architecture Overview
//!
//! A single-threaded tick loop owns a [`session::ConnectionStateMachine`].
//! Exactly one state is live at a time and each state holds at most one
//! outstanding request handle. The loop never blocks on a result: every
//! tick polls the live state's handle non-blockingly and moves on. The
//! actual network work runs on worker tasks; only the finished result
//! crosses back into the tick loop, so all session state is mutated from a
//! single thread by construction.
//!
//! Failures never tear the session down. A failed request is reported
//! through the status sink and the machine returns to its initial state
//! after a cooldown; the request handle of the departing state is released
//! on every exit path, including a forced reset mid-flight.
//!
//! ## Module Organization
//!
//! ### Service Module (`service`)
//! The asynchronous request contract (token, discovery, connect, spawn)
//! and its result/error types.
//!
//! ### Gateway Module (`gateway`)
//! Production transport: one UDP request/response exchange per service
//! call against the session gateway, with a fixed timeout.
//!
//! ### Session Module (`session`)
//! The connection state machine, its blackboard, and the cooldown policy.

pub mod gateway;
pub mod service;
pub mod session;

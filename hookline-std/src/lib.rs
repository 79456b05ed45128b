//! # hookline-std
//!
//! Standard runtime for the hookline subject dispatch framework.
//!
//! This crate provides:
//! - **Registry**: [`registry::SubjectRegistry`], one binding per subject
//! - **Hook chain**: [`chain::HookChain`], local-first hook resolution
//! - **Dispatch loop**: [`dispatch::SubjectLoop`], quota → hooks → handler
//! - **Coordinator**: [`coordinator::Coordinator`], connect, notify, activate, drain
//! - **Buses**: [`bus::InMemoryBus`] and, with the `nats` feature, a NATS adapter
//! - **Standard hooks**: Logging, Timeout
//! - **Configuration**: [`config::HooklineConfig`] loaded from TOML

#![deny(clippy::wildcard_imports)]
#![warn(missing_docs)]

// Re-export core traits
pub use hookline_core;

// Modules
pub mod bus;
pub mod chain;
pub mod config;
pub mod coordinator;
pub mod dispatch;
pub mod guard;
pub mod hooks;
pub mod registry;
pub mod testing;
pub mod trie;

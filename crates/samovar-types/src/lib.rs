//! Shared domain types for Samovar.
//!
//! This crate contains the core domain types used across the Samovar
//! platform: conversation keys, history entries, relationship state,
//! user profiles, settings, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod decision;
pub mod error;
pub mod event;
pub mod history;
pub mod persist;
pub mod profile;
pub mod relationship;

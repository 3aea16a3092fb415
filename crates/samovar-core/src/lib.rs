//! Business logic for the Samovar persona bot.
//!
//! This crate owns the response-decision and prompt-assembly pipeline and
//! the bounded conversation-history store: everything between an inbound
//! message event and the text handed to the language model. It defines
//! the "ports" (adapter traits) that samovar-infra implements and depends
//! only on `samovar-types` -- never on HTTP or filesystem crates.

pub mod decision;
pub mod engine;
pub mod history;
pub mod llm;
pub mod prompt;
pub mod relationship;
pub mod state;
pub mod store;
pub mod style;

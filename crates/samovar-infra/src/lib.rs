//! Adapter implementations for the Samovar persona bot.
//!
//! Everything here lives behind a port defined in samovar-core: JSON file
//! persistence for [`samovar_core::store::StateStore`], an HTTP chat
//! completion client for [`samovar_core::llm::LanguageModel`], and a
//! lexicon scorer for [`samovar_core::llm::SentimentAnalyzer`], plus the
//! config loader that bootstraps [`samovar_types::config::Settings`].

pub mod config;
pub mod llm;
pub mod persistence;
pub mod sentiment;

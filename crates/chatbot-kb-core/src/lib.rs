//! # Chatbot KB Core
//!
//! Runtime-agnostic logic for the chatbot knowledge base: data models,
//! the relational store abstraction, the embedding and vector index
//! traits, in-memory backends, and the dual-write orchestrator that keeps
//! a relational entry and its vector record in step.
//!
//! This crate contains no tokio, sqlx, or HTTP dependencies. Concrete
//! SQLite, OpenAI, Ollama and Pinecone backends live in the `chatbot-kb`
//! app crate.

pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod store;
pub mod sync;

pub use error::{KbError, KbResult};
pub use sync::{EntryService, SyncOptions, SyncStage};

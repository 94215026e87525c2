//! # Chatbot KB
//!
//! Backend for a chatbot knowledge base. Chatbot entries live in SQLite
//! grouped by category, and every entry is mirrored into a vector index as
//! an embedding so the chatbot can retrieve it semantically.
//!
//! Each create, update or delete is a dual write: the relational change is
//! staged in a transaction, the embedding is generated, the vector index is
//! written, and only then is the transaction committed. Any failure before
//! the commit rolls the row back.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────────┐   ┌──────────┐
//! │   HTTP   │──▶│  Entry   │──▶│    SQLite    │   │ Embedding│
//! │  / CLI   │   │ Service  │──▶│ (tx staging) │   │ Provider │
//! └──────────┘   └────┬─────┘   └──────────────┘   └────▲─────┘
//!                     │                                  │
//!                     ├──────────────────────────────────┘
//!                     ▼
//!               ┌──────────────┐
//!               │ Vector Index │
//!               │ memory/pinecone
//!               └──────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! kb init                         # create database
//! kb category add "Benefits"      # -> category 1
//! kb entry add 1 "Vacation requests go through the HR portal."
//! kb serve                        # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite implementation of the core `Store` trait |
//! | [`embedding`] | OpenAI / Ollama embedding providers |
//! | [`vector_index`] | In-memory and Pinecone vector index backends |
//! | [`retry`] | Shared HTTP retry with backoff |
//! | [`app`] | Config → `EntryService` wiring |
//! | [`server`] | HTTP API |
//! | [`logging`] | Tracing subscriber setup |
//! | [`category_cmd`], [`entry_cmd`] | CLI commands |

pub mod app;
pub mod category_cmd;
pub mod config;
pub mod db;
pub mod embedding;
pub mod entry_cmd;
pub mod logging;
pub mod migrate;
pub mod retry;
pub mod server;
pub mod sqlite_store;
pub mod vector_index;

pub use chatbot_kb_core::{EntryService, KbError, KbResult, SyncOptions, SyncStage};

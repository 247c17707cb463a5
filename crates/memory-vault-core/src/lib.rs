//! # Memory Vault Core
//!
//! The ingestion and query pipeline behind Memory Vault, free of any HTTP
//! client, database driver, or filesystem dependency.
//!
//! ```text
//! upload ─▶ extract ─▶ chunk ─▶ index ─▶ VectorStore
//!                                            │
//! chat ───▶ retrieve ◀───────────────────────┘
//!              │
//!              └──▶ synthesize ─▶ LanguageModel ─▶ answer
//! ```
//!
//! Every external collaborator (object storage, metadata store, vector
//! store, embedding model, language model, document reader) is a trait.
//! The `memory-vault` app crate provides network-backed implementations;
//! [`store::memory`] provides in-process ones used by tests and offline runs.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod index;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod retrieve;
pub mod store;
pub mod synthesize;

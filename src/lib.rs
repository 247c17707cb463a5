//! # MemoryVault
//!
//! A retrieval-augmented document assistant: users upload documents, the
//! service indexes them, and questions are answered from the caller's own
//! documents only.
//!
//! The pipeline itself (chunking, indexing, retrieval, answer synthesis,
//! orchestration) lives in the `memory-vault-core` crate behind collaborator
//! traits. This crate supplies the concrete collaborators, configuration,
//! the HTTP API, and the `vault` CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────┐   ┌────────────────┐
//! │  Upload  │──▶│ Extract → Chunk → Embed   │──▶│ Vector store    │
//! │ HTTP/CLI │   │        (core Vault)       │   │ Pinecone/SQLite │
//! └──────────┘   └───────────────────────────┘   └───────┬────────┘
//!                                                        │ owner filter
//!                 ┌──────────────────────────┐           │
//!  question ─────▶│ Retrieve → Prompt → LLM  │◀──────────┘
//!                 └──────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! vault init
//! vault ingest ./notes.pdf --owner alice
//! vault chat "What did the notes say about deadlines?" --owner alice
//! vault serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`app`] | Build a `Vault` from config |
//! | [`auth`] | JWT bearer-token verification |
//! | [`server`] | HTTP API |
//! | [`commands`] | CLI command implementations |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | SQLite document and vector stores |
//! | [`object_store`] | Filesystem storage for uploaded files |
//! | [`pinecone`] | Pinecone vector store |
//! | [`gemini`] | Gemini embeddings, generation, PDF reading, model listing |
//! | [`openai`] | OpenAI embeddings and chat completions |
//! | [`extract`] | Local PDF text extraction |
//! | [`http`] | Shared provider HTTP plumbing and retry policy |

pub mod app;
pub mod auth;
pub mod commands;
pub mod config;
pub mod db;
pub mod extract;
pub mod gemini;
pub mod http;
pub mod migrate;
pub mod object_store;
pub mod openai;
pub mod pinecone;
pub mod server;
pub mod sqlite_store;

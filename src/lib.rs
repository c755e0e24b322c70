//! # Shop Analyst
//!
//! Plain-English questions over an e-commerce sales and advertising store.
//!
//! A question is translated into a single read-only SQL query by an ordered
//! chain of translators (hosted model, local model, keyword patterns),
//! executed against SQLite, and turned into a short human-readable answer.
//! The answer is returned whole or replayed as an event stream.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────────┐   ┌──────────────┐   ┌───────────┐
//! │  question  │──▶│ TranslatorChain │──▶│ QueryExecutor│──▶│ formatter │
//! └────────────┘   │ hosted → local  │   │  read-only   │   └─────┬─────┘
//!                  │ → pattern       │   └──────────────┘         │
//!                  └─────────────────┘                ┌───────────┴──────┐
//!                                                     ▼                  ▼
//!                                               ┌──────────┐       ┌──────────┐
//!                                               │   CLI    │       │   HTTP   │
//!                                               │ (shopq)  │       │ + stream │
//!                                               └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! shopq init                            # create the store
//! shopq ask "What is my total sales?"   # answer a question
//! shopq serve                           # start HTTP server
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`intent`] | Shared keyword intent table |
//! | [`schema`] | Schema description from the store catalog |
//! | [`translate`] | Tiered question → SQL translation |
//! | [`executor`] | Read-only query execution |
//! | [`format`] | Answer formatting |
//! | [`pipeline`] | Translate → execute → format facade |
//! | [`stream`] | Event-stream replay of an answer |
//! | [`chart`] | Chart documents |
//! | [`stats`] | Store statistics |
//! | [`server`] | HTTP server |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod chart;
pub mod config;
pub mod db;
pub mod executor;
pub mod format;
pub mod intent;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod schema;
pub mod server;
pub mod stats;
pub mod stream;
pub mod translate;

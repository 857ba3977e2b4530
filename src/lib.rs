//! cardscout - bank credit-card information crawler.
//!
//! Locates each configured bank's credit-card page, extracts card
//! products through a per-bank strategy (DOM scraping, JSON API, or
//! web search plus LLM extraction) and persists them in a local
//! SQLite store, unique on `(bank, name)`.

pub mod browser;
pub mod cli;
pub mod config;
pub mod extract;
pub mod llm;
pub mod locator;
pub mod models;
pub mod orchestrator;
pub mod search;
pub mod store;

//! mailprobe - email deliverability testing service core
//!
//! A visitor requests a test, the system seeds monitored mailbox accounts
//! with a unique token, and the check engine polls those accounts to find
//! out which ones received the token email, where it landed (inbox/spam),
//! and what authentication results it carried.
//!
//! ## Module Organization
//!
//! - `adapters/sqlite/`: test registry (tests, accounts, associations,
//!   results, circuit-breaker state)
//! - `adapters/imap/`: mailbox search client behind a narrow contract
//! - `services/check/`: the engine (scheduler, dispatch guard, result
//!   processor, timeout sweeper, driver loop)
//! - `config/`: configuration management
//! - `types/`: data structures and types

pub mod adapters;
pub mod config;
pub mod error;
pub mod services;
pub mod types;

//! Gradegate - Quota-Metered AI Scoring Gateway
//!
//! This crate implements the metering core that sits between student-facing
//! scoring requests and an external, rate-limited AI scoring provider:
//! subscription admission, a bounded ticket pool, and an append-only usage
//! ledger that is charged only after a successful score.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

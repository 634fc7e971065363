//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer for affiliates, rate history, templates and commissions

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::{
    AffiliateFilter, CommissionFilter, RateWrite, RateWriteOutcome, Repository,
};

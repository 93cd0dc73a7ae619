//! Proving Ground - sequential test execution engine
//!
//! Runs test modules one case at a time through setup, body and teardown,
//! records assertions in call order, and folds results up a suite/run tree.
//!
//! ## Features
//!
//! - Three-phase test lifecycle with per-phase timeouts
//! - Immediate and deferred assertions with caller locations
//! - Uncaught fault capture for work spawned by a test
//! - Console and JUnit reporters
//!
//! ## Usage
//!
//! ```bash
//! # Run every *_test.rs module under a directory
//! proving-ground run src/demos
//!
//! # Show passing tests too and write JUnit XML
//! proving-ground run src/demos --all -r console -r junit
//!
//! # List suites and their tests
//! proving-ground list src/demos
//! ```

pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod executor;
pub mod ledger;
pub mod models;
pub mod output;
pub mod utils;

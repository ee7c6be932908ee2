//! Shared test utilities for integration, property and chaos tests.
//!
//! This module provides:
//! - Dump builders (header + marker + payload groups)
//! - Mock ReplicationAdmin for recording resend calls
//! - In-memory sinks that outlive the pipeline

#![allow(dead_code)]

pub mod dump;
pub mod mock_admin;

pub use dump::*;
pub use mock_admin::*;

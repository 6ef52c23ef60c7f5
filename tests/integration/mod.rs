//! Integration tests for pagetape
//!
//! These tests drive the recorder end to end over a fully mocked page.

#[path = "../common/mod.rs"]
pub mod common;

pub mod recording_flow;
pub mod testmode_flow;

// Conversation matchmaking scheduler - API core
//
// This crate pairs waiting users for real-time conversations based on
// concern-text similarity and personality-type preference. The HTTP surface
// is thin; the interesting parts live in domains/matching (waiting pool,
// candidate selection, scoring, the proposal state machine) and kernel
// (trait-based adapters for the state store, notifier and external services).

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;

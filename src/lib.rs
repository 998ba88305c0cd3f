//! Terminal console for an MPC wallet coordinator: wallet configuration
//! management, ETH transfers and a live view of the coordinator's log.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod eth;
pub mod event_stream;
pub mod log_entry;
pub mod log_store;
pub mod log_view;
pub mod sse;
pub mod types;
pub mod units;

//! HTTP API for the identification service

pub mod handlers;
pub mod server;

pub use server::{build_router, run, AppContext};

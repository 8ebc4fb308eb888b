//! # TRINO Identification Service (trino-id)
//!
//! Audio-to-prediction pipeline for bird species identification.
//!
//! **Purpose:** Validate an uploaded recording, condition the signal,
//! extract a fixed-shape log-mel tensor, invoke the pre-trained CNN, and
//! resolve its output into a ranked species list, persisting history and
//! errors alongside.
//!
//! **Architecture:** Single-invocation pipeline behind an axum HTTP
//! surface, using symphonia + rubato for audio, rustfft for features,
//! and candle for inference.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod pipeline;
pub mod transcode;

pub use error::{Error, PipelineError, Result};

//! This crate provides a time-series query server for sensor data. It reads the samples of a
//! sensor from a store partitioned by calendar month and reduces them to a bounded number of
//! points, either by fixed-size decimation or by local calendar day, week or month, before
//! returning them to the caller.
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [chrono] and [chrono_tz] provide timezone-aware calendar arithmetic.
//! * [sled] is the embedded database holding the series partitions.

pub mod aggregation;
pub mod app;
pub mod app_state;
pub mod calendar;
pub mod cli;
pub mod downsample;
pub mod error;
pub mod metrics;
pub mod models;
pub mod partition;
pub mod resource_manager;
pub mod series_store;
pub mod series_store_memory;
pub mod series_store_sled;
pub mod server;
pub mod service;
#[cfg(test)]
pub mod test_utils;
pub mod timezone;
pub mod tracing;
pub mod validated_json;

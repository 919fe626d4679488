//! This crate provides the Pastizales server, a backend for a mapping client that explores the
//! grasslands of Uruguay. It serves species and community catalogs, user-drawn zones, map layers
//! and zonal statistics of vegetation indicators.
//!
//! The server does no raster computation of its own. It forwards requests to three providers and
//! reshapes their answers for the client:
//!
//! * Cloud Firestore holds the catalogs and zones, and is read through its REST API.
//! * Cloud Storage holds species and community images, and is listed through its S3-compatible
//!   API using the [AWS SDK for S3](aws-sdk-s3).
//! * Earth Engine renders map tiles and computes zonal statistics from expression graphs built
//!   by the [earth_engine] module.
//!
//! The server is built on top of a number of open source components.
//!
//! * [Tokio](tokio), the most popular asynchronous Rust runtime.
//! * [Axum](axum) web framework, built by the Tokio team, on top of the [hyper] HTTP library.
//! * [Serde](serde) performs (de)serialisation of JSON request and response data.
//! * [reqwest] sends requests to the Google REST APIs.

pub mod app;
pub mod app_state;
pub mod auth;
pub mod cli;
pub mod earth_engine;
pub mod error;
pub mod firestore;
pub mod metrics;
pub mod models;
pub mod object_store;
pub mod series;
pub mod server;
pub mod services;
#[cfg(test)]
pub mod test_utils;
pub mod tracing;
pub mod upstream;
pub mod validated_json;

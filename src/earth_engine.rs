//! Earth Engine compute platform
//!
//! Requests are expressed as expression graphs built with [expression::Expr], evaluated remotely
//! by a [client::ComputeEngine], and parametrised by the lookup tables in [catalog].

pub mod catalog;
pub mod client;
pub mod expression;

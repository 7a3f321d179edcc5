//! # Strata
//!
//! The HTTP surface and CLI around the `strata-core` validator gateway.

pub mod api;
pub mod cli;

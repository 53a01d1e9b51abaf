//! Public API module.
//!
//! This module contains the value types, configuration and errors of the
//! `nmlink` crate.

pub mod models;

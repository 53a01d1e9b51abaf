//! Type definitions and constants.
//!
//! This module contains NetworkManager and URfkill constants.

pub(crate) mod constants;

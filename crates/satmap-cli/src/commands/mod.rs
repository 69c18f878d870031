//! Command implementations.

pub mod common;
pub mod encode;
pub mod map;

//! Annotation export schema
//!
//! This module defines the positional row format of interval annotation
//! exports and the adapter that extracts one tier's intervals from them.

mod adapter;
mod annotation;

pub use adapter::*;
pub use annotation::*;

//! Autosampler CLI library.
//!
//! This crate provides the command implementations behind the `autosampler`
//! binary: corpus scanning, model training, variant generation, and feature
//! inspection.

pub mod commands;

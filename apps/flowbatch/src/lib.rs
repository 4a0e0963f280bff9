//! # flowbatch
//!
//! Command-line front end for the flowbatch detection engine.
//!
//! - `cli`: clap commands over a redb batch database
//! - `config`: TOML application configuration
//! - `samples`: telemetry file loading

pub mod cli;
pub mod config;
pub mod samples;

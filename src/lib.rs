//! # Weather Station Library
//!
//! Per-cycle measurement pipeline for a solar-powered outdoor weather station.
//!
//! Each wake cycle reads the environmental sensors, derives secondary
//! atmospheric and air-quality metrics, appends the observation to a local
//! daily log, submits it to a remote collector and computes the sleep until
//! the next wake.

pub mod clock;
pub mod config;
pub mod cycle;
pub mod error;
pub mod metrics;
pub mod observation;
pub mod recorder;
pub mod sensors;
pub mod submission;

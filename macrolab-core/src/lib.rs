//! MacroLab Core: dataset types, data collection, preparation, statistics,
//! forecasting models and the structural/hype heuristic.
//!
//! This crate holds everything that does not touch the output directory:
//! - Providers (Yahoo Finance, FRED), local CSV import and the raw cache
//! - The aligned monthly [`Dataset`] and its preparation
//! - ADF, Granger causality, correlation and seasonal decomposition
//! - SARIMA and the lag-feature ML baseline
//! - The structural-vs-hype signal heuristic

pub mod classify;
pub mod data;
pub mod dataset;
pub mod models;
pub mod prepare;
pub mod stats;

pub use classify::{evaluate_signals, hype_vs_structural, Classification, SignalLabel};
pub use dataset::Dataset;
pub use prepare::prepare_dataset;

//! FxLab Core — bar aggregation, position accounting, strategies, iterative
//! simulation and live dispatch for FX instruments.
//!
//! This crate contains the engine:
//! - Domain types (bars, ticks, positions, fills, granularities)
//! - Tick-to-bar aggregation shared by history backfill and live streams
//! - Position ledger with spread-adjusted execution
//! - Strategy signal sources and the indicators behind them
//! - Bar-by-bar iterative simulator
//! - Live dispatcher and scoped session over injected data/order seams

pub mod aggregator;
pub mod data;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod ledger;
pub mod live;
pub mod strategy;

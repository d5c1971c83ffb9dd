//! Intraday option-chain analysis over CE/PE snapshot series.
//!
//! A batch of snapshot CSVs is loaded into immutable [`model::SnapshotTable`]s,
//! run through the [`engine`] pipeline (features, rolling correlations,
//! lead-lag search, composite scoring) and condensed by [`summary`] into one
//! record per source.

pub mod data;
pub mod engine;
pub mod error;
pub mod example;
pub mod inspect;
pub mod model;
pub mod schema;
pub mod summary;
pub mod validate;

pub mod config;
pub mod side;
pub mod table;

pub use config::{
    AnalysisConfig, CompositeBasis, ConfigOverrides, CorrelationBasis, LagRange, StrikeMode,
    Thresholds, Weights,
};
pub use side::{ColumnKey, CorrPair, DerivedField, RawField, Side};
pub use table::{Column, SnapshotTable, TableError};

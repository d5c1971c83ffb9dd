use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One side of the option chain at a strike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Call side, column prefix `CE`.
    Call,
    /// Put side, column prefix `PE`.
    Put,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::Call, Side::Put];

    /// The side whose correlations drive the composite score.
    pub const PRIMARY: Side = Side::Call;

    pub fn prefix(self) -> &'static str {
        match self {
            Side::Call => "CE",
            Side::Put => "PE",
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Call => Side::Put,
            Side::Put => Side::Call,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Side::Call => 0,
            Side::Put => 1,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.prefix())
    }
}

/// Raw per-side fields delivered by an option-chain poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawField {
    LastPrice,
    OpenInterest,
    TotalTradedVolume,
    ImpliedVolatility,
    StrikePrice,
}

impl RawField {
    pub const ALL: [RawField; 5] = [
        RawField::LastPrice,
        RawField::OpenInterest,
        RawField::TotalTradedVolume,
        RawField::ImpliedVolatility,
        RawField::StrikePrice,
    ];

    /// Fields a side must carry for its features to be derived.
    pub const FEATURE_INPUTS: [RawField; 4] = [
        RawField::LastPrice,
        RawField::OpenInterest,
        RawField::TotalTradedVolume,
        RawField::ImpliedVolatility,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            RawField::LastPrice => "lastPrice",
            RawField::OpenInterest => "openInterest",
            RawField::TotalTradedVolume => "totalTradedVolume",
            RawField::ImpliedVolatility => "impliedVolatility",
            RawField::StrikePrice => "strikePrice",
        }
    }

    /// CSV column name for this field on `side`, e.g. `CE_openInterest`.
    pub fn column(self, side: Side) -> String {
        format!("{}_{}", side.prefix(), self.suffix())
    }

    pub(crate) fn index(self) -> usize {
        match self {
            RawField::LastPrice => 0,
            RawField::OpenInterest => 1,
            RawField::TotalTradedVolume => 2,
            RawField::ImpliedVolatility => 3,
            RawField::StrikePrice => 4,
        }
    }
}

/// Per-side features derived from consecutive rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivedField {
    PriceDelta,
    ReturnPct,
    OiDelta,
    VolumeDelta,
    IvDelta,
}

impl DerivedField {
    pub const ALL: [DerivedField; 5] = [
        DerivedField::PriceDelta,
        DerivedField::ReturnPct,
        DerivedField::OiDelta,
        DerivedField::VolumeDelta,
        DerivedField::IvDelta,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            DerivedField::PriceDelta => "dPrice",
            DerivedField::ReturnPct => "retPct",
            DerivedField::OiDelta => "dOI",
            DerivedField::VolumeDelta => "dVol",
            DerivedField::IvDelta => "dIV",
        }
    }

    /// Raw field this feature is computed from.
    pub fn source(self) -> RawField {
        match self {
            DerivedField::PriceDelta | DerivedField::ReturnPct => RawField::LastPrice,
            DerivedField::OiDelta => RawField::OpenInterest,
            DerivedField::VolumeDelta => RawField::TotalTradedVolume,
            DerivedField::IvDelta => RawField::ImpliedVolatility,
        }
    }
}

/// Pairs of series the rolling engine correlates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrPair {
    PriceOi,
    PriceVolume,
}

impl CorrPair {
    pub const ALL: [CorrPair; 2] = [CorrPair::PriceOi, CorrPair::PriceVolume];

    fn suffix(self) -> &'static str {
        match self {
            CorrPair::PriceOi => "price_oi",
            CorrPair::PriceVolume => "price_vol",
        }
    }
}

/// Typed column identifier. Every column in a [`SnapshotTable`](super::SnapshotTable)
/// is addressed through one of these, never through a hand-built string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnKey {
    Raw(Side, RawField),
    Derived(Side, DerivedField),
    OiImbalance,
    RollingCorr { side: Side, pair: CorrPair },
    Strength,
}

impl ColumnKey {
    pub fn name(&self) -> String {
        match self {
            ColumnKey::Raw(side, field) => field.column(*side),
            ColumnKey::Derived(side, field) => format!("{}_{}", side.prefix(), field.suffix()),
            ColumnKey::OiImbalance => "OI_imbalance".to_string(),
            ColumnKey::RollingCorr { side, pair } => {
                format!("{}_corr_{}", side.prefix(), pair.suffix())
            }
            ColumnKey::Strength => "strength".to_string(),
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

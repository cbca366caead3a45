//! Aggregation temporality policy for metric instruments.
//!
//! The table starts from one of two fixed bases chosen by the
//! `..._TEMPORALITY_PREFERENCE` value and is then overlaid with per-kind
//! overrides. Overrides are applied unconditionally, including ones that
//! make little sense (delta for an up-down counter).

use crate::env::{EnvNamespace, EnvSnapshot};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const DEFAULT_PREFERENCE: &str = "CUMULATIVE";

/// Kind of metric instrument that produced a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstrumentKind {
    /// Monotonic synchronous counter.
    Counter,
    /// Non-monotonic synchronous counter.
    UpDownCounter,
    /// Synchronous histogram.
    Histogram,
    /// Monotonic asynchronous counter.
    ObservableCounter,
    /// Non-monotonic asynchronous counter.
    ObservableUpDownCounter,
    /// Asynchronous gauge.
    ObservableGauge,
}

impl InstrumentKind {
    /// All instrument kinds.
    pub const ALL: [InstrumentKind; 6] = [
        InstrumentKind::Counter,
        InstrumentKind::UpDownCounter,
        InstrumentKind::Histogram,
        InstrumentKind::ObservableCounter,
        InstrumentKind::ObservableUpDownCounter,
        InstrumentKind::ObservableGauge,
    ];

    fn index(self) -> usize {
        match self {
            InstrumentKind::Counter => 0,
            InstrumentKind::UpDownCounter => 1,
            InstrumentKind::Histogram => 2,
            InstrumentKind::ObservableCounter => 3,
            InstrumentKind::ObservableUpDownCounter => 4,
            InstrumentKind::ObservableGauge => 5,
        }
    }

    /// Temporality of this kind under a delta preference.
    ///
    /// Up-down counters and gauges stay cumulative: their values have no
    /// meaningful delta form.
    fn delta_preferred(self) -> Temporality {
        match self {
            InstrumentKind::Counter
            | InstrumentKind::Histogram
            | InstrumentKind::ObservableCounter => Temporality::Delta,
            InstrumentKind::UpDownCounter
            | InstrumentKind::ObservableUpDownCounter
            | InstrumentKind::ObservableGauge => Temporality::Cumulative,
        }
    }
}

/// Whether data points accumulate from a fixed start or since the last export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Temporality {
    /// Accumulated since a fixed start time.
    #[default]
    Cumulative,
    /// Accumulated since the previous export.
    Delta,
}

/// Per-kind temporality overrides supplied by the caller.
pub type TemporalityOverrides = BTreeMap<InstrumentKind, Temporality>;

/// Resolved temporality for every instrument kind.
///
/// Every kind has exactly one entry by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemporalityTable {
    entries: [Temporality; 6],
}

impl TemporalityTable {
    /// Table with every kind cumulative.
    pub fn cumulative() -> Self {
        Self {
            entries: [Temporality::Cumulative; 6],
        }
    }

    /// Table biased towards delta for the kinds that admit it.
    pub fn delta() -> Self {
        let mut table = Self::cumulative();
        for kind in InstrumentKind::ALL {
            table.entries[kind.index()] = kind.delta_preferred();
        }
        table
    }

    /// Resolves the table from a preference string and overrides.
    ///
    /// The preference defaults to `CUMULATIVE`. Only `DELTA` (after trimming,
    /// case-insensitive) selects the delta base; any other value selects
    /// the cumulative one.
    pub fn resolve(preference: Option<&str>, overrides: &TemporalityOverrides) -> Self {
        let preference = preference.unwrap_or(DEFAULT_PREFERENCE);
        let mut table = if preference.trim().eq_ignore_ascii_case("DELTA") {
            Self::delta()
        } else {
            Self::cumulative()
        };

        for (&kind, &temporality) in overrides {
            table.set(kind, temporality);
        }

        table
    }

    /// Resolves the table from the namespace's `TEMPORALITY_PREFERENCE` variable.
    pub fn from_env(
        ns: &EnvNamespace,
        env: &EnvSnapshot,
        overrides: &TemporalityOverrides,
    ) -> Self {
        Self::resolve(env.get(&ns.temporality_preference), overrides)
    }

    /// Returns the temporality for `kind`.
    pub fn get(&self, kind: InstrumentKind) -> Temporality {
        self.entries[kind.index()]
    }

    /// Overrides the temporality of a single kind.
    pub fn set(&mut self, kind: InstrumentKind, temporality: Temporality) {
        self.entries[kind.index()] = temporality;
    }

    /// Iterates over every kind and its temporality.
    pub fn iter(&self) -> impl Iterator<Item = (InstrumentKind, Temporality)> + '_ {
        InstrumentKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }
}

impl Default for TemporalityTable {
    fn default() -> Self {
        Self::cumulative()
    }
}

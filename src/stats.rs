//! Statistical summaries over stored hashes and crack-time estimates.
//!
//! Defines `Summary` (counts, percentages, averages and latency/crack-time
//! histograms for one algorithm or for the whole table) and `EstimateStats`
//! for a batch of estimator output.
use serde::Serialize;

use crate::algorithm::Algorithm;
use crate::model::CrackRun;
use crate::store::{Result, Store};

/// Bins used by the `summary` command when none are requested.
pub const DEFAULT_HISTOGRAM_BINS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub algorithm: Option<Algorithm>,
    pub total_hashes: i64,
    pub cracked: i64,
    /// 0-100.
    pub cracked_pct: f64,
    pub avg_hash_ms: f64,
    pub avg_crack_time_s: f64,
    pub latest_run: Option<CrackRun>,
    pub hash_time_histogram: Option<Histogram>,
    pub crack_time_histogram: Option<Histogram>,
}

fn pct(n: i64, d: i64) -> f64 {
    if d == 0 {
        return 0.0;
    }
    (n as f64) / (d as f64) * 100.0
}

pub fn summarize(store: &Store, algorithm: Option<Algorithm>, bins: usize) -> Result<Summary> {
    let totals = store.totals(algorithm)?;
    Ok(Summary {
        algorithm,
        total_hashes: totals.total,
        cracked: totals.cracked,
        cracked_pct: pct(totals.cracked, totals.total),
        avg_hash_ms: totals.avg_hash_ms.unwrap_or(0.0),
        avg_crack_time_s: totals.avg_crack_time_s.unwrap_or(0.0),
        latest_run: store.latest_crack_run()?,
        hash_time_histogram: Histogram::from_values(&store.hash_times(algorithm)?, bins),
        crack_time_histogram: Histogram::from_values(&store.crack_times(algorithm)?, bins),
    })
}

/// Equal-width bins over `[min, max]`; the last bin is closed on the right.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub min: f64,
    pub max: f64,
    pub counts: Vec<u64>,
}

impl Histogram {
    /// `None` for no values or zero bins. When every value is equal they all
    /// land in the first bin.
    pub fn from_values(values: &[f64], bins: usize) -> Option<Self> {
        if values.is_empty() || bins == 0 {
            return None;
        }
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let width = (max - min) / bins as f64;
        let mut counts = vec![0u64; bins];
        for v in values {
            let idx = if width > 0.0 {
                (((v - min) / width) as usize).min(bins - 1)
            } else {
                0
            };
            counts[idx] += 1;
        }
        Some(Self { min, max, counts })
    }

    pub fn bin_width(&self) -> f64 {
        (self.max - self.min) / self.counts.len() as f64
    }

    /// Lower and upper edge of bin `i`.
    pub fn bin_edges(&self, i: usize) -> (f64, f64) {
        let w = self.bin_width();
        (self.min + w * i as f64, self.min + w * (i + 1) as f64)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EstimateStats {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

impl EstimateStats {
    /// All zeros for an empty slice.
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }
        let sum: f64 = values.iter().sum();
        Self {
            count: values.len(),
            mean: sum / values.len() as f64,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

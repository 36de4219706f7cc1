//! Crack-time estimation from hashcat progress snapshots.
//!
//! Hashcat does not report when each individual hash fell, only periodic
//! cumulative counters. This module spreads the observed run duration over
//! the recovered hashes using the guess-progress ratio at each snapshot, and
//! linearly within each batch of hashes that appeared between snapshots.
//! The result is approximate telemetry, not a measurement.
//!
//! [`estimate_crack_times`] and [`fallback_crack_times`] are pure; only
//! [`run_estimator`] touches storage, so the heuristic can be replaced
//! without touching potfile reconciliation.
use std::path::Path;

use log::{info, warn};

use crate::algorithm::Algorithm;
use crate::io::InputError;
use crate::stats::EstimateStats;
use crate::status::{ProgressSnapshot, parse_status_log};
use crate::store::{CrackTimePolicy, Store, StoreError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorSettings {
    /// Whole-run duration assumed when the log is unusable.
    pub fallback_duration_s: f64,
    /// Guess rate used when the snapshots span no time.
    pub assumed_speed_hps: f64,
    /// Floor for the speed-derived duration.
    pub min_duration_s: f64,
}

impl Default for EstimatorSettings {
    fn default() -> Self {
        Self {
            fallback_duration_s: 7200.0,
            assumed_speed_hps: 29.0,
            min_duration_s: 3600.0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EstimateError {
    #[error("no cracked {0} hashes found in database")]
    NothingCracked(Algorithm),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Where the estimates came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimateSource {
    StatusLog { snapshots: usize },
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EstimateReport {
    pub source: EstimateSource,
    pub cracked: usize,
    pub updated: usize,
    pub stats: EstimateStats,
}

/// One estimated elapsed time (seconds since run start) per cracked hash, in
/// crack order. Empty when there are no snapshots or nothing was cracked;
/// otherwise exactly `total_cracked` long.
pub fn estimate_crack_times(
    snapshots: &[ProgressSnapshot],
    total_cracked: usize,
    settings: &EstimatorSettings,
) -> Vec<f64> {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return Vec::new();
    };
    if total_cracked == 0 {
        return Vec::new();
    }

    let mut total_duration = last.start_time - first.start_time;
    if total_duration <= 0.0 {
        total_duration =
            (last.progress as f64 / settings.assumed_speed_hps).max(settings.min_duration_s);
    }
    let last_progress = last.progress.max(1) as f64;

    let mut times: Vec<f64> = Vec::with_capacity(total_cracked);
    let mut recovered_so_far = 0u64;
    for snap in snapshots {
        if times.len() == total_cracked {
            break;
        }
        if snap.recovered <= recovered_so_far {
            continue;
        }
        let newly = snap.recovered - recovered_so_far;
        let batch_time = snap.progress as f64 / last_progress * total_duration;
        let per_hash = batch_time / newly as f64;
        // Estimates past total_cracked would be dropped, so never build them.
        let room = total_cracked - times.len();
        times.extend((1..=newly).take(room).map(|k| per_hash * k as f64));
        recovered_so_far = snap.recovered;
    }

    while times.len() < total_cracked {
        let avg = if times.is_empty() {
            total_duration / total_cracked as f64
        } else {
            times.iter().sum::<f64>() / times.len() as f64
        };
        times.push(avg);
    }
    times.truncate(total_cracked);
    times
}

/// Evenly spaced multiples of `fallback_duration_s / total`.
pub fn fallback_crack_times(total: usize, settings: &EstimatorSettings) -> Vec<f64> {
    if total == 0 {
        return Vec::new();
    }
    let step = settings.fallback_duration_s / total as f64;
    (1..=total).map(|k| step * k as f64).collect()
}

/// Estimate and persist crack times for every cracked `algorithm` row.
///
/// The `i`-th estimate goes to the `i`-th row in ascending `cracked_at`
/// order. A missing or unusable log falls back to
/// [`fallback_crack_times`]; no cracked rows is an error.
pub fn run_estimator(
    store: &Store,
    algorithm: Algorithm,
    log_path: &Path,
    settings: &EstimatorSettings,
    policy: CrackTimePolicy,
    mmap_threshold: u64,
) -> Result<EstimateReport, EstimateError> {
    let cracked = store.cracked_hashes(algorithm)?;
    if cracked.is_empty() {
        return Err(EstimateError::NothingCracked(algorithm));
    }
    info!("found {} cracked {} hashes", cracked.len(), algorithm);

    let snapshots = match parse_status_log(log_path, mmap_threshold) {
        Ok(s) => s,
        Err(InputError::NotFound(p)) => {
            warn!("status log not found: {}", p.display());
            Vec::new()
        }
        Err(e) => return Err(e.into()),
    };
    info!("parsed {} status updates from log", snapshots.len());

    let (source, times) = if snapshots.is_empty() {
        warn!(
            "no usable status updates, using estimated duration {}s",
            settings.fallback_duration_s
        );
        (
            EstimateSource::Fallback,
            fallback_crack_times(cracked.len(), settings),
        )
    } else {
        (
            EstimateSource::StatusLog {
                snapshots: snapshots.len(),
            },
            estimate_crack_times(&snapshots, cracked.len(), settings),
        )
    };

    let mut updated = 0;
    for (row, secs) in cracked.iter().zip(&times) {
        updated += store.set_crack_time(row.id, *secs, policy)?;
    }

    Ok(EstimateReport {
        source,
        cracked: cracked.len(),
        updated,
        stats: EstimateStats::from_values(&times),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{crack_run, seed};
    use tempfile::tempdir;

    fn snap(start_time: f64, recovered: u64, progress: u64) -> ProgressSnapshot {
        ProgressSnapshot {
            start_time,
            recovered,
            progress,
        }
    }

    fn three_snapshots() -> Vec<ProgressSnapshot> {
        vec![snap(100.0, 0, 0), snap(160.0, 2, 50), snap(220.0, 5, 100)]
    }

    #[test]
    fn spreads_progress_ratio_within_each_batch() {
        let t = estimate_crack_times(&three_snapshots(), 5, &EstimatorSettings::default());
        assert_eq!(t, vec![30.0, 60.0, 40.0, 80.0, 120.0]);
    }

    #[test]
    fn pads_with_running_average_and_truncates() {
        let t = estimate_crack_times(&three_snapshots(), 7, &EstimatorSettings::default());
        assert_eq!(t.len(), 7);
        assert_eq!(t[5], 66.0);
        assert_eq!(t[6], 66.0);

        let t = estimate_crack_times(&three_snapshots(), 3, &EstimatorSettings::default());
        assert_eq!(t, vec![30.0, 60.0, 40.0]);
    }

    #[test]
    fn no_recoveries_pads_with_even_share() {
        let snaps = vec![snap(0.0, 0, 10), snap(100.0, 0, 20)];
        let t = estimate_crack_times(&snaps, 4, &EstimatorSettings::default());
        assert_eq!(t, vec![25.0; 4]);
    }

    #[test]
    fn zero_span_uses_speed_floored_at_one_hour() {
        let settings = EstimatorSettings::default();
        let t = estimate_crack_times(&[snap(50.0, 2, 1000)], 2, &settings);
        // 1000 / 29 is well under an hour
        assert_eq!(t, vec![1800.0, 3600.0]);

        let t = estimate_crack_times(&[snap(50.0, 1, 290_000)], 1, &settings);
        assert_eq!(t, vec![10_000.0]);
    }

    #[test]
    fn huge_recovered_count_is_capped_to_cracked_rows() {
        let snaps = vec![snap(0.0, 0, 0), snap(60.0, 10_000_000_000_000, 100)];
        let t = estimate_crack_times(&snaps, 1, &EstimatorSettings::default());
        assert_eq!(t.len(), 1);
        assert_eq!(t[0], 60.0 / 10_000_000_000_000f64);
    }

    #[test]
    fn empty_inputs_give_empty_output() {
        let settings = EstimatorSettings::default();
        assert!(estimate_crack_times(&[], 5, &settings).is_empty());
        assert!(estimate_crack_times(&three_snapshots(), 0, &settings).is_empty());
    }

    #[test]
    fn fallback_is_evenly_spaced() {
        let t = fallback_crack_times(4, &EstimatorSettings::default());
        assert_eq!(t, vec![1800.0, 3600.0, 5400.0, 7200.0]);
    }

    #[test]
    fn length_always_matches_cracked_count() {
        let settings = EstimatorSettings::default();
        for n in 1..12 {
            assert_eq!(estimate_crack_times(&three_snapshots(), n, &settings).len(), n);
        }
    }

    fn cracked_store(n: usize) -> (Store, Vec<String>) {
        let mut store = Store::open_in_memory().unwrap();
        let pairs: Vec<(String, String)> = (0..n).map(|i| (format!("pw{i}"), format!("h{i}"))).collect();
        let refs: Vec<(&str, &str)> = pairs.iter().map(|(p, h)| (p.as_str(), h.as_str())).collect();
        seed(&mut store, Algorithm::Argon2id, &refs);
        let run = crack_run(&store, "argon");
        for (p, h) in &pairs {
            store.record_crack(Algorithm::Argon2id, h, run, None, p).unwrap();
        }
        (store, pairs.into_iter().map(|(_, h)| h).collect())
    }

    #[test]
    fn run_assigns_estimates_in_crack_order() {
        let (store, hashes) = cracked_store(5);
        let dir = tempdir().unwrap();
        let log = dir.path().join("argon2id_run.log");
        std::fs::write(
            &log,
            concat!(
                "{\"time_start\": 100, \"recovered_hashes\": [0, 5], \"progress\": [0, 100]}\n",
                "{\"time_start\": 160, \"recovered_hashes\": [2, 5], \"progress\": [50, 100]}\n",
                "{\"time_start\": 220, \"recovered_hashes\": [5, 5], \"progress\": [100, 100]}\n",
            ),
        )
        .unwrap();
        let report = run_estimator(
            &store,
            Algorithm::Argon2id,
            &log,
            &EstimatorSettings::default(),
            CrackTimePolicy::FillMissing,
            0,
        )
        .unwrap();
        assert_eq!(report.source, EstimateSource::StatusLog { snapshots: 3 });
        assert_eq!(report.updated, 5);
        let got: Vec<f64> = hashes
            .iter()
            .map(|h| {
                store
                    .find_hash(Algorithm::Argon2id, h)
                    .unwrap()
                    .unwrap()
                    .crack_time_s
                    .unwrap()
            })
            .collect();
        assert_eq!(got, vec![30.0, 60.0, 40.0, 80.0, 120.0]);
        assert_eq!(report.stats.max, 120.0);
    }

    #[test]
    fn missing_log_falls_back_and_policy_is_respected() {
        let (store, hashes) = cracked_store(2);
        let first = store.find_hash(Algorithm::Argon2id, &hashes[0]).unwrap().unwrap();
        store.set_crack_time(first.id, 1.0, CrackTimePolicy::Overwrite).unwrap();
        let dir = tempdir().unwrap();
        let report = run_estimator(
            &store,
            Algorithm::Argon2id,
            &dir.path().join("missing.log"),
            &EstimatorSettings::default(),
            CrackTimePolicy::FillMissing,
            0,
        )
        .unwrap();
        assert_eq!(report.source, EstimateSource::Fallback);
        assert_eq!(report.updated, 1);
        let a = store.find_hash(Algorithm::Argon2id, &hashes[0]).unwrap().unwrap();
        let b = store.find_hash(Algorithm::Argon2id, &hashes[1]).unwrap().unwrap();
        assert_eq!(a.crack_time_s, Some(1.0));
        assert_eq!(b.crack_time_s, Some(7200.0));
    }

    #[test]
    fn nothing_cracked_is_an_error() {
        let store = Store::open_in_memory().unwrap();
        let err = run_estimator(
            &store,
            Algorithm::Argon2id,
            Path::new("unused.log"),
            &EstimatorSettings::default(),
            CrackTimePolicy::Overwrite,
            0,
        )
        .unwrap_err();
        assert!(matches!(err, EstimateError::NothingCracked(Algorithm::Argon2id)));
    }
}

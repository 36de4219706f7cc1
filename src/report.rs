//! Human-readable report rendering for terminal output.
//!
//! Produces a colored summary of hashing and cracking metrics, and the short
//! report printed after crack-time estimation.
use colored::*;

use crate::estimate::{EstimateReport, EstimateSource};
use crate::stats::{Histogram, Summary};

fn visible_len(s: &str) -> usize {
    // Strip ANSI escape sequences (\x1b[ ... m) to compute printable width
    let mut len = 0;
    let mut iter = s.chars().peekable();
    while let Some(ch) = iter.next() {
        if ch == '\u{1b}' {
            if let Some('[') = iter.peek().cloned() {
                let _ = iter.next();
            }
            for c in iter.by_ref() {
                if c == 'm' {
                    break;
                }
            }
        } else {
            len += 1;
        }
    }
    len
}

fn section_header(title: &str) -> String {
    let len = visible_len(title);
    let mut s = String::new();
    s.push('\n');
    s.push_str(title);
    s.push('\n');
    s.push_str(&"─".repeat(len));
    s.push_str("\n\n");
    s
}

pub fn render_summary(summary: &Summary) -> String {
    let mut out = String::new();
    let scope = match summary.algorithm {
        Some(a) => a.name().to_uppercase(),
        None => "All Algorithms".to_string(),
    };
    out.push_str(&format!(
        "{}\n",
        format!("Cracklab: {} Results", scope).bold().cyan()
    ));

    let stats_lines = [
        format!("Total Hashes: {}", summary.total_hashes),
        format!("Cracked: {}", summary.cracked),
        format!("Cracked Percentage: {:.2}%", summary.cracked_pct),
        format!("Average Hash Time: {:.3} ms", summary.avg_hash_ms),
        format!("Average Crack Time: {:.2} s", summary.avg_crack_time_s),
    ];
    out.push_str(&section_header(
        &"Hashing Statistics".bold().yellow().to_string(),
    ));
    for line in stats_lines {
        out.push_str(&line);
        out.push('\n');
    }

    let mut run_lines: Vec<String> = Vec::new();
    match &summary.latest_run {
        None => run_lines.push("(No crack runs recorded)".to_string()),
        Some(run) => {
            run_lines.push(format!("{}", run.run_name.bold().green()));
            run_lines.push(format!("  Mode: {}", run.hash_mode));
            if let Some(w) = &run.wordlist {
                run_lines.push(format!("  Wordlist: {}", w));
            }
            if let Some(h) = &run.hash_file {
                run_lines.push(format!("  Hash File: {}", h));
            }
            match run.duration_s {
                Some(d) => run_lines.push(format!("  Duration: {:.2} s", d)),
                None => run_lines.push(format!("  Duration: {}", "(unknown)".dimmed())),
            }
            run_lines.push(format!("  Recorded: {}", run.created_at));
        }
    }
    out.push_str(&section_header(
        &"Latest Crack Run".bold().magenta().to_string(),
    ));
    for line in run_lines {
        out.push_str(&line);
        out.push('\n');
    }

    if let Some(h) = &summary.hash_time_histogram {
        out.push_str(&section_header(
            &"Hash Latency (ms)".bold().blue().to_string(),
        ));
        out.push_str(&render_histogram(h));
    }
    if let Some(h) = &summary.crack_time_histogram {
        out.push_str(&section_header(
            &"Crack Times (s)".bold().blue().to_string(),
        ));
        out.push_str(&render_histogram(h));
    }

    out
}

const BAR_WIDTH: usize = 40;

/// One row per bin: `lo - hi | bar count`, bars scaled to the fullest bin.
pub fn render_histogram(h: &Histogram) -> String {
    let peak = h.counts.iter().copied().max().unwrap_or(0).max(1);
    let mut out = String::new();
    for (i, count) in h.counts.iter().enumerate() {
        let (lo, hi) = h.bin_edges(i);
        let bar_len = (*count as usize * BAR_WIDTH).div_ceil(peak as usize);
        out.push_str(&format!(
            "{:>12.3} - {:<12.3} | {} {}\n",
            lo,
            hi,
            "█".repeat(bar_len).green(),
            count
        ));
    }
    out
}

pub fn render_estimate(report: &EstimateReport) -> String {
    let mut out = String::new();
    match report.source {
        EstimateSource::StatusLog { snapshots } => {
            out.push_str(&format!("Parsed {} status updates from log\n", snapshots));
        }
        EstimateSource::Fallback => {
            out.push_str(&format!(
                "{}\n",
                "Could not use status log, crack times are evenly spaced estimates".yellow()
            ));
        }
    }
    out.push_str(&format!(
        "Updated {} of {} cracked hashes with estimated crack times\n",
        report.updated, report.cracked
    ));
    out.push_str(&format!("Average crack time: {:.2} seconds\n", report.stats.mean));
    out.push_str(&format!("Min crack time: {:.2} seconds\n", report.stats.min));
    out.push_str(&format!("Max crack time: {:.2} seconds\n", report.stats.max));
    out
}

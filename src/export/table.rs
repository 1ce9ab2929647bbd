//! Plain-text tables for terminal output.

use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::capabilities::known_capabilities;
use crate::runner::BenchmarkResult;

/// Renders the ranked results table.
pub fn render_results_table(results: &[BenchmarkResult]) -> String {
    let mut out = String::new();
    let width = provider_width(results);

    let _ = writeln!(
        out,
        "{:<4} {:<width$} {:>6} {:>5} {:>9} {:>6} {:>8} {:>6} {:>10} {:>6}",
        "Rank", "Provider", "Score", "Grade", "Time", "Calls", "Friction", "Errors", "Cost", "Caps"
    );
    let _ = writeln!(out, "{}", "-".repeat(width + 72));

    for (rank, r) in results.iter().enumerate() {
        let caps = if r.capabilities.is_empty() {
            "-".to_string()
        } else {
            format!("{:.0}%", r.capability_score * 100.0)
        };
        let _ = writeln!(
            out,
            "{:<4} {:<width$} {:>6.1} {:>5} {:>8.1}s {:>6} {:>8} {:>6} {:>10} {:>6}",
            rank + 1,
            r.provider,
            r.score(),
            r.grade().to_string(),
            r.total_time_seconds,
            r.tool_calls,
            r.friction_points,
            r.errors,
            format!("${:.4}", r.estimated_cost_usd),
            caps,
        );
    }

    out
}

/// Renders the capability matrix: one row per probed capability, one
/// column per provider. Cells are `Y`, `N` or `-` when not probed.
///
/// Returns an empty string when no result probed anything.
pub fn render_capability_matrix(results: &[BenchmarkResult]) -> String {
    let probed: BTreeSet<&str> = results
        .iter()
        .flat_map(|r| r.capabilities.keys().map(String::as_str))
        .collect();
    if probed.is_empty() {
        return String::new();
    }

    // Known capabilities first in their documented order, then anything else.
    let mut rows: Vec<&str> = known_capabilities().filter(|c| probed.contains(c)).collect();
    let extra: Vec<&str> = probed.iter().copied().filter(|c| !rows.contains(c)).collect();
    rows.extend(extra);

    let label_width = rows.iter().map(|c| c.len()).max().unwrap_or(0).max(10);
    let mut out = String::new();

    let _ = write!(out, "{:<label_width$}", "Capability");
    for r in results {
        let _ = write!(out, " {:^w$}", r.provider, w = r.provider.len().max(3));
    }
    out.push('\n');

    for capability in rows {
        let _ = write!(out, "{:<label_width$}", capability);
        for r in results {
            let cell = match r.capabilities.get(capability) {
                Some(true) => "Y",
                Some(false) => "N",
                None => "-",
            };
            let _ = write!(out, " {:^w$}", cell, w = r.provider.len().max(3));
        }
        out.push('\n');
    }

    out
}

fn provider_width(results: &[BenchmarkResult]) -> usize {
    results
        .iter()
        .map(|r| r.provider.len())
        .max()
        .unwrap_or(0)
        .max("Provider".len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results() -> Vec<BenchmarkResult> {
        let mut docker: BenchmarkResult =
            serde_json::from_value(sample_json("docker-image")).unwrap();
        docker.capabilities.insert("gcc".into(), true);
        docker.capabilities.insert("git".into(), false);
        let mut http: BenchmarkResult = serde_json::from_value(sample_json("http-agent")).unwrap();
        http.capabilities.insert("gcc".into(), false);
        vec![docker, http]
    }

    fn sample_json(provider: &str) -> serde_json::Value {
        serde_json::json!({
            "provider": provider,
            "success": true,
            "total_time_seconds": 12.5,
            "auth_time_seconds": 0.1,
            "create_time_seconds": 2.0,
            "execute_time_seconds": 0.3,
            "file_io_time_seconds": 0.2,
            "destroy_time_seconds": 0.4,
            "tool_calls": 6,
            "friction_points": 1,
            "errors": 0,
            "error_messages": [],
            "estimated_cost_usd": 0.0,
            "discoverability_score": 3.0,
            "capabilities": {},
            "capability_score": 0.5,
            "capability_conflicts": [],
            "suites_run": ["competitive"],
            "suite_results": [],
            "cold_start_seconds": null,
            "warm_start_seconds": null,
            "agent_spawn_seconds": null,
            "file_io_throughput_mbps": null,
            "score": 91.3,
            "grade": "A",
            "trace": []
        })
    }

    #[test]
    fn test_results_table_rows() {
        let table = render_results_table(&results());
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Rank"));
        assert!(lines[2].starts_with("1"));
        assert!(lines[2].contains("docker-image"));
        assert!(lines[2].contains("91.3"));
        assert!(lines[2].contains("50%"));
        assert!(lines[3].contains("http-agent"));
    }

    #[test]
    fn test_capability_matrix_cells() {
        let matrix = render_capability_matrix(&results());
        let lines: Vec<_> = matrix.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("docker-image"));
        let gcc = lines.iter().find(|l| l.starts_with("gcc")).unwrap();
        let git = lines.iter().find(|l| l.starts_with("git")).unwrap();
        assert_eq!(gcc.split_whitespace().skip(1).collect::<Vec<_>>(), vec!["Y", "N"]);
        assert_eq!(git.split_whitespace().skip(1).collect::<Vec<_>>(), vec!["N", "-"]);
    }

    #[test]
    fn test_capability_matrix_empty() {
        let mut plain = results();
        for r in &mut plain {
            r.capabilities.clear();
        }
        assert!(render_capability_matrix(&plain).is_empty());
    }
}

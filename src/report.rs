use std::fs;
use std::path::{Path, PathBuf};

use colored::*;

use crate::error::LoadError;
use crate::models::metrics::RunSummary;

pub fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "🔥 ======== TEST RESULTS ======== 🔥".bold().white().on_blue());
    println!("{} {}", "⏰ Timestamp                :".bold().blue(), summary.timestamp.bold());
    println!("{} {}", "🎯 Target                   :".bold().blue(), summary.target_url.bold());
    println!("{} {}", "👥 Peak virtual users       :".bold().blue(), summary.peak_vus.to_string().bold());
    println!("{} {}", "🔁 Iterations               :".bold().blue(), summary.iterations.to_string().bold());
    println!("{} {}", "✅ Total requests           :".bold().green(), summary.total_requests.to_string().bold());
    println!("{} {}", "❌ Failed requests          :".bold().red(), summary.failed_requests.to_string().bold());
    println!("{} {}", "🔌 Transport errors         :".bold().red(), summary.transport_errors.to_string().bold());
    println!("{} {}", "📈 Requests per second (RPS):".bold().blue(), format!("{:.2}", summary.throughput).bold());
    println!("{} {}", "⌛ Duration (s)             :".bold().blue(), format!("{:.2}", summary.duration_secs).bold());

    println!();
    println!("{}", "📦 ======== STATUS BREAKDOWN ========".bold().white().on_blue());
    println!("{}", format!("• 2xx: {}", summary.status_2xx).bold());
    println!("{}", format!("• 4xx: {}", summary.status_4xx).bold());
    println!("{}", format!("• 5xx: {}", summary.status_5xx).bold());
    println!("{}", format!("• other: {}", summary.status_other).bold());

    println!();
    println!("{}", "⚡ ======== ENDPOINTS (ms) ========".bold().white().on_blue());
    println!(
        "{:<32} {:>7} {:>9} {:>9} {:>9} {:>9} {:>10} {:>7}",
        "endpoint", "count", "min", "median", "p95", "max", "avg bytes", "errors"
    );
    for e in &summary.endpoints {
        let line = format!(
            "{:<32} {:>7} {:>9.1} {:>9.1} {:>9.1} {:>9.1} {:>10.0} {:>7}",
            e.name,
            e.latency_ms.count,
            e.latency_ms.min,
            e.latency_ms.median,
            e.latency_ms.p95,
            e.latency_ms.max,
            e.size_bytes.avg,
            e.transport_errors
        );
        if e.status_check_fails > 0 || e.transport_errors > 0 {
            println!("{}", line.red());
        } else if e.latency_check_fails > 0 {
            println!("{}", line.yellow());
        } else {
            println!("{}", line);
        }
    }

    println!();
    let total_checks = summary.checks_passed + summary.checks_failed;
    let rate = if total_checks > 0 {
        summary.checks_passed as f64 * 100.0 / total_checks as f64
    } else {
        100.0
    };
    let checks = format!(
        "✔ checks: {:.2}% ({} passed, {} failed)",
        rate, summary.checks_passed, summary.checks_failed
    );
    if summary.checks_ok() {
        println!("{}", checks.bold().green());
    } else {
        println!("{}", checks.bold().red());
    }

    println!(
        "{}",
        format!(
            "🖥  host: {} cores, {} MiB total, {} MiB available",
            summary.host.cpu_cores,
            summary.host.total_memory_bytes / (1024 * 1024),
            summary.host.available_memory_bytes / (1024 * 1024)
        )
        .dimmed()
    );
}

/// Writes the summary as pretty JSON, creating parent directories.
pub fn write_json_summary(summary: &RunSummary, path: &Path) -> Result<PathBuf, LoadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| LoadError::SummaryWrite {
            path: path.to_path_buf(),
            source,
        })?;
    }

    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).map_err(|source| LoadError::SummaryWrite {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(path.to_path_buf())
}

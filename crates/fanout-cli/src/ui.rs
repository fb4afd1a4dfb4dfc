//! Status lines and the build summary, written to stderr.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use console::Term;
use fanout_bundler::BuildReport;
use owo_colors::OwoColorize;

static COLORS: AtomicBool = AtomicBool::new(true);

/// Decide once whether output is colored: `--no-color` and `NO_COLOR` disable it,
/// `FORCE_COLOR` enables it, and otherwise stderr must be a terminal.
pub fn init_colors(no_color: bool) {
    COLORS.store(!no_color && should_use_color(), Ordering::Relaxed);
}

fn should_use_color() -> bool {
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if std::env::var_os("FORCE_COLOR").is_some() {
        return true;
    }
    console::user_attended_stderr()
}

fn colored() -> bool {
    COLORS.load(Ordering::Relaxed)
}

pub fn success(message: &str) {
    if colored() {
        eprintln!("{} {}", "✓".green().bold(), message);
    } else {
        eprintln!("✓ {message}");
    }
}

pub fn info(message: &str) {
    if colored() {
        eprintln!("{} {}", "ℹ".blue().bold(), message);
    } else {
        eprintln!("ℹ {message}");
    }
}

pub fn warning(message: &str) {
    if colored() {
        eprintln!("{} {}", "⚠".yellow().bold(), message.yellow());
    } else {
        eprintln!("⚠ {message}");
    }
}

/// Format file size in human-readable format.
///
/// ```
/// use fanout_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// Format duration in human-readable format.
///
/// ```
/// use std::time::Duration;
/// use fanout_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One line per written artifact with its size, facades marked with their target.
pub fn print_build_summary(report: &BuildReport) {
    let width = usize::from(Term::stderr().size().1).min(80);
    let rule = "─".repeat(width);

    if colored() {
        eprintln!("\n{}", "Build Summary".bold().underline());
    } else {
        eprintln!("\nBuild Summary");
    }
    eprintln!("{rule}");

    let mut total = 0;
    for artifact in &report.artifacts {
        let size = file_size(&report.out_dir.join(artifact));
        total += size;
        let name = artifact.display().to_string();
        let facade = report
            .facades
            .iter()
            .find(|facade| Path::new(&facade.path) == artifact.as_path())
            .map(|facade| format!(" → {}", facade.canonical))
            .unwrap_or_default();

        if colored() {
            eprintln!(
                "  {} {} {}{}",
                "▸".blue(),
                name.bright_white().bold(),
                format_size(size).dimmed(),
                facade.dimmed()
            );
        } else {
            eprintln!("  ▸ {name} {}{facade}", format_size(size));
        }
    }

    eprintln!("{rule}");
    eprintln!(
        "  {} files, {} ({} facades{})",
        report.artifacts.len(),
        format_size(total),
        report.facades.len(),
        if report.development {
            ", development pass"
        } else {
            ""
        }
    );
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1_048_576), "1.00 MB");
    }

    #[test]
    fn test_format_duration_minutes() {
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
    }
}

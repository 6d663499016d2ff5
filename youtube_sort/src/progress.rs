//! Progress reporting for the rebuild stage.

use std::io::Write;

use crate::builder::BuildReport;

const BAR_WIDTH: usize = 40;
const PROGRESS_TITLE_WIDTH: usize = 40;
const SKIP_TITLE_WIDTH: usize = 50;

/// Receives rebuild events as they happen.
pub trait BuildProgress {
    fn started(&mut self, _playlist_title: &str, _total: usize) {}
    fn inserted(&mut self, _done: usize, _total: usize, _title: &str) {}
    fn skipped(&mut self, _title: &str, _reason: &str) {}
    fn finished(&mut self, _report: &BuildReport) {}
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoProgress;

impl BuildProgress for NoProgress {}

/// Redraws a single progress line on stdout.
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl BuildProgress for ConsoleProgress {
    fn started(&mut self, playlist_title: &str, total: usize) {
        println!("Created new playlist: \"{playlist_title}\"");
        println!("Adding {total} videos in chronological order...");
    }

    fn inserted(&mut self, done: usize, total: usize, title: &str) {
        print!(
            "\r{} {:3}/{} - {}",
            render_progress_bar(done, total, BAR_WIDTH),
            done,
            total,
            truncate_title(title, PROGRESS_TITLE_WIDTH)
        );
        let _ = std::io::stdout().flush();
    }

    fn skipped(&mut self, title: &str, reason: &str) {
        println!(
            "\nSkipped \"{}\": {}",
            truncate_title(title, SKIP_TITLE_WIDTH),
            reason
        );
    }

    fn finished(&mut self, report: &BuildReport) {
        println!();
        if !report.is_complete() {
            println!(
                "{} of {} videos could not be added",
                report.skipped.len(),
                report.total()
            );
        }
    }
}

/// Shortens `title` to at most `max` characters, ending in `...` when cut.
pub fn truncate_title(title: &str, max: usize) -> String {
    if title.chars().count() <= max {
        return title.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut short: String = title.chars().take(keep).collect();
    short.push_str("...");
    short
}

pub fn render_progress_bar(current: usize, total: usize, width: usize) -> String {
    if total == 0 {
        return format!("[{}]", " ".repeat(width));
    }
    let filled = (current.min(total) * width) / total;
    format!("[{}{}]", "█".repeat(filled), " ".repeat(width - filled))
}

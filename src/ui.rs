//! Terminal output: banners, section headers, and the pull progress bar.

use colored::Colorize;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::images::PullProgress;

const BAR_WIDTH: usize = 30;
const HEADER_WIDTH: usize = 38;
const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Boxed section header, truncating titles that do not fit.
pub fn section_header(title: &str) {
    let inner = HEADER_WIDTH - 2;
    let title: String = title.chars().take(inner).collect();
    let pad = inner - title.chars().count();

    println!("{}", format!("┌{}┐", "─".repeat(HEADER_WIDTH)).magenta().bold());
    println!(
        "{}",
        format!("│ {}{} │", title, " ".repeat(pad)).magenta().bold()
    );
    println!("{}", format!("└{}┘", "─".repeat(HEADER_WIDTH)).magenta().bold());
}

/// Banner for clearing every level.
pub fn completion_banner() {
    let rule = "━".repeat(48);
    println!("\n{}", rule.green().bold());
    println!("{}", "  🎉 Congratulations! You completed the WARGAMES! 🎉".green().bold());
    println!("{}", rule.green().bold());
}

/// Banner for ending a session with levels left.
pub fn try_again_banner() {
    let rule = "━".repeat(48);
    println!("\n{}", rule.green().bold());
    println!("{}", "                    Try Again                    ".green().bold());
    println!("{}", rule.green().bold());
}

/// Redraw a progress bar from the shared pull counter until `done` flips.
///
/// Spawned as a detached task for the duration of the blocking image phase;
/// the counter is its only link to the puller.
pub async fn progress_indicator(
    progress: Arc<PullProgress>,
    expected: usize,
    done: Arc<AtomicBool>,
) {
    let mut ticker = tokio::time::interval(Duration::from_millis(200));
    let mut frame = 0usize;

    while !done.load(Ordering::Relaxed) {
        ticker.tick().await;

        let completed = progress.completed().min(expected);
        let filled = if expected == 0 {
            BAR_WIDTH
        } else {
            completed * BAR_WIDTH / expected
        };
        let percent = if expected == 0 {
            100.0
        } else {
            completed as f64 / expected as f64 * 100.0
        };

        print!(
            "\r[{}{}] {:.1}% {} ({}/{}) ",
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            percent,
            SPINNER[frame % SPINNER.len()],
            completed,
            expected,
        );
        let _ = io::stdout().flush();
        frame += 1;
    }

    // Clear the bar before the final line.
    print!("\r{}\r", " ".repeat(BAR_WIDTH + 24));
    println!("Levels pulled successfully!");
    let _ = io::stdout().flush();
}

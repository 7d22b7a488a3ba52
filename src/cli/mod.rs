//! CLI command definitions and terminal status lines.
//!
//! Argument types live in [`args`]. Status lines go to stderr so stdout
//! stays machine-readable (lists, handles, the pipeline summary).

pub mod args;

use colored::Colorize;
use std::io::Write;

/// Print a success line (`  ✔ msg`) to stderr.
pub fn status_ok(msg: impl AsRef<str>) {
    status_line(&"✔".green().bold().to_string(), msg.as_ref());
}

/// Print an informational line (`  ℹ msg`) to stderr.
pub fn status_info(msg: impl AsRef<str>) {
    status_line(&"ℹ".dimmed().to_string(), &msg.as_ref().dimmed().to_string());
}

/// Print a warning line (`  ⚠ msg`) to stderr.
pub fn status_warn(msg: impl AsRef<str>) {
    status_line(
        &"⚠".yellow().bold().to_string(),
        &msg.as_ref().yellow().to_string(),
    );
}

/// Print a failure line (`  ✖ msg`) to stderr.
pub fn status_fail(msg: impl AsRef<str>) {
    status_line(&"✖".red().bold().to_string(), &msg.as_ref().red().to_string());
}

fn status_line(symbol: &str, msg: &str) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle, "  {symbol} {msg}");
    let _ = handle.flush();
}

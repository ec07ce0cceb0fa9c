// Output formatting helpers for CLI commands

/// Print a right-aligned action word and its subject
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print a passed validation step
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Print a dim/muted message
pub fn dim(message: &str) {
    eprintln!("\x1b[2m{}\x1b[0m", message);
}

pub fn dim_success(message: &str) {
    eprintln!("\x1b[32m{}\x1b[0m", message);
}

/// Print a stage header: process, stage and how it runs
pub fn stage_header(process: &str, stage: &str, runner: &str) {
    eprintln!("\x1b[1;34m  Stage\x1b[0m {}/{} ({})", process, stage, runner);
}

/// Print one weekly batch as a table row on stdout
pub fn batch_row(index: usize, days: &str, files: usize) {
    println!("    #{:<3} {:<28} {} files", index, days, files);
}

/// Print which cluster a run dispatches to
pub fn backend(ownership: &str, address: &str) {
    eprintln!("\x1b[35m  @\x1b[0m {} cluster at {}", ownership, address);
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("\x1b[1m==> {}\x1b[0m", message);
}

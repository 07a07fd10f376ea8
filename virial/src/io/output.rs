//! Logging setup
//!
//! Log lines are stamped with the wall time elapsed since the run started, so
//! the cost of equilibration and of each chain can be read off the log.

use color_eyre::eyre::{Result, WrapErr};
use std::fmt;
use std::fs::File;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::{
    fmt::format::Writer, fmt::layer, fmt::time::FormatTime, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

/// Stamps log lines with the time since the run started, to the second
#[derive(Debug, Clone, Copy)]
struct RunClock {
    start: Instant,
}

impl RunClock {
    fn start() -> Self {
        RunClock { start: Instant::now() }
    }
}

impl FormatTime for RunClock {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", format_elapsed(self.start.elapsed()))
    }
}

/// `+HH:MM:SS`; hours keep counting past a day
fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!("+{:02}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Send log output to a file, or to stdout when no path is given
pub fn setup_output(output_path: Option<&String>) -> Result<()> {
    let clock = RunClock::start();
    match output_path {
        Some(path) => {
            let log = File::create(path).wrap_err_with(|| format!("Could not create output file {}", path))?;
            let file_layer = layer().with_writer(log).with_timer(clock).with_ansi(false);
            Registry::default().with(file_layer).init();
            info!("Output will be written to: {}", path);
        }
        None => {
            let stdout_layer = layer().with_writer(std::io::stdout).with_timer(clock).with_ansi(true);
            Registry::default().with(stdout_layer).init();
            info!("Output will be printed to stdout");
        }
    }
    Ok(())
}

//! Input/Output operations for sampling runs

mod output;

pub use output::setup_output;

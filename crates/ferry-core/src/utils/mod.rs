//! Small shared helpers.

pub mod format;

pub use format::{format_eta, format_file_size, format_speed};

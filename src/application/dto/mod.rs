//! Data Transfer Objects

mod scan_options;

pub use scan_options::ScanOptions;

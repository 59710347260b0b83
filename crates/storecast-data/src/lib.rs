#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/storecast/storecast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod loader;
pub mod schema;

pub use error::{DataError, Result};
pub use loader::{
    DEFAULT_COMPETITION_DISTANCE_FILL, LoaderConfig, PrepareReport, drop_unused_columns,
    impute_competition_distance, load_and_merge, load_reference, load_transactions, merge,
    prepare, read_csv, unmatched_rows,
};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}

#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/storecast/storecast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod calendar;
pub mod dates;
pub mod encoder;
pub mod error;
pub mod extractor;
pub mod registry;

pub use calendar::{HolidayCalendar, NO_HOLIDAY, NO_UPCOMING_HOLIDAY};
pub use encoder::{
    CategoricalEncoder, ColumnEncoders, EncodeReport, EncodingTable, UnknownCategoryPolicy,
    normalize_holiday,
};
pub use error::{FeatureError, Result};
pub use extractor::{
    ExtractionReport, FeatureConfig, FeatureExtractor, FeatureFrame, MonthPosition,
    WeekdayConvention,
};

// Re-export registry types for convenience
pub use registry::{
    FeatureCategory, FeatureInfo, available_features, features_by_category, get_feature_info,
};

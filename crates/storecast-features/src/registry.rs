//! Feature Registry
//!
//! Describes every derived feature: its output column, what it measures and
//! which input columns it reads.

use crate::extractor::{
    DAYS_AFTER_HOLIDAY, DAYS_SINCE_START_OF_YEAR, DAYS_TO_NEXT_HOLIDAY, MONTH_POSITION,
    SALES_GROWTH_RATE, WEEKEND,
};
use storecast_data::schema::{DATE, DAY_OF_WEEK, SALES, STATE_HOLIDAY};

/// Available feature groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureCategory {
    /// Calendar position features (weekend, month position, day of year)
    Calendar,
    /// Distances to holidays
    Holiday,
    /// Features read from the sales target itself
    Sales,
}

/// Feature metadata
#[derive(Debug, Clone)]
pub struct FeatureInfo {
    /// Output column name (unique identifier)
    pub name: &'static str,
    /// Feature group
    pub category: FeatureCategory,
    /// Brief description of what the feature measures
    pub description: &'static str,
    /// Input columns read
    pub required_columns: &'static [&'static str],
    /// Whether the model may use it (false when it reads the target)
    pub model_input: bool,
}

/// Get all available feature info
pub fn available_features() -> Vec<FeatureInfo> {
    vec![
        FeatureInfo {
            name: WEEKEND,
            category: FeatureCategory::Calendar,
            description: "1 on Saturday and Sunday, 0 otherwise",
            required_columns: &[DAY_OF_WEEK],
            model_input: true,
        },
        FeatureInfo {
            name: MONTH_POSITION,
            category: FeatureCategory::Calendar,
            description: "Start (days 1-10), Mid (11-20) or End (21+) of the month, encoded",
            required_columns: &[DATE],
            model_input: true,
        },
        FeatureInfo {
            name: DAYS_SINCE_START_OF_YEAR,
            category: FeatureCategory::Calendar,
            description: "Days since January 1 of the same year",
            required_columns: &[DATE],
            model_input: true,
        },
        FeatureInfo {
            name: DAYS_TO_NEXT_HOLIDAY,
            category: FeatureCategory::Holiday,
            description: "Days until the next state holiday, -1 if none is known",
            required_columns: &[DATE, STATE_HOLIDAY],
            model_input: true,
        },
        FeatureInfo {
            name: DAYS_AFTER_HOLIDAY,
            category: FeatureCategory::Holiday,
            description: "Days since the most recent state holiday, missing if none",
            required_columns: &[DATE, STATE_HOLIDAY],
            model_input: true,
        },
        FeatureInfo {
            name: SALES_GROWTH_RATE,
            category: FeatureCategory::Sales,
            description: "Percentage change of sales from the previous row",
            required_columns: &[SALES],
            model_input: false,
        },
    ]
}

/// Get feature info by column name
pub fn get_feature_info(name: &str) -> Option<FeatureInfo> {
    available_features().into_iter().find(|f| f.name == name)
}

/// Get all features in a category
pub fn features_by_category(category: FeatureCategory) -> Vec<FeatureInfo> {
    available_features()
        .into_iter()
        .filter(|f| f.category == category)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{FeatureConfig, FeatureExtractor};
    use std::collections::HashSet;

    #[test]
    fn test_names_are_unique() {
        let features = available_features();
        let names: HashSet<_> = features.iter().map(|f| f.name).collect();
        assert_eq!(names.len(), features.len());
    }

    #[test]
    fn test_registry_matches_extractor_outputs() {
        let extractor = FeatureExtractor::new(FeatureConfig {
            sales_growth: true,
            ..Default::default()
        });
        let registered: HashSet<_> = available_features().iter().map(|f| f.name).collect();
        let produced: HashSet<_> = extractor.output_columns().into_iter().collect();
        assert_eq!(registered, produced);
    }

    #[test]
    fn test_only_sales_growth_is_excluded_from_model() {
        let excluded: Vec<_> = available_features()
            .into_iter()
            .filter(|f| !f.model_input)
            .map(|f| f.name)
            .collect();
        assert_eq!(excluded, vec![SALES_GROWTH_RATE]);
    }

    #[test]
    fn test_lookup_and_category() {
        assert!(get_feature_info(WEEKEND).is_some());
        assert!(get_feature_info("Nope").is_none());
        assert_eq!(features_by_category(FeatureCategory::Holiday).len(), 2);
    }
}

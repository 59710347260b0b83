//! Single-row prediction requests.
//!
//! A request carries the transaction fields known ahead of the day being
//! forecast; store attributes come from the reference table when one is
//! given.

use crate::error::{PipelineError, Result};
use crate::pipeline::{FittedPipeline, Prediction};
use polars::prelude::*;
use serde::{Deserialize, Deserializer, Serialize};
use storecast_data::{merge, unmatched_rows};
use storecast_data::schema::{DATE, DAY_OF_WEEK, OPEN, PROMO, SCHOOL_HOLIDAY, STATE_HOLIDAY, STORE};
use tracing::{debug, warn};

/// One store-day to forecast
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRequest {
    /// Store identifier
    pub store_id: i64,
    /// Day of the week as recorded in the transaction table
    pub day_of_week: i64,
    /// Date, `YYYY-MM-DD`
    pub date: String,
    /// 1 if the store is open
    pub open_store: i64,
    /// 1 if a promotion runs
    pub promo: i64,
    /// Holiday indicator (`0`, `a`, `b` or `c`); numbers are accepted
    #[serde(deserialize_with = "string_or_number")]
    pub state_holiday: String,
    /// 1 if schools are closed
    pub school_holiday: i64,
}

impl PredictionRequest {
    /// Single-row frame with the transaction column names.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let df = DataFrame::new(vec![
            Column::new(STORE.into(), [self.store_id]),
            Column::new(DAY_OF_WEEK.into(), [self.day_of_week]),
            Column::new(DATE.into(), [self.date.as_str()]),
            Column::new(OPEN.into(), [self.open_store]),
            Column::new(PROMO.into(), [self.promo]),
            Column::new(STATE_HOLIDAY.into(), [self.state_holiday.as_str()]),
            Column::new(SCHOOL_HOLIDAY.into(), [self.school_holiday]),
        ])?;
        Ok(df)
    }
}

/// Forecast for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Store the forecast is for
    pub store_id: i64,
    /// Predicted target value
    pub predicted_sales: f64,
}

/// Failure reported in place of a [`PredictionResponse`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
}

impl ErrorResponse {
    /// Wrap any displayable error.
    pub fn new(error: impl std::fmt::Display) -> Self {
        Self {
            error: error.to_string(),
        }
    }
}

/// Forecast one request, joining store attributes from `reference` if given.
///
/// A store missing from `reference` is rejected rather than scored with
/// imputed attributes.
pub fn predict_one(
    model: &FittedPipeline,
    request: &PredictionRequest,
    reference: Option<&DataFrame>,
) -> Result<PredictionResponse> {
    let frame = request.to_frame()?;
    let frame = match reference {
        Some(reference) => {
            if unmatched_rows(&frame, reference)? > 0 {
                return Err(PipelineError::UnknownStore {
                    store: request.store_id,
                });
            }
            merge(&frame, reference)?
        }
        None => frame,
    };

    let Prediction { values, diagnostics } = model.predict_with_diagnostics(&frame)?;
    let predicted_sales = values[0];
    if diagnostics.scale.imputed > 0 || diagnostics.encode.fallbacks > 0 {
        warn!(
            store = request.store_id,
            imputed = diagnostics.scale.imputed,
            fallbacks = diagnostics.encode.fallbacks,
            "Prediction request needed imputed or fallback inputs"
        );
    }
    debug!(store = request.store_id, date = %request.date, predicted_sales, "Answered prediction request");

    Ok(PredictionResponse {
        store_id: request.store_id,
        predicted_sales,
    })
}

fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Integer(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Integer(n) => n.to_string(),
    })
}

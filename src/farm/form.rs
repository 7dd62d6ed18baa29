use std::{cell::RefCell, rc::Rc};

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    api::{
        farms::{Farm, FarmApiClient, FarmPayload},
        http::{ApiError, HttpTransport},
        session::Session,
    },
    geofile::feature::to_feature_collection,
};

const FALLBACK_FAILURE: &str = "Failed to add farm. Please try again.";

#[derive(Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FarmDetails {
    pub rice_type: String,
    pub water_source: String,
    /// Harvest start date, `YYYY-MM-DD`.
    #[serde(rename = "H_start_date")]
    pub h_start_date: String,
}

impl FarmDetails {
    fn is_complete(&self) -> bool {
        [&self.rice_type, &self.water_source, &self.h_start_date]
            .iter()
            .all(|field| !field.trim().is_empty())
    }
}

#[derive(Debug, Error)]
pub enum FormError {
    #[error("Session expired. Please log in again.")]
    SessionExpired,
    #[error("Please fill all fields and draw a farm on the map.")]
    Incomplete,
    #[error("Invalid harvest start date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("{}", api_failure_message(.0))]
    Api(#[source] ApiError),
}

fn api_failure_message(err: &ApiError) -> String {
    match err {
        ApiError::Status {
            detail: Some(detail),
            ..
        } => detail.clone(),
        _ => FALLBACK_FAILURE.to_string(),
    }
}

/// Farm registration form. It follows the boundary editor through
/// [`FarmForm::listener`] and submits the latest drawn plots with its fields.
pub struct FarmForm {
    farmer_id: i64,
    pub details: FarmDetails,
    editing_farm: Option<u64>,
    latest: Rc<RefCell<geojson::FeatureCollection>>,
}

impl FarmForm {
    pub fn new(farmer_id: i64) -> Self {
        Self {
            farmer_id,
            details: FarmDetails::default(),
            editing_farm: None,
            latest: Rc::new(RefCell::new(to_feature_collection(std::iter::empty()))),
        }
    }

    /// Switch to editing an existing farm. Returns its plots so they can seed the
    /// editor.
    pub fn edit(&mut self, farm: &Farm) -> Vec<geojson::Feature> {
        self.editing_farm = Some(farm.id);
        self.details = FarmDetails {
            rice_type: farm.rice_type.clone(),
            water_source: farm.water_source.clone(),
            h_start_date: farm.h_start_date.clone(),
        };
        let features = farm
            .geojson
            .as_ref()
            .map(|collection| collection.features.clone())
            .unwrap_or_default();
        *self.latest.borrow_mut() = to_feature_collection(&features);
        features
    }

    pub fn editing_farm(&self) -> Option<u64> {
        self.editing_farm
    }

    /// Change callback to hand to the boundary editor.
    pub fn listener(&self) -> impl FnMut(&geojson::FeatureCollection) + 'static {
        let latest = Rc::clone(&self.latest);
        move |collection| {
            *latest.borrow_mut() = collection.clone();
        }
    }

    /// Replace the plots to submit. Used after seeding the editor, which does not
    /// notify its listener on initialize.
    pub fn sync_plots(&self, collection: &geojson::FeatureCollection) {
        *self.latest.borrow_mut() = collection.clone();
    }

    pub fn plot_count(&self) -> usize {
        self.latest.borrow().features.len()
    }

    /// Create the farm, or update it when editing. On success the fields are reset;
    /// clearing the drawn plots is left to the editor, whose callback empties the
    /// stored collection.
    pub fn submit<T: HttpTransport>(
        &mut self,
        client: &FarmApiClient<T>,
        session: Option<&Session>,
    ) -> Result<Farm, FormError> {
        let session = session.ok_or(FormError::SessionExpired)?;
        if !self.details.is_complete() || self.plot_count() == 0 {
            return Err(FormError::Incomplete);
        }
        let h_start_date =
            NaiveDate::parse_from_str(self.details.h_start_date.trim(), "%Y-%m-%d")
                .map_err(|_| FormError::InvalidDate(self.details.h_start_date.clone()))?;
        let payload = FarmPayload {
            farmer_id: self.farmer_id,
            rice_type: self.details.rice_type.trim().to_string(),
            water_source: self.details.water_source.trim().to_string(),
            h_start_date,
            geojson: self.latest.borrow().clone(),
        };

        let result = match self.editing_farm {
            Some(farm_id) => client.update_farm(session, farm_id, &payload),
            None => client.create_farm(session, &payload),
        };
        let farm = result.map_err(|err| {
            log::error!("Farm submission failed: {}", err);
            FormError::Api(err)
        })?;
        log::info!("Saved farm {} for farmer {}", farm.id, self.farmer_id);
        self.details = FarmDetails::default();
        self.editing_farm = None;
        Ok(farm)
    }
}

use chrono::NaiveDate;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::{
    crop::CropIndexRecord,
    http::{ApiError, ApiRequest, HttpTransport, Method},
    session::Session,
};

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ApiConfig {
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Body of a farm create/update call. Field names are fixed by the backend.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FarmPayload {
    pub farmer_id: i64,
    pub rice_type: String,
    pub water_source: String,
    #[serde(rename = "H_start_date")]
    pub h_start_date: NaiveDate,
    pub geojson: geojson::FeatureCollection,
}

/// A farm as stored by the backend.
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct Farm {
    pub id: u64,
    #[serde(default)]
    pub custom_farm_id: Option<String>,
    pub rice_type: String,
    pub water_source: String,
    #[serde(rename = "H_start_date")]
    pub h_start_date: String,
    #[serde(default)]
    pub acres: Option<serde_json::Value>,
    #[serde(default)]
    pub geojson: Option<geojson::FeatureCollection>,
    #[serde(default)]
    pub pdfs: Vec<serde_json::Value>,
}

pub struct FarmApiClient<T: HttpTransport> {
    base_url: String,
    transport: T,
}

impl<T: HttpTransport> FarmApiClient<T> {
    pub fn new(config: &ApiConfig, transport: T) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            transport,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn call(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<String, ApiError> {
        let request = ApiRequest {
            method,
            url: self.url(path),
            authorization: session.authorization(),
            body,
        };
        let response = self.transport.send(&request)?;
        if !response.is_success() {
            log::warn!(
                "{} {} answered {}",
                request.method,
                request.url,
                response.status
            );
            return Err(ApiError::Status {
                status: response.status,
                detail: error_detail(&response.body),
            });
        }
        Ok(response.body)
    }

    fn call_json<R: DeserializeOwned>(
        &self,
        session: &Session,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<R, ApiError> {
        let body = self.call(session, method, path, body)?;
        Ok(serde_json::from_str(&body)?)
    }

    pub fn list_farms(&self, session: &Session, farmer_id: i64) -> Result<Vec<Farm>, ApiError> {
        self.call_json(
            session,
            Method::Get,
            &format!("analyze/farms/{}/", farmer_id),
            None,
        )
    }

    pub fn create_farm(&self, session: &Session, payload: &FarmPayload) -> Result<Farm, ApiError> {
        log::info!(
            "Creating farm with {} plots for farmer {}",
            payload.geojson.features.len(),
            payload.farmer_id
        );
        self.call_json(
            session,
            Method::Post,
            &format!("analyze/farms/{}/", payload.farmer_id),
            Some(serde_json::to_string(payload)?),
        )
    }

    pub fn update_farm(
        &self,
        session: &Session,
        farm_id: u64,
        payload: &FarmPayload,
    ) -> Result<Farm, ApiError> {
        log::info!("Updating farm {} of farmer {}", farm_id, payload.farmer_id);
        self.call_json(
            session,
            Method::Patch,
            &farm_path(payload.farmer_id, farm_id),
            Some(serde_json::to_string(payload)?),
        )
    }

    pub fn delete_farm(
        &self,
        session: &Session,
        farmer_id: i64,
        farm_id: u64,
    ) -> Result<(), ApiError> {
        self.call(
            session,
            Method::Delete,
            &farm_path(farmer_id, farm_id),
            None,
        )?;
        Ok(())
    }

    /// Run the backend analysis: rasterize the farm map, compute the indices, then
    /// render the PDF report. Stops at the first failing step.
    pub fn analyze_farm(
        &self,
        session: &Session,
        farmer_id: i64,
        farm_id: u64,
    ) -> Result<serde_json::Value, ApiError> {
        let steps = [
            (
                "Draw map",
                format!("analyze/api/farms/{}/farmers/{}/draw-map/", farm_id, farmer_id),
            ),
            (
                "Analyze farm",
                format!("analyze/farmers/{}/farm/{}/", farmer_id, farm_id),
            ),
            (
                "Generate PDF",
                format!("analyze/generatepdf/farmer/{}/farm/{}/", farmer_id, farm_id),
            ),
        ];
        let mut last_body = String::new();
        for &(step, ref path) in steps.iter() {
            log::info!("{} for farm {}", step, farm_id);
            last_body = self
                .call(session, Method::Post, path, None)
                .map_err(|source| ApiError::Step {
                    step,
                    source: Box::new(source),
                })?;
        }
        Ok(serde_json::from_str(&last_body)?)
    }

    /// Send the analysis results to the farmer by SMS, then by voice call.
    pub fn send_notifications(
        &self,
        session: &Session,
        farmer_id: i64,
        farm_id: u64,
    ) -> Result<(), ApiError> {
        let steps = [
            (
                "SMS notification",
                format!("analyze/sms/send/farm/{}/farmer/{}/", farm_id, farmer_id),
            ),
            (
                "Voice notification",
                format!(
                    "analyze/notify_analysis_results/farm/{}/farmer/{}/",
                    farm_id, farmer_id
                ),
            ),
        ];
        for &(step, ref path) in steps.iter() {
            self.call(session, Method::Get, path, None)
                .map_err(|source| ApiError::Step {
                    step,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }

    /// Vegetation index history of a farm, newest first.
    pub fn crop_performance(
        &self,
        session: &Session,
        farmer_id: i64,
        farm_id: u64,
    ) -> Result<Vec<CropIndexRecord>, ApiError> {
        self.call_json(
            session,
            Method::Get,
            &format!("analyze/crop-dash/{}/farm/{}/", farmer_id, farm_id),
            None,
        )
    }
}

fn farm_path(farmer_id: i64, farm_id: u64) -> String {
    format!("analyze/update/farmers/{}/farm/{}/", farmer_id, farm_id)
}

/// The backend reports errors as `{"detail": ...}` or `{"message": ...}`.
fn error_detail(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["detail", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(|detail| detail.to_string())
}

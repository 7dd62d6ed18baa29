use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VegetationIndex {
    Ndvi,
    Ndre,
    Ndmi,
    Ndwi,
    Ci,
}

impl VegetationIndex {
    pub const ALL: [VegetationIndex; 5] = [
        VegetationIndex::Ndvi,
        VegetationIndex::Ndre,
        VegetationIndex::Ndmi,
        VegetationIndex::Ndwi,
        VegetationIndex::Ci,
    ];

    /// Field name used by the backend.
    pub fn key(&self) -> &'static str {
        match self {
            VegetationIndex::Ndvi => "ndvi",
            VegetationIndex::Ndre => "ndre",
            VegetationIndex::Ndmi => "ndmi",
            VegetationIndex::Ndwi => "ndwi",
            VegetationIndex::Ci => "ci",
        }
    }

    pub fn label(&self) -> String {
        self.key().to_uppercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexStatus {
    Good,
    Average,
    Bad,
    Unknown,
}

impl IndexStatus {
    pub fn parse(status: &str) -> Self {
        match status.trim().to_lowercase().as_str() {
            "good" => IndexStatus::Good,
            "average" => IndexStatus::Average,
            "bad" => IndexStatus::Bad,
            _ => IndexStatus::Unknown,
        }
    }
}

/// One weekly vegetation index snapshot of a farm.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct CropIndexRecord {
    pub farm: Option<u64>,
    pub user_name: Option<String>,
    pub overall_health: Option<String>,
    pub ndvi: f64,
    pub ndvi_status: Option<String>,
    pub ndvi_change: Option<f64>,
    pub ndre: f64,
    pub ndre_status: Option<String>,
    pub ndre_change: Option<f64>,
    pub ndmi: f64,
    pub ndmi_status: Option<String>,
    pub ndmi_change: Option<f64>,
    pub ndwi: f64,
    pub ndwi_status: Option<String>,
    pub ndwi_change: Option<f64>,
    pub ci: f64,
    pub ci_status: Option<String>,
    pub ci_change: Option<f64>,
}

impl CropIndexRecord {
    pub fn value(&self, index: VegetationIndex) -> f64 {
        match index {
            VegetationIndex::Ndvi => self.ndvi,
            VegetationIndex::Ndre => self.ndre,
            VegetationIndex::Ndmi => self.ndmi,
            VegetationIndex::Ndwi => self.ndwi,
            VegetationIndex::Ci => self.ci,
        }
    }

    pub fn status(&self, index: VegetationIndex) -> IndexStatus {
        let status = match index {
            VegetationIndex::Ndvi => &self.ndvi_status,
            VegetationIndex::Ndre => &self.ndre_status,
            VegetationIndex::Ndmi => &self.ndmi_status,
            VegetationIndex::Ndwi => &self.ndwi_status,
            VegetationIndex::Ci => &self.ci_status,
        };
        status
            .as_deref()
            .map_or(IndexStatus::Unknown, IndexStatus::parse)
    }

    pub fn change(&self, index: VegetationIndex) -> Option<f64> {
        match index {
            VegetationIndex::Ndvi => self.ndvi_change,
            VegetationIndex::Ndre => self.ndre_change,
            VegetationIndex::Ndmi => self.ndmi_change,
            VegetationIndex::Ndwi => self.ndwi_change,
            VegetationIndex::Ci => self.ci_change,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrendSeries {
    pub label: String,
    pub points: Vec<(String, f64)>,
}

/// Weekly series of one index, in record order.
pub fn trend(records: &[CropIndexRecord], index: VegetationIndex) -> TrendSeries {
    TrendSeries {
        label: index.label(),
        points: records
            .iter()
            .enumerate()
            .map(|(i, record)| (format!("Week {}", i + 1), record.value(index)))
            .collect(),
    }
}

/// All indices of the latest record as percentages.
pub fn radar(records: &[CropIndexRecord]) -> Option<[(VegetationIndex, f64); 5]> {
    let latest = records.first()?;
    Some(VegetationIndex::ALL.map(|index| (index, latest.value(index) * 100.0)))
}

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::clinical::{BiomarkerStatus, Ecog, Karnofsky};
use super::protocol::{ProtocolId, TreatmentIntent, TreatmentLine};

/// Identifier wrapper for patients submitted to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatientId(pub String);

/// Structured patient record consumed read-only for the duration of one matching request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub patient_id: PatientId,
    pub demographics: Demographics,
    pub disease: DiseaseStatus,
    pub performance: PerformanceMetrics,
    #[serde(default)]
    pub treatment_history: Vec<TreatmentExposure>,
    #[serde(default)]
    pub laboratory: LaboratoryValues,
    #[serde(default)]
    pub genetics: GeneticProfile,
    #[serde(default)]
    pub comorbidities: Vec<Comorbidity>,
    #[serde(default)]
    pub allergies: Vec<Allergy>,
    #[serde(default)]
    pub current_medications: Vec<Medication>,
    #[serde(default)]
    pub preferences: CarePreferences,
}

impl PatientProfile {
    pub fn is_treatment_naive(&self) -> bool {
        self.treatment_history.is_empty()
    }

    /// Looks up a biomarker result by case-insensitive name.
    ///
    /// MSI and TMB fall back to the genetic profile when the disease record has no entry.
    pub fn biomarker(&self, name: &str) -> Option<BiomarkerResult> {
        let key = name.trim().to_ascii_uppercase();
        if let Some(result) = self
            .disease
            .biomarkers
            .iter()
            .find(|(marker, _)| marker.trim().to_ascii_uppercase() == key)
            .map(|(_, result)| result.clone())
        {
            return Some(result);
        }

        match key.as_str() {
            "MSI" | "MSI-H" | "MSI_H" => self.genetics.msi_status.as_biomarker(),
            "TMB" | "TMB-H" | "TMB_H" => self.genetics.tmb.map(|tmb| BiomarkerResult {
                status: if tmb >= TMB_HIGH_THRESHOLD {
                    BiomarkerStatus::Positive
                } else {
                    BiomarkerStatus::Negative
                },
                tested_on: None,
                value: Some(tmb),
            }),
            _ => None,
        }
    }

    /// Every free-text term that can trigger a comorbidity or allergy contraindication.
    pub fn comorbidity_terms(&self) -> impl Iterator<Item = &str> {
        self.comorbidities
            .iter()
            .map(|condition| condition.condition.as_str())
    }
}

/// Mutations per megabase at or above which TMB is reported as high.
pub const TMB_HIGH_THRESHOLD: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: u8,
    pub sex: Sex,
    #[serde(default)]
    pub bmi: Option<f32>,
    #[serde(default)]
    pub smoking: SmokingStatus,
    #[serde(default)]
    pub alcohol: AlcoholUse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sex {
    Female,
    Male,
    Other,
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SmokingStatus {
    Never,
    Former,
    Current,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlcoholUse {
    None,
    Moderate,
    Heavy,
    #[default]
    Unknown,
}

/// Disease snapshot: cancer type, stage and molecular findings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseStatus {
    pub cancer_type_id: String,
    pub stage: String,
    #[serde(default)]
    pub histology: Option<String>,
    #[serde(default)]
    pub biomarkers: BTreeMap<String, BiomarkerResult>,
    #[serde(default)]
    pub metastatic_sites: Vec<String>,
    #[serde(default)]
    pub burden: DiseaseBurden,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiomarkerResult {
    pub status: BiomarkerStatus,
    #[serde(default)]
    pub tested_on: Option<NaiveDate>,
    #[serde(default)]
    pub value: Option<f64>,
}

impl BiomarkerResult {
    pub fn new(status: BiomarkerStatus) -> Self {
        Self {
            status,
            tested_on: None,
            value: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiseaseBurden {
    Minimal,
    Low,
    Moderate,
    High,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub ecog: Ecog,
    pub karnofsky: Karnofsky,
    pub assessed_on: NaiveDate,
}

/// One prior protocol exposure, in treatment order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentExposure {
    pub protocol_id: ProtocolId,
    pub line: TreatmentLine,
    #[serde(default)]
    pub drugs: Vec<String>,
    pub started_on: NaiveDate,
    #[serde(default)]
    pub ended_on: Option<NaiveDate>,
    pub best_response: ResponseCategory,
    #[serde(default)]
    pub toxicities: Vec<Toxicity>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    CompleteResponse,
    PartialResponse,
    StableDisease,
    ProgressiveDisease,
    NotEvaluable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Toxicity {
    pub term: String,
    pub grade: u8,
}

impl Toxicity {
    pub fn is_severe(&self) -> bool {
        self.grade >= 3
    }
}

/// Latest laboratory values. Missing measurements stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LaboratoryValues {
    #[serde(default)]
    pub collected_on: Option<NaiveDate>,
    #[serde(default)]
    pub hematology: Hematology,
    #[serde(default)]
    pub metabolic: MetabolicPanel,
    #[serde(default)]
    pub liver: LiverPanel,
    #[serde(default)]
    pub cardiac: CardiacFunction,
    #[serde(default)]
    pub pulmonary: PulmonaryFunction,
}

/// Counts in 10^9/L, hemoglobin in g/dL.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Hematology {
    pub anc: Option<f64>,
    pub platelets: Option<f64>,
    pub hemoglobin: Option<f64>,
}

/// Creatinine in mg/dL, clearance in mL/min.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetabolicPanel {
    pub creatinine: Option<f64>,
    pub creatinine_clearance: Option<f64>,
}

/// Bilirubin in mg/dL, transaminases in U/L.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LiverPanel {
    pub total_bilirubin: Option<f64>,
    pub alt: Option<f64>,
    pub ast: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CardiacFunction {
    /// Left ventricular ejection fraction, percent.
    pub lvef: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PulmonaryFunction {
    /// DLCO, percent of predicted.
    pub dlco: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneticProfile {
    #[serde(default)]
    pub germline: Vec<GeneticTestResult>,
    #[serde(default)]
    pub somatic: Vec<GeneticTestResult>,
    #[serde(default)]
    pub msi_status: MsiStatus,
    /// Tumor mutational burden, mutations per megabase.
    #[serde(default)]
    pub tmb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneticTestResult {
    pub gene: String,
    #[serde(default)]
    pub variant: Option<String>,
    pub pathogenic: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MsiStatus {
    High,
    Low,
    Stable,
    #[default]
    Unknown,
}

impl MsiStatus {
    fn as_biomarker(self) -> Option<BiomarkerResult> {
        let status = match self {
            MsiStatus::High => BiomarkerStatus::Positive,
            MsiStatus::Low | MsiStatus::Stable => BiomarkerStatus::Negative,
            MsiStatus::Unknown => return None,
        };
        Some(BiomarkerResult::new(status))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionSeverity {
    Mild,
    Moderate,
    Severe,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comorbidity {
    pub condition: String,
    pub severity: ConditionSeverity,
    #[serde(default = "default_controlled")]
    pub controlled: bool,
}

fn default_controlled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allergy {
    pub substance: String,
    pub severity: ConditionSeverity,
    #[serde(default)]
    pub reaction: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Medication {
    pub name: String,
    #[serde(default)]
    pub dose: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarePreferences {
    #[serde(default)]
    pub goals_of_care: Option<TreatmentIntent>,
    #[serde(default)]
    pub accepts_investigational: bool,
}

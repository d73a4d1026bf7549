use std::fmt;

use serde::{Deserialize, Serialize};

use super::clinical::{AgeRange, BiomarkerStatus, Ecog, Karnofsky};

/// Identifier wrapper for treatment protocols.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProtocolId(pub String);

impl fmt::Display for ProtocolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Guideline-sourced protocol as supplied by the protocol repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreatmentProtocol {
    pub id: ProtocolId,
    pub name: String,
    pub code: String,
    pub cancer_types: Vec<String>,
    pub line: TreatmentLine,
    pub intent: TreatmentIntent,
    #[serde(default)]
    pub status: ProtocolStatus,
    #[serde(default)]
    pub eligibility: EligibilityCriteria,
    #[serde(default)]
    pub drugs: Vec<ProtocolDrug>,
    #[serde(default)]
    pub contraindications: Vec<Contraindication>,
    #[serde(default)]
    pub expected_toxicities: Vec<String>,
    pub evidence_level: EvidenceLevel,
    #[serde(default)]
    pub outcomes: OutcomeStatistics,
}

impl TreatmentProtocol {
    pub fn applies_to(&self, cancer_type_id: &str) -> bool {
        self.cancer_types
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(cancer_type_id))
    }

    pub fn drug_names(&self) -> impl Iterator<Item = &str> {
        self.drugs.iter().map(|drug| drug.name.as_str())
    }
}

/// Ordinal position of the protocol in the patient's care sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentLine {
    First,
    Second,
    Third,
    FourthPlus,
    Salvage,
    Maintenance,
    Bridging,
}

impl TreatmentLine {
    pub const fn label(self) -> &'static str {
        match self {
            TreatmentLine::First => "first",
            TreatmentLine::Second => "second",
            TreatmentLine::Third => "third",
            TreatmentLine::FourthPlus => "fourth_plus",
            TreatmentLine::Salvage => "salvage",
            TreatmentLine::Maintenance => "maintenance",
            TreatmentLine::Bridging => "bridging",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreatmentIntent {
    Curative,
    Adjuvant,
    Neoadjuvant,
    Palliative,
    Maintenance,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolStatus {
    #[default]
    Active,
    Experimental,
    Inactive,
}

/// Strength-of-evidence grade. `A` is strongest; ordering follows strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EvidenceLevel {
    A,
    B,
    C,
    D,
    E,
}

impl EvidenceLevel {
    /// True when this level is at least as strong as `floor`.
    pub fn meets(self, floor: EvidenceLevel) -> bool {
        self <= floor
    }

    pub const fn label(self) -> &'static str {
        match self {
            EvidenceLevel::A => "A",
            EvidenceLevel::B => "B",
            EvidenceLevel::C => "C",
            EvidenceLevel::D => "D",
            EvidenceLevel::E => "E",
        }
    }
}

/// Hard and soft entry criteria declared by a protocol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityCriteria {
    #[serde(default)]
    pub performance: PerformanceCriteria,
    #[serde(default)]
    pub organ_function: OrganFunctionCriteria,
    #[serde(default)]
    pub biomarkers: BiomarkerCriteria,
    #[serde(default)]
    pub stages: Vec<String>,
    #[serde(default)]
    pub age: AgeRange,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCriteria {
    #[serde(default)]
    pub allowed_ecog: Vec<Ecog>,
    #[serde(default)]
    pub min_karnofsky: Option<Karnofsky>,
}

impl PerformanceCriteria {
    pub fn allows(&self, ecog: Ecog) -> bool {
        self.allowed_ecog.contains(&ecog)
    }

    pub fn max_ecog(&self) -> Option<Ecog> {
        self.allowed_ecog.iter().copied().max()
    }
}

/// Organ-function floors, one optional block per organ system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrganFunctionCriteria {
    #[serde(default)]
    pub hepatic: Option<HepaticFloor>,
    #[serde(default)]
    pub renal: Option<RenalFloor>,
    #[serde(default)]
    pub cardiac: Option<CardiacFloor>,
    #[serde(default)]
    pub pulmonary: Option<PulmonaryFloor>,
    #[serde(default)]
    pub hematologic: Option<HematologicFloor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HepaticFloor {
    pub max_bilirubin: f64,
    #[serde(default)]
    pub max_alt: Option<f64>,
    #[serde(default)]
    pub max_ast: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenalFloor {
    pub min_creatinine_clearance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardiacFloor {
    pub min_lvef: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulmonaryFloor {
    pub min_dlco: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HematologicFloor {
    pub min_anc: f64,
    pub min_platelets: f64,
    #[serde(default)]
    pub min_hemoglobin: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomarkerCriteria {
    #[serde(default)]
    pub required: Vec<BiomarkerRequirement>,
    #[serde(default)]
    pub excluded: Vec<BiomarkerRequirement>,
}

impl BiomarkerCriteria {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.excluded.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiomarkerRequirement {
    pub name: String,
    pub status: BiomarkerStatus,
}

impl BiomarkerRequirement {
    pub fn describe(&self) -> String {
        format!("{} {}", self.name, self.status.label())
    }
}

/// Protocol-declared reason the regimen must not, or should cautiously, be given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contraindication {
    pub kind: ContraindicationKind,
    pub category: ContraindicationCategory,
    pub condition: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContraindicationKind {
    Absolute,
    Relative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContraindicationCategory {
    Comorbidity,
    Allergy,
    DrugInteraction,
    OrganFunction,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolDrug {
    pub name: String,
    #[serde(default)]
    pub interactions: Vec<DrugInteraction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugInteraction {
    pub drug: String,
    pub severity: InteractionSeverity,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionSeverity {
    Minor,
    Moderate,
    Major,
    Contraindicated,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeStatistics {
    #[serde(default)]
    pub response_rate: Option<f64>,
    #[serde(default)]
    pub median_pfs_months: Option<f64>,
    #[serde(default)]
    pub median_os_months: Option<f64>,
}

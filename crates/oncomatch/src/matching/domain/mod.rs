//! Patient and protocol records consumed by the matching engine.

mod clinical;
mod patient;
mod protocol;

pub(crate) use clinical::{normalize_term, terms_match};
pub use clinical::{AgeRange, BiomarkerStatus, CriteriaError, Ecog, Karnofsky, OrganSystem};
pub use patient::{
    AlcoholUse, Allergy, BiomarkerResult, CardiacFunction, CarePreferences, Comorbidity,
    ConditionSeverity, Demographics, DiseaseBurden, DiseaseStatus, GeneticProfile,
    GeneticTestResult, Hematology, LaboratoryValues, LiverPanel, Medication, MetabolicPanel,
    MsiStatus, PatientId, PatientProfile, PerformanceMetrics, PulmonaryFunction,
    ResponseCategory, Sex, SmokingStatus, Toxicity, TreatmentExposure, TMB_HIGH_THRESHOLD,
};
pub use protocol::{
    BiomarkerCriteria, BiomarkerRequirement, CardiacFloor, Contraindication,
    ContraindicationCategory, ContraindicationKind, DrugInteraction, EligibilityCriteria,
    EvidenceLevel, HematologicFloor, HepaticFloor, InteractionSeverity, OrganFunctionCriteria,
    OutcomeStatistics, PerformanceCriteria, ProtocolDrug, ProtocolId, ProtocolStatus,
    PulmonaryFloor, RenalFloor, TreatmentIntent, TreatmentLine, TreatmentProtocol,
};

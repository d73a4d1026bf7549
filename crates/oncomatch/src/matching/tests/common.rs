use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::config::MatchingConfig;
use crate::matching::domain::{
    AgeRange, BiomarkerCriteria, BiomarkerRequirement, BiomarkerResult, BiomarkerStatus,
    CarePreferences, Demographics, DiseaseBurden, DiseaseStatus, Ecog, EligibilityCriteria,
    EvidenceLevel, GeneticProfile, HematologicFloor, HepaticFloor, Karnofsky, LaboratoryValues,
    OrganFunctionCriteria, OutcomeStatistics, PatientId, PatientProfile, PerformanceCriteria,
    PerformanceMetrics, ProtocolDrug, ProtocolId, ProtocolStatus, RenalFloor, Sex, SmokingStatus,
    TreatmentIntent, TreatmentLine, TreatmentProtocol,
};
use crate::matching::engine::MatchingEngine;
use crate::matching::repository::{protocol_matches_query, ProtocolRepository, RepositoryError};

pub(crate) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(crate) fn ecog(grade: u8) -> Ecog {
    Ecog::try_from(grade).expect("valid ECOG")
}

pub(crate) fn karnofsky(score: u8) -> Karnofsky {
    Karnofsky::try_from(score).expect("valid Karnofsky")
}

/// Fit, treatment-naive stage IV NSCLC patient with normal labs.
pub(crate) fn patient() -> PatientProfile {
    let mut biomarkers = BTreeMap::new();
    biomarkers.insert(
        "EGFR".to_string(),
        BiomarkerResult {
            status: BiomarkerStatus::Negative,
            tested_on: Some(date(2026, 8, 3)),
            value: None,
        },
    );
    biomarkers.insert("ALK".to_string(), BiomarkerResult::new(BiomarkerStatus::Negative));

    let mut laboratory = LaboratoryValues {
        collected_on: Some(date(2026, 9, 28)),
        ..LaboratoryValues::default()
    };
    laboratory.hematology.anc = Some(3.2);
    laboratory.hematology.platelets = Some(240.0);
    laboratory.hematology.hemoglobin = Some(12.8);
    laboratory.metabolic.creatinine = Some(0.9);
    laboratory.metabolic.creatinine_clearance = Some(85.0);
    laboratory.liver.total_bilirubin = Some(0.6);
    laboratory.liver.alt = Some(22.0);
    laboratory.liver.ast = Some(25.0);
    laboratory.cardiac.lvef = Some(60.0);
    laboratory.pulmonary.dlco = Some(80.0);

    PatientProfile {
        patient_id: PatientId("pt-0001".to_string()),
        demographics: Demographics {
            age: 62,
            sex: Sex::Female,
            bmi: Some(24.1),
            smoking: SmokingStatus::Former,
            alcohol: Default::default(),
        },
        disease: DiseaseStatus {
            cancer_type_id: "nsclc".to_string(),
            stage: "IV".to_string(),
            histology: Some("adenocarcinoma".to_string()),
            biomarkers,
            metastatic_sites: vec!["bone".to_string()],
            burden: DiseaseBurden::Moderate,
        },
        performance: PerformanceMetrics {
            ecog: ecog(0),
            karnofsky: karnofsky(90),
            assessed_on: date(2026, 9, 28),
        },
        treatment_history: Vec::new(),
        laboratory,
        genetics: GeneticProfile::default(),
        comorbidities: Vec::new(),
        allergies: Vec::new(),
        current_medications: Vec::new(),
        preferences: CarePreferences::default(),
    }
}

/// First-line NSCLC doublet the baseline patient matches on every criterion.
pub(crate) fn protocol(id: &str) -> TreatmentProtocol {
    TreatmentProtocol {
        id: ProtocolId(id.to_string()),
        name: format!("Protocol {id}"),
        code: id.to_ascii_uppercase(),
        cancer_types: vec!["NSCLC".to_string()],
        line: TreatmentLine::First,
        intent: TreatmentIntent::Palliative,
        status: ProtocolStatus::Active,
        eligibility: EligibilityCriteria {
            performance: PerformanceCriteria {
                allowed_ecog: vec![ecog(0), ecog(1)],
                min_karnofsky: Some(karnofsky(70)),
            },
            organ_function: OrganFunctionCriteria {
                hepatic: Some(HepaticFloor {
                    max_bilirubin: 1.5,
                    max_alt: Some(120.0),
                    max_ast: Some(120.0),
                }),
                renal: Some(RenalFloor {
                    min_creatinine_clearance: 45.0,
                }),
                hematologic: Some(HematologicFloor {
                    min_anc: 1.5,
                    min_platelets: 100.0,
                    min_hemoglobin: None,
                }),
                ..OrganFunctionCriteria::default()
            },
            biomarkers: BiomarkerCriteria::default(),
            stages: vec!["IIIB".to_string(), "IV".to_string()],
            age: AgeRange::new(Some(18), None).expect("valid range"),
            exclusions: vec!["interstitial lung disease".to_string()],
        },
        drugs: vec![
            ProtocolDrug {
                name: "Carboplatin".to_string(),
                interactions: Vec::new(),
            },
            ProtocolDrug {
                name: "Pemetrexed".to_string(),
                interactions: Vec::new(),
            },
        ],
        contraindications: Vec::new(),
        expected_toxicities: vec!["neutropenia".to_string(), "nausea".to_string()],
        evidence_level: EvidenceLevel::A,
        outcomes: OutcomeStatistics::default(),
    }
}

pub(crate) fn protocol_requiring(
    id: &str,
    biomarker: &str,
    status: BiomarkerStatus,
) -> TreatmentProtocol {
    let mut protocol = protocol(id);
    protocol.eligibility.biomarkers.required.push(BiomarkerRequirement {
        name: biomarker.to_string(),
        status,
    });
    protocol
}

pub(crate) fn named_protocol(
    id: &str,
    name: &str,
    evidence_level: EvidenceLevel,
) -> TreatmentProtocol {
    let mut protocol = protocol(id);
    protocol.name = name.to_string();
    protocol.evidence_level = evidence_level;
    protocol
}

/// In-memory repository with call counting, scripted failures and optional latency.
#[derive(Default)]
pub(crate) struct StubRepository {
    protocols: Vec<TreatmentProtocol>,
    calls: AtomicUsize,
    failures: Mutex<VecDeque<RepositoryError>>,
    delay: Option<Duration>,
}

impl StubRepository {
    pub(crate) fn with_protocols(protocols: Vec<TreatmentProtocol>) -> Self {
        Self {
            protocols,
            ..Self::default()
        }
    }

    /// Each call consumes one scripted failure before succeeding.
    pub(crate) fn failing_with(self, failures: impl IntoIterator<Item = RepositoryError>) -> Self {
        Self {
            failures: Mutex::new(failures.into_iter().collect()),
            ..self
        }
    }

    pub(crate) fn with_delay(self, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..self
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_failure(&self) -> Option<RepositoryError> {
        self.failures.lock().expect("failure queue").pop_front()
    }

    async fn enter(&self) -> Result<(), RepositoryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.next_failure();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match failure {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ProtocolRepository for StubRepository {
    async fn get_protocols_for_cancer(
        &self,
        cancer_type_id: &str,
        treatment_line: Option<TreatmentLine>,
        include_inactive: bool,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
        self.enter().await?;
        Ok(self
            .protocols
            .iter()
            .filter(|protocol| {
                protocol_matches_query(protocol, cancer_type_id, treatment_line, include_inactive)
            })
            .cloned()
            .collect())
    }

    async fn get_protocol_by_id(
        &self,
        id: &ProtocolId,
    ) -> Result<Option<TreatmentProtocol>, RepositoryError> {
        self.enter().await?;
        Ok(self.protocols.iter().find(|protocol| &protocol.id == id).cloned())
    }
}

pub(crate) fn engine(
    repository: StubRepository,
) -> (MatchingEngine<StubRepository>, Arc<StubRepository>) {
    engine_with_config(repository, MatchingConfig::default())
}

pub(crate) fn engine_with_config(
    repository: StubRepository,
    config: MatchingConfig,
) -> (MatchingEngine<StubRepository>, Arc<StubRepository>) {
    let repository = Arc::new(repository);
    let engine = MatchingEngine::new(Arc::clone(&repository), config).expect("valid config");
    (engine, repository)
}

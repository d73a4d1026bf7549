use crate::infra::{parse_treatment_line, CatalogRepository};
use clap::Args;
use oncomatch::config::AppConfig;
use oncomatch::error::AppError;
use oncomatch::matching::domain::{
    AgeRange, BiomarkerRequirement, BiomarkerStatus, CardiacFloor, Contraindication,
    ContraindicationCategory, ContraindicationKind, DrugInteraction, Ecog, EligibilityCriteria,
    EvidenceLevel, HematologicFloor, HepaticFloor, InteractionSeverity, Karnofsky,
    OrganFunctionCriteria, OutcomeStatistics, PatientProfile, PerformanceCriteria, ProtocolDrug,
    ProtocolId, ProtocolStatus, RenalFloor, TreatmentIntent, TreatmentLine, TreatmentProtocol,
};
use oncomatch::matching::{MatchingEngine, MatchingRequest, MatchingResult};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct MatchArgs {
    /// Patient record (JSON) to match
    #[arg(long)]
    pub(crate) patient: PathBuf,
    /// Protocol catalog (JSON array). Defaults to MATCH_CATALOG_PATH, then the demo catalog.
    #[arg(long)]
    pub(crate) catalog: Option<PathBuf>,
    /// Restrict to one treatment line (first, second, ..., bridging)
    #[arg(long, value_parser = parse_treatment_line)]
    pub(crate) line: Option<TreatmentLine>,
    /// Maximum number of protocols to print
    #[arg(long, default_value_t = 10)]
    pub(crate) max_results: usize,
    /// Include experimental protocols in the ranking
    #[arg(long)]
    pub(crate) include_experimental: bool,
    /// Print violations, warnings and safety recommendations per protocol
    #[arg(long)]
    pub(crate) details: bool,
}

pub(crate) async fn run_match(args: MatchArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let raw = std::fs::read_to_string(&args.patient)?;
    let patient: PatientProfile = serde_json::from_str(&raw)?;

    let catalog_path = args.catalog.or(config.catalog.path);
    let (repository, source) = match catalog_path {
        Some(path) => (
            CatalogRepository::from_path(&path)?,
            path.display().to_string(),
        ),
        None => (
            CatalogRepository::new(demo_catalog()),
            "built-in demo catalog".to_string(),
        ),
    };
    let engine = MatchingEngine::new(Arc::new(repository), config.matching)?;

    let mut request = MatchingRequest::new(patient);
    request.treatment_line = args.line;
    request.max_results = args.max_results;
    request.include_experimental = args.include_experimental;

    let results = engine.find_matching_protocols(&request).await?;
    render_results(&request.patient, &source, &results, args.details);
    Ok(())
}

pub(crate) fn render_results(
    patient: &PatientProfile,
    source: &str,
    results: &[MatchingResult],
    details: bool,
) {
    println!(
        "Protocol matches for {} ({}, stage {}) from {}",
        patient.patient_id.0, patient.disease.cancer_type_id, patient.disease.stage, source
    );
    if results.is_empty() {
        println!("  No protocols met the minimum match score.");
        return;
    }

    println!(
        "  {:>2}  {:>5}  {:<18}  {:<3}  {:<8}  protocol",
        "#", "score", "status", "ev", "risk"
    );
    for (rank, result) in results.iter().enumerate() {
        println!(
            "  {:>2}  {:>5.3}  {:<18}  {:<3}  {:<8}  {} ({})",
            rank + 1,
            result.match_score,
            result.eligibility_status.label(),
            result.evidence_level.label(),
            result.safety.risk_level.label(),
            result.protocol_name,
            result.protocol_code
        );
        println!("      {}", result.rationale);

        if !details {
            continue;
        }
        for violation in &result.eligibility.violations {
            match &violation.suggested_modification {
                Some(modification) => println!(
                    "      - {:?}: {} (consider: {})",
                    violation.severity, violation.description, modification
                ),
                None => println!("      - {:?}: {}", violation.severity, violation.description),
            }
        }
        for warning in &result.eligibility.warnings {
            println!("      ! {:?}: {}", warning.category, warning.message);
        }
        if !result.eligibility.required_tests.is_empty() {
            println!(
                "      tests: {}",
                result.eligibility.required_tests.join(", ")
            );
        }
        for recommendation in &result.safety.recommendations {
            println!("      * {recommendation}");
        }
    }
}

fn ecog_up_to(max: u8) -> Vec<Ecog> {
    (0..=max).filter_map(|grade| Ecog::try_from(grade).ok()).collect()
}

fn standard_organ_floors() -> OrganFunctionCriteria {
    OrganFunctionCriteria {
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
            min_hemoglobin: Some(9.0),
        }),
        ..OrganFunctionCriteria::default()
    }
}

fn adult_criteria(max_ecog: u8, stages: &[&str]) -> EligibilityCriteria {
    EligibilityCriteria {
        performance: PerformanceCriteria {
            allowed_ecog: ecog_up_to(max_ecog),
            min_karnofsky: Karnofsky::try_from(60).ok(),
        },
        organ_function: standard_organ_floors(),
        stages: stages.iter().map(|stage| stage.to_string()).collect(),
        age: AgeRange::new(Some(18), None).unwrap_or_default(),
        ..EligibilityCriteria::default()
    }
}

fn drug(name: &str) -> ProtocolDrug {
    ProtocolDrug {
        name: name.to_string(),
        interactions: Vec::new(),
    }
}

fn requirement(name: &str, status: BiomarkerStatus) -> BiomarkerRequirement {
    BiomarkerRequirement {
        name: name.to_string(),
        status,
    }
}

fn protocol(
    id: &str,
    name: &str,
    code: &str,
    cancer_type: &str,
    line: TreatmentLine,
    evidence_level: EvidenceLevel,
    eligibility: EligibilityCriteria,
) -> TreatmentProtocol {
    TreatmentProtocol {
        id: ProtocolId(id.to_string()),
        name: name.to_string(),
        code: code.to_string(),
        cancer_types: vec![cancer_type.to_string()],
        line,
        intent: TreatmentIntent::Palliative,
        status: ProtocolStatus::Active,
        eligibility,
        drugs: Vec::new(),
        contraindications: Vec::new(),
        expected_toxicities: Vec::new(),
        evidence_level,
        outcomes: OutcomeStatistics::default(),
    }
}

/// Small illustrative catalog covering NSCLC, breast and colorectal regimens.
pub(crate) fn demo_catalog() -> Vec<TreatmentProtocol> {
    let metastatic = ["IV", "IVA", "IVB"];

    let mut osimertinib = protocol(
        "osimertinib",
        "Osimertinib",
        "OSI-1L",
        "nsclc",
        TreatmentLine::First,
        EvidenceLevel::A,
        adult_criteria(2, &metastatic),
    );
    osimertinib
        .eligibility
        .biomarkers
        .required
        .push(requirement("EGFR", BiomarkerStatus::Positive));
    osimertinib.eligibility.organ_function.cardiac = Some(CardiacFloor { min_lvef: 50.0 });
    osimertinib.drugs.push(ProtocolDrug {
        name: "Osimertinib".to_string(),
        interactions: vec![DrugInteraction {
            drug: "Rifampin".to_string(),
            severity: InteractionSeverity::Major,
            description: "strong CYP3A4 induction lowers exposure".to_string(),
        }],
    });
    osimertinib.contraindications.push(Contraindication {
        kind: ContraindicationKind::Absolute,
        category: ContraindicationCategory::Comorbidity,
        condition: "interstitial lung disease".to_string(),
        rationale: "risk of fatal pneumonitis".to_string(),
    });
    osimertinib.expected_toxicities = vec!["diarrhea".to_string(), "rash".to_string()];
    osimertinib.outcomes = OutcomeStatistics {
        response_rate: Some(0.80),
        median_pfs_months: Some(18.9),
        median_os_months: Some(38.6),
    };

    let mut carbo_pem = protocol(
        "carbo-pemetrexed",
        "Carboplatin + Pemetrexed",
        "CP-1L",
        "nsclc",
        TreatmentLine::First,
        EvidenceLevel::A,
        adult_criteria(1, &metastatic),
    );
    carbo_pem.eligibility.exclusions = vec!["squamous histology".to_string()];
    carbo_pem.drugs = vec![drug("Carboplatin"), drug("Pemetrexed")];
    carbo_pem.expected_toxicities = vec![
        "neutropenia".to_string(),
        "thrombocytopenia".to_string(),
        "nausea".to_string(),
    ];

    let mut pembro = protocol(
        "pembrolizumab-mono",
        "Pembrolizumab monotherapy",
        "PEM-1L",
        "nsclc",
        TreatmentLine::First,
        EvidenceLevel::A,
        adult_criteria(1, &metastatic),
    );
    pembro
        .eligibility
        .biomarkers
        .required
        .push(requirement("PD-L1", BiomarkerStatus::Positive));
    pembro.eligibility.biomarkers.excluded = vec![
        requirement("EGFR", BiomarkerStatus::Positive),
        requirement("ALK", BiomarkerStatus::Positive),
    ];
    pembro.drugs.push(drug("Pembrolizumab"));
    pembro.contraindications.push(Contraindication {
        kind: ContraindicationKind::Relative,
        category: ContraindicationCategory::Comorbidity,
        condition: "autoimmune disease".to_string(),
        rationale: "risk of immune-mediated flare".to_string(),
    });
    pembro.expected_toxicities = vec!["pneumonitis".to_string(), "colitis".to_string()];

    let mut docetaxel = protocol(
        "docetaxel-ramucirumab",
        "Docetaxel + Ramucirumab",
        "DR-2L",
        "nsclc",
        TreatmentLine::Second,
        EvidenceLevel::B,
        adult_criteria(1, &metastatic),
    );
    docetaxel.drugs = vec![drug("Docetaxel"), drug("Ramucirumab")];
    docetaxel.expected_toxicities = vec!["neutropenia".to_string(), "neuropathy".to_string()];

    let mut amivantamab = protocol(
        "amivantamab-lazertinib",
        "Amivantamab + Lazertinib (trial)",
        "AL-EXP",
        "nsclc",
        TreatmentLine::First,
        EvidenceLevel::C,
        adult_criteria(1, &metastatic),
    );
    amivantamab.status = ProtocolStatus::Experimental;
    amivantamab
        .eligibility
        .biomarkers
        .required
        .push(requirement("EGFR", BiomarkerStatus::Positive));
    amivantamab.drugs = vec![drug("Amivantamab"), drug("Lazertinib")];

    let mut trastuzumab = protocol(
        "thp",
        "Docetaxel + Trastuzumab + Pertuzumab",
        "THP-1L",
        "breast",
        TreatmentLine::First,
        EvidenceLevel::A,
        adult_criteria(1, &metastatic),
    );
    trastuzumab
        .eligibility
        .biomarkers
        .required
        .push(requirement("HER2", BiomarkerStatus::Positive));
    trastuzumab.eligibility.organ_function.cardiac = Some(CardiacFloor { min_lvef: 50.0 });
    trastuzumab.drugs = vec![drug("Docetaxel"), drug("Trastuzumab"), drug("Pertuzumab")];
    trastuzumab.contraindications.push(Contraindication {
        kind: ContraindicationKind::Absolute,
        category: ContraindicationCategory::Comorbidity,
        condition: "heart failure".to_string(),
        rationale: "anti-HER2 cardiotoxicity".to_string(),
    });

    let mut folfox = protocol(
        "folfox",
        "FOLFOX",
        "FOLFOX-1L",
        "colorectal",
        TreatmentLine::First,
        EvidenceLevel::A,
        adult_criteria(2, &metastatic),
    );
    folfox.drugs = vec![drug("Oxaliplatin"), drug("Leucovorin"), drug("Fluorouracil")];
    folfox.contraindications.push(Contraindication {
        kind: ContraindicationKind::Absolute,
        category: ContraindicationCategory::Other,
        condition: "DPD deficiency".to_string(),
        rationale: "severe fluoropyrimidine toxicity".to_string(),
    });
    folfox.expected_toxicities = vec!["neuropathy".to_string(), "neutropenia".to_string()];

    vec![
        osimertinib,
        carbo_pem,
        pembro,
        docetaxel,
        amivantamab,
        trastuzumab,
        folfox,
    ]
}

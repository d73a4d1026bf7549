//! Hard and soft entry-criteria checks, evaluated independently of the match score.

use serde::{Deserialize, Serialize};

use super::contraindications::{detect_contraindications, moderate_interactions};
use super::domain::{
    terms_match, ConditionSeverity, PatientProfile, ProtocolStatus, TreatmentProtocol,
};
use super::scoring::{self, OrganStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Exclusionary,
    Caution,
    MonitoringRequired,
}

impl ViolationSeverity {
    /// Deduction from the eligibility score per violation of this severity.
    pub const fn weight(self) -> f64 {
        match self {
            ViolationSeverity::Exclusionary => 0.40,
            ViolationSeverity::Caution => 0.15,
            ViolationSeverity::MonitoringRequired => 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityCriterion {
    PerformanceStatus,
    OrganFunction,
    Biomarker,
    Age,
    Stage,
    Exclusion,
}

/// A specific mismatch between patient and protocol criteria.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub criterion: EligibilityCriterion,
    pub severity: ViolationSeverity,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_modification: Option<String>,
}

impl Violation {
    fn new(
        criterion: EligibilityCriterion,
        severity: ViolationSeverity,
        description: impl Into<String>,
    ) -> Self {
        Self {
            criterion,
            severity,
            description: description.into(),
            suggested_modification: None,
        }
    }

    fn with_modification(mut self, modification: impl Into<String>) -> Self {
        self.suggested_modification = Some(modification.into());
        self
    }

    /// Violations carrying a suggested modification can be resolved clinically.
    pub fn is_addressable(&self) -> bool {
        self.suggested_modification.is_some()
    }

    pub fn is_exclusionary(&self) -> bool {
        self.severity == ViolationSeverity::Exclusionary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningCategory {
    Comorbidity,
    DrugInteraction,
    ToxicityOverlap,
    OrganFunction,
    Preference,
}

/// Risk factor worth surfacing that does not by itself affect eligibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub category: WarningCategory,
    pub message: String,
}

impl Warning {
    fn new(category: WarningCategory, message: impl Into<String>) -> Self {
        Self {
            category,
            message: message.into(),
        }
    }
}

/// Eligibility verdict with itemised violations, warnings and follow-up tests.
///
/// `eligible` is false exactly when at least one violation is exclusionary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityAssessment {
    pub eligible: bool,
    pub violations: Vec<Violation>,
    pub warnings: Vec<Warning>,
    pub required_tests: Vec<String>,
    pub eligibility_score: f64,
    /// Score if every addressable violation were resolved. Reported so callers can
    /// see what a partially eligible patient could reach; status classification
    /// reads only `eligible` and the aggregate match score.
    pub best_case_score: f64,
}

impl EligibilityAssessment {
    fn from_parts(
        violations: Vec<Violation>,
        warnings: Vec<Warning>,
        mut required_tests: Vec<String>,
    ) -> Self {
        required_tests.sort();
        required_tests.dedup();
        let eligible = !violations.iter().any(Violation::is_exclusionary);
        let eligibility_score = deduct(violations.iter());
        let best_case_score = deduct(
            violations
                .iter()
                .filter(|violation| !violation.is_addressable()),
        );
        Self {
            eligible,
            violations,
            warnings,
            required_tests,
            eligibility_score,
            best_case_score,
        }
    }

    pub fn exclusionary(&self) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(|violation| violation.is_exclusionary())
    }

    /// True when every exclusionary violation has a suggested modification.
    pub fn is_addressable(&self) -> bool {
        self.exclusionary().all(Violation::is_addressable)
    }
}

fn deduct<'a>(violations: impl Iterator<Item = &'a Violation>) -> f64 {
    let total: f64 = violations.map(|violation| violation.severity.weight()).sum();
    (1.0 - total).clamp(0.0, 1.0)
}

/// Evaluates entry criteria for one patient/protocol pair.
pub fn assess_eligibility(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
) -> EligibilityAssessment {
    let mut violations = Vec::new();
    let mut warnings = Vec::new();
    let mut required_tests = Vec::new();

    check_performance(patient, protocol, &mut violations);
    check_organ_function(
        patient,
        protocol,
        &mut violations,
        &mut warnings,
        &mut required_tests,
    );
    check_biomarkers(patient, protocol, &mut violations, &mut required_tests);
    check_age(patient, protocol, &mut violations);
    check_stage(patient, protocol, &mut violations);
    let excluded_terms = check_exclusions(patient, protocol, &mut violations);
    collect_warnings(patient, protocol, &excluded_terms, &mut warnings);

    EligibilityAssessment::from_parts(violations, warnings, required_tests)
}

fn check_performance(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    violations: &mut Vec<Violation>,
) {
    let criteria = &protocol.eligibility.performance;
    let ecog = patient.performance.ecog;

    if let Some(max_allowed) = criteria.max_ecog() {
        if ecog > max_allowed {
            let excess = ecog.grade() - max_allowed.grade();
            let description = format!(
                "{ecog} exceeds protocol maximum ECOG {}",
                max_allowed.grade()
            );
            violations.push(if excess == 1 {
                Violation::new(
                    EligibilityCriterion::PerformanceStatus,
                    ViolationSeverity::Caution,
                    description,
                )
                .with_modification("consider upfront dose reduction with close performance review")
            } else {
                Violation::new(
                    EligibilityCriterion::PerformanceStatus,
                    ViolationSeverity::Exclusionary,
                    description,
                )
            });
        }
    }

    if let Some(required) = criteria.min_karnofsky {
        let actual = patient.performance.karnofsky;
        if actual < required {
            violations.push(Violation::new(
                EligibilityCriterion::PerformanceStatus,
                ViolationSeverity::Caution,
                format!(
                    "Karnofsky {} below protocol minimum {}",
                    actual.score(),
                    required.score()
                ),
            ));
        }
    }
}

fn check_organ_function(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    violations: &mut Vec<Violation>,
    warnings: &mut Vec<Warning>,
    required_tests: &mut Vec<String>,
) {
    let floors = &protocol.eligibility.organ_function;
    for system in scoring::organ::assess_organ_systems(patient, floors) {
        let label = system.system.label();
        required_tests.extend(
            system
                .missing_measures
                .iter()
                .map(|measure| format!("{measure} ({label} panel)")),
        );

        match system.status {
            OrganStatus::Impaired { mild } => {
                let violation = Violation::new(
                    EligibilityCriterion::OrganFunction,
                    ViolationSeverity::Exclusionary,
                    format!(
                        "{label} function below protocol floor: {}",
                        system.findings.join("; ")
                    ),
                );
                violations.push(if mild {
                    violation.with_modification(format!(
                        "apply protocol dose modification for {label} impairment"
                    ))
                } else {
                    violation
                });
            }
            OrganStatus::Unknown => violations.push(Violation::new(
                EligibilityCriterion::OrganFunction,
                ViolationSeverity::MonitoringRequired,
                format!(
                    "{label} labs incomplete: {}",
                    system.missing_measures.join(", ")
                ),
            )),
            OrganStatus::Borderline => warnings.push(Warning::new(
                WarningCategory::OrganFunction,
                format!("{label} function borderline: {}", system.findings.join("; ")),
            )),
            OrganStatus::Adequate => {}
        }
    }
}

fn check_biomarkers(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    violations: &mut Vec<Violation>,
    required_tests: &mut Vec<String>,
) {
    let criteria = &protocol.eligibility.biomarkers;

    for requirement in criteria
        .required
        .iter()
        .filter(|requirement| !requirement.name.trim().is_empty())
    {
        match patient.biomarker(&requirement.name) {
            None => {
                violations.push(
                    Violation::new(
                        EligibilityCriterion::Biomarker,
                        ViolationSeverity::Exclusionary,
                        format!("missing required assessment: {}", requirement.name),
                    )
                    .with_modification(format!("order {} testing", requirement.name)),
                );
                required_tests.push(format!("{} testing", requirement.name));
            }
            Some(result) if !result.status.is_conclusive() => {
                violations.push(
                    Violation::new(
                        EligibilityCriterion::Biomarker,
                        ViolationSeverity::Caution,
                        format!(
                            "{} result {}; {} required",
                            requirement.name,
                            result.status.label(),
                            requirement.status.label()
                        ),
                    )
                    .with_modification(format!("repeat {} testing", requirement.name)),
                );
                required_tests.push(format!("{} retest", requirement.name));
            }
            Some(result) if !result.status.satisfies(requirement.status) => {
                violations.push(Violation::new(
                    EligibilityCriterion::Biomarker,
                    ViolationSeverity::Exclusionary,
                    format!(
                        "{} is {} but protocol requires {}",
                        requirement.name,
                        result.status.label(),
                        requirement.status.label()
                    ),
                ));
            }
            Some(_) => {}
        }
    }

    for excluded in &criteria.excluded {
        if let Some(result) = patient.biomarker(&excluded.name) {
            if result.status.satisfies(excluded.status) {
                violations.push(Violation::new(
                    EligibilityCriterion::Biomarker,
                    ViolationSeverity::Exclusionary,
                    format!("excluded biomarker present: {}", excluded.describe()),
                ));
            }
        }
    }
}

fn check_age(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    violations: &mut Vec<Violation>,
) {
    let range = protocol.eligibility.age;
    let age = patient.demographics.age;
    if !range.contains(age) {
        violations.push(Violation::new(
            EligibilityCriterion::Age,
            ViolationSeverity::Exclusionary,
            format!("age {age} outside protocol range {}", range.describe()),
        ));
    }
}

fn check_stage(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    violations: &mut Vec<Violation>,
) {
    if protocol.eligibility.stages.is_empty() {
        return;
    }
    let stage = scoring::stage(patient, protocol);
    if stage.score < 1.0 {
        violations.push(Violation::new(
            EligibilityCriterion::Stage,
            ViolationSeverity::Caution,
            stage.explanation,
        ));
    }
}

/// Returns the patient terms consumed by protocol exclusions.
fn check_exclusions<'a>(
    patient: &'a PatientProfile,
    protocol: &TreatmentProtocol,
    violations: &mut Vec<Violation>,
) -> Vec<&'a str> {
    let mut matched = Vec::new();
    for exclusion in &protocol.eligibility.exclusions {
        if let Some(term) = patient
            .comorbidity_terms()
            .find(|term| terms_match(term, exclusion))
        {
            violations.push(Violation::new(
                EligibilityCriterion::Exclusion,
                ViolationSeverity::Exclusionary,
                format!("protocol exclusion '{exclusion}' matches {term}"),
            ));
            matched.push(term);
        }
    }
    matched
}

fn collect_warnings(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
    excluded_terms: &[&str],
    warnings: &mut Vec<Warning>,
) {
    let contraindicated = detect_contraindications(patient, protocol);

    for comorbidity in &patient.comorbidities {
        let risky = !comorbidity.controlled || comorbidity.severity == ConditionSeverity::Severe;
        let already_flagged = excluded_terms.contains(&comorbidity.condition.as_str())
            || contraindicated
                .iter()
                .any(|result| result.matched_term == comorbidity.condition);
        if risky && !already_flagged {
            let qualifier = if comorbidity.controlled {
                "severe"
            } else {
                "uncontrolled"
            };
            warnings.push(Warning::new(
                WarningCategory::Comorbidity,
                format!("{qualifier} comorbidity: {}", comorbidity.condition),
            ));
        }
    }

    warnings.extend(
        moderate_interactions(patient, protocol)
            .into_iter()
            .map(|message| Warning::new(WarningCategory::DrugInteraction, message)),
    );

    for exposure in &patient.treatment_history {
        for toxicity in exposure.toxicities.iter().filter(|toxicity| toxicity.is_severe()) {
            if let Some(expected) = protocol
                .expected_toxicities
                .iter()
                .find(|expected| terms_match(expected, &toxicity.term))
            {
                warnings.push(Warning::new(
                    WarningCategory::ToxicityOverlap,
                    format!(
                        "prior grade {} {} on {} overlaps expected {expected}",
                        toxicity.grade, toxicity.term, exposure.protocol_id
                    ),
                ));
            }
        }
    }

    if protocol.status == ProtocolStatus::Experimental
        && !patient.preferences.accepts_investigational
    {
        warnings.push(Warning::new(
            WarningCategory::Preference,
            "protocol is investigational; patient has not accepted investigational therapy",
        ));
    }
    if let Some(goal) = patient.preferences.goals_of_care {
        if goal != protocol.intent {
            warnings.push(Warning::new(
                WarningCategory::Preference,
                format!(
                    "protocol intent {:?} differs from stated goals of care {:?}",
                    protocol.intent, goal
                ),
            ));
        }
    }
}

use serde::{Deserialize, Serialize};

use super::domain::{
    terms_match, ContraindicationCategory, ContraindicationKind, InteractionSeverity,
    PatientProfile, TreatmentProtocol,
};

/// A protocol contraindication or drug interaction that applies to this patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContraindicationResult {
    pub kind: ContraindicationKind,
    pub category: ContraindicationCategory,
    pub description: String,
    pub matched_term: String,
    pub rationale: String,
    pub override_possible: bool,
}

impl ContraindicationResult {
    pub fn is_absolute(&self) -> bool {
        self.kind == ContraindicationKind::Absolute
    }
}

pub fn has_absolute(results: &[ContraindicationResult]) -> bool {
    results.iter().any(ContraindicationResult::is_absolute)
}

pub fn relative_count(results: &[ContraindicationResult]) -> usize {
    results.iter().filter(|result| !result.is_absolute()).count()
}

/// Cross-references protocol contraindications against comorbidities, allergies and
/// current medications, then protocol drug interactions against current medications.
pub fn detect_contraindications(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
) -> Vec<ContraindicationResult> {
    let mut results = Vec::new();

    for declared in &protocol.contraindications {
        let mut candidates: Vec<&str> = patient
            .comorbidity_terms()
            .chain(patient.allergies.iter().map(|allergy| allergy.substance.as_str()))
            .collect();
        if declared.category == ContraindicationCategory::DrugInteraction {
            candidates.extend(
                patient
                    .current_medications
                    .iter()
                    .map(|medication| medication.name.as_str()),
            );
        }

        if let Some(term) = candidates
            .into_iter()
            .find(|term| terms_match(term, &declared.condition))
        {
            results.push(ContraindicationResult {
                kind: declared.kind,
                category: declared.category,
                description: declared.condition.clone(),
                matched_term: term.to_string(),
                rationale: declared.rationale.clone(),
                override_possible: declared.kind == ContraindicationKind::Relative,
            });
        }
    }

    for drug in &protocol.drugs {
        for interaction in drug
            .interactions
            .iter()
            .filter(|interaction| interaction.severity >= InteractionSeverity::Major)
        {
            for medication in patient
                .current_medications
                .iter()
                .filter(|medication| terms_match(&medication.name, &interaction.drug))
            {
                let kind = if interaction.severity == InteractionSeverity::Contraindicated {
                    ContraindicationKind::Absolute
                } else {
                    ContraindicationKind::Relative
                };
                results.push(ContraindicationResult {
                    kind,
                    category: ContraindicationCategory::DrugInteraction,
                    description: format!("{} interacts with {}", drug.name, medication.name),
                    matched_term: medication.name.clone(),
                    rationale: interaction.description.clone(),
                    override_possible: kind == ContraindicationKind::Relative,
                });
            }
        }
    }

    results
}

/// Moderate interactions: not contraindications, surfaced as eligibility warnings.
pub(crate) fn moderate_interactions(
    patient: &PatientProfile,
    protocol: &TreatmentProtocol,
) -> Vec<String> {
    protocol
        .drugs
        .iter()
        .flat_map(move |drug| {
            drug.interactions
                .iter()
                .filter(|interaction| interaction.severity == InteractionSeverity::Moderate)
                .flat_map(move |interaction| {
                    patient
                        .current_medications
                        .iter()
                        .filter(move |medication| terms_match(&medication.name, &interaction.drug))
                        .map(move |medication| {
                            format!(
                                "moderate interaction between {} and {}",
                                drug.name, medication.name
                            )
                        })
                })
        })
        .collect()
}

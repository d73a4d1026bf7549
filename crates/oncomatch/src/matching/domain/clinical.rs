use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Validation failures raised while constructing clinical criteria.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CriteriaError {
    #[error("ECOG grade must be between 0 and 5 (found {0})")]
    InvalidEcog(u8),
    #[error("Karnofsky score must be 0-100 in steps of 10 (found {0})")]
    InvalidKarnofsky(u8),
    #[error("age range minimum {min} exceeds maximum {max}")]
    InvalidAgeRange { min: u8, max: u8 },
}

/// ECOG performance grade. 0 is fully active, 5 is dead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Ecog(u8);

impl Ecog {
    pub const MAX: u8 = 5;

    pub const fn grade(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Ecog {
    type Error = CriteriaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(Self(value))
        } else {
            Err(CriteriaError::InvalidEcog(value))
        }
    }
}

impl From<Ecog> for u8 {
    fn from(value: Ecog) -> Self {
        value.0
    }
}

impl fmt::Display for Ecog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ECOG {}", self.0)
    }
}

/// Karnofsky performance score, recorded in steps of 10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Karnofsky(u8);

impl Karnofsky {
    pub const fn score(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Karnofsky {
    type Error = CriteriaError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 100 && value % 10 == 0 {
            Ok(Self(value))
        } else {
            Err(CriteriaError::InvalidKarnofsky(value))
        }
    }
}

impl From<Karnofsky> for u8 {
    fn from(value: Karnofsky) -> Self {
        value.0
    }
}

/// Inclusive age window declared by a protocol. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawAgeRange")]
pub struct AgeRange {
    min: Option<u8>,
    max: Option<u8>,
}

#[derive(Deserialize)]
struct RawAgeRange {
    #[serde(default)]
    min: Option<u8>,
    #[serde(default)]
    max: Option<u8>,
}

impl TryFrom<RawAgeRange> for AgeRange {
    type Error = CriteriaError;

    fn try_from(raw: RawAgeRange) -> Result<Self, Self::Error> {
        Self::new(raw.min, raw.max)
    }
}

impl AgeRange {
    pub fn new(min: Option<u8>, max: Option<u8>) -> Result<Self, CriteriaError> {
        if let (Some(min), Some(max)) = (min, max) {
            if min > max {
                return Err(CriteriaError::InvalidAgeRange { min, max });
            }
        }
        Ok(Self { min, max })
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn min(&self) -> Option<u8> {
        self.min
    }

    pub fn max(&self) -> Option<u8> {
        self.max
    }

    pub fn contains(&self, age: u8) -> bool {
        self.min.map_or(true, |min| age >= min) && self.max.map_or(true, |max| age <= max)
    }

    pub fn describe(&self) -> String {
        match (self.min, self.max) {
            (Some(min), Some(max)) => format!("{min}-{max} years"),
            (Some(min), None) => format!(">= {min} years"),
            (None, Some(max)) => format!("<= {max} years"),
            (None, None) => "any age".to_string(),
        }
    }
}

/// Organ systems a protocol may constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrganSystem {
    Hepatic,
    Renal,
    Cardiac,
    Pulmonary,
    Hematologic,
}

impl OrganSystem {
    pub const fn label(self) -> &'static str {
        match self {
            OrganSystem::Hepatic => "hepatic",
            OrganSystem::Renal => "renal",
            OrganSystem::Cardiac => "cardiac",
            OrganSystem::Pulmonary => "pulmonary",
            OrganSystem::Hematologic => "hematologic",
        }
    }
}

/// Reported status of a biomarker test, also used to state protocol requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiomarkerStatus {
    Positive,
    Negative,
    Amplified,
    Equivocal,
    Pending,
}

impl BiomarkerStatus {
    /// Whether the result can be compared against a requirement.
    pub const fn is_conclusive(self) -> bool {
        !matches!(self, BiomarkerStatus::Equivocal | BiomarkerStatus::Pending)
    }

    /// Amplification is reported separately but satisfies a "positive" requirement.
    pub fn satisfies(self, required: BiomarkerStatus) -> bool {
        self == required
            || (required == BiomarkerStatus::Positive && self == BiomarkerStatus::Amplified)
    }

    pub const fn label(self) -> &'static str {
        match self {
            BiomarkerStatus::Positive => "positive",
            BiomarkerStatus::Negative => "negative",
            BiomarkerStatus::Amplified => "amplified",
            BiomarkerStatus::Equivocal => "equivocal",
            BiomarkerStatus::Pending => "pending",
        }
    }
}

/// Normalizes free-text clinical terms for comparison.
pub(crate) fn normalize_term(term: &str) -> String {
    term.chars()
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

const GENERIC_TOKENS: &[&str] = &[
    "allergy", "allergic", "history", "severe", "disease", "chronic", "acute", "known", "active",
    "prior", "with", "and", "the", "of", "to", "or", "in", "on", "for", "a", "an", "uncontrolled",
    "significant", "grade", "hypersensitivity", "disorder", "syndrome", "reaction",
];

/// Organ and descriptor words that never identify a condition on their own.
const QUALIFIER_TOKENS: &[&str] = &[
    "heart", "cardiac", "lung", "pulmonary", "renal", "kidney", "hepatic", "liver", "impairment",
    "failure", "dysfunction", "insufficiency", "deficiency", "infection", "toxicity",
];

fn significant_tokens(term: &str) -> BTreeSet<String> {
    normalize_term(term)
        .split(' ')
        .filter(|token| !token.is_empty() && !GENERIC_TOKENS.contains(token))
        .map(str::to_string)
        .collect()
}

/// True when every token of `part` is a whole token of `whole`.
fn covered_by(part: &BTreeSet<String>, whole: &BTreeSet<String>) -> bool {
    let lone_qualifier = part.len() == 1
        && part
            .iter()
            .all(|token| QUALIFIER_TOKENS.contains(&token.as_str()));
    !part.is_empty() && !lone_qualifier && part.is_subset(whole)
}

/// Whole-token comparison between two clinical terms: one side's significant
/// tokens must all appear in the other.
pub(crate) fn terms_match(left: &str, right: &str) -> bool {
    let left = significant_tokens(left);
    let right = significant_tokens(right);
    (!left.is_empty() && left == right) || covered_by(&left, &right) || covered_by(&right, &left)
}

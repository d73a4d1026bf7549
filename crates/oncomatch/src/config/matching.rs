use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::matching::domain::EvidenceLevel;

const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// Tunable surface of the matching engine. Plain data: callers construct, override and
/// validate it; nothing here reads the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub weights: CriterionWeights,
    pub thresholds: ScoreThresholds,
    pub evidence_bonus: EvidenceBonusTable,
    pub contraindication_penalty: ContraindicationPenalty,
    pub cache_ttl_secs: u64,
    pub fetch_timeout_ms: u64,
    pub fetch_retries: u8,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            weights: CriterionWeights::default(),
            thresholds: ScoreThresholds::default(),
            evidence_bonus: EvidenceBonusTable::default(),
            contraindication_penalty: ContraindicationPenalty::default(),
            cache_ttl_secs: 300,
            fetch_timeout_ms: 5_000,
            fetch_retries: 1,
        }
    }
}

impl MatchingConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.evidence_bonus.validate()?;
        self.contraindication_penalty.validate()?;
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "fetch_timeout_ms",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}

/// Weight per positive criterion. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriterionWeights {
    pub performance_status: f64,
    pub biomarkers: f64,
    pub stage: f64,
    pub organ_function: f64,
    pub treatment_history: f64,
    pub age: f64,
}

impl Default for CriterionWeights {
    fn default() -> Self {
        Self {
            performance_status: 0.25,
            biomarkers: 0.25,
            stage: 0.20,
            organ_function: 0.15,
            treatment_history: 0.10,
            age: 0.05,
        }
    }
}

impl CriterionWeights {
    pub fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("performance_status", self.performance_status),
            ("biomarkers", self.biomarkers),
            ("stage", self.stage),
            ("organ_function", self.organ_function),
            ("treatment_history", self.treatment_history),
            ("age", self.age),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.entries().iter().map(|(_, weight)| weight).sum()
    }

    /// Rejects rather than renormalizes.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (criterion, weight) in self.entries() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::NegativeWeight { criterion });
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

/// Score cut-offs used by ranking and classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreThresholds {
    pub minimum_match_score: f64,
    pub acceptable: f64,
    pub good: f64,
    pub excellent: f64,
    pub organ_function_minimum: f64,
    pub safety_exclusion_threshold: f64,
}

impl Default for ScoreThresholds {
    fn default() -> Self {
        Self {
            minimum_match_score: 0.30,
            acceptable: 0.60,
            good: 0.75,
            excellent: 0.90,
            organ_function_minimum: 0.50,
            safety_exclusion_threshold: 0.30,
        }
    }
}

impl ScoreThresholds {
    fn entries(&self) -> [(&'static str, f64); 6] {
        [
            ("minimum_match_score", self.minimum_match_score),
            ("acceptable", self.acceptable),
            ("good", self.good),
            ("excellent", self.excellent),
            ("organ_function_minimum", self.organ_function_minimum),
            ("safety_exclusion_threshold", self.safety_exclusion_threshold),
        ]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in self.entries() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ThresholdOutOfRange { name, value });
            }
        }
        if !(self.acceptable <= self.good && self.good <= self.excellent) {
            return Err(ConfigError::ThresholdOrder);
        }
        if self.safety_exclusion_threshold > self.organ_function_minimum {
            return Err(ConfigError::ThresholdOrder);
        }
        Ok(())
    }
}

/// Small additive bonus per evidence grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvidenceBonusTable {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
}

impl Default for EvidenceBonusTable {
    fn default() -> Self {
        Self {
            a: 0.05,
            b: 0.03,
            c: 0.015,
            d: 0.005,
            e: 0.0,
        }
    }
}

impl EvidenceBonusTable {
    pub fn bonus_for(&self, level: EvidenceLevel) -> f64 {
        match level {
            EvidenceLevel::A => self.a,
            EvidenceLevel::B => self.b,
            EvidenceLevel::C => self.c,
            EvidenceLevel::D => self.d,
            EvidenceLevel::E => self.e,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let ordered = [self.a, self.b, self.c, self.d, self.e];
        let monotone = ordered.windows(2).all(|pair| pair[0] >= pair[1]);
        let bounded = ordered
            .iter()
            .all(|bonus| bonus.is_finite() && (0.0..=1.0).contains(bonus));
        if monotone && bounded {
            Ok(())
        } else {
            Err(ConfigError::EvidenceBonusNotMonotone)
        }
    }
}

/// Additive penalty applied per detected contraindication, capped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ContraindicationPenalty {
    pub per_match: f64,
    pub cap: f64,
}

impl Default for ContraindicationPenalty {
    fn default() -> Self {
        Self {
            per_match: 0.3,
            cap: 1.0,
        }
    }
}

impl ContraindicationPenalty {
    pub fn for_matches(&self, matches: usize) -> f64 {
        (self.per_match * matches as f64).min(self.cap)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let valid = |value: f64| value.is_finite() && (0.0..=1.0).contains(&value);
        if valid(self.per_match) && valid(self.cap) {
            Ok(())
        } else {
            Err(ConfigError::InvalidValue {
                key: "contraindication_penalty",
                value: format!("{}/{}", self.per_match, self.cap),
            })
        }
    }
}

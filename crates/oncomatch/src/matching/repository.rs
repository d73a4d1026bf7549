use std::time::Duration;

use async_trait::async_trait;

use super::domain::{ProtocolId, ProtocolStatus, TreatmentLine, TreatmentProtocol};

/// Source of treatment protocols. The engine's only I/O boundary.
#[async_trait]
pub trait ProtocolRepository: Send + Sync {
    /// Protocols applicable to a cancer type, optionally restricted to one line of therapy.
    /// Inactive protocols are omitted unless `include_inactive` is set.
    async fn get_protocols_for_cancer(
        &self,
        cancer_type_id: &str,
        treatment_line: Option<TreatmentLine>,
        include_inactive: bool,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError>;

    async fn get_protocol_by_id(
        &self,
        id: &ProtocolId,
    ) -> Result<Option<TreatmentProtocol>, RepositoryError>;
}

/// Error enumeration for protocol repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("protocol repository unavailable: {0}")]
    Unavailable(String),
    #[error("protocol repository timed out after {0:?}")]
    Timeout(Duration),
    #[error("protocol record not found")]
    NotFound,
    #[error("protocol repository failure: {message}")]
    Backend { message: String },
}

impl RepositoryError {
    /// Failures worth one more attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::Unavailable(_) | RepositoryError::Timeout(_))
    }
}

/// Query predicate shared by in-process repository implementations.
pub fn protocol_matches_query(
    protocol: &TreatmentProtocol,
    cancer_type_id: &str,
    treatment_line: Option<TreatmentLine>,
    include_inactive: bool,
) -> bool {
    protocol.applies_to(cancer_type_id)
        && treatment_line.map_or(true, |line| protocol.line == line)
        && (include_inactive || protocol.status != ProtocolStatus::Inactive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::tests::common::protocol;

    #[test]
    fn only_unavailable_and_timeout_are_transient() {
        assert!(RepositoryError::Unavailable("down".to_string()).is_transient());
        assert!(RepositoryError::Timeout(Duration::from_millis(5)).is_transient());
        assert!(!RepositoryError::NotFound.is_transient());
        assert!(!RepositoryError::Backend {
            message: "corrupt row".to_string()
        }
        .is_transient());
    }

    #[test]
    fn query_filters_line_and_inactive_status() {
        let mut candidate = protocol("carbo-pem");
        assert!(protocol_matches_query(&candidate, "NSCLC", None, false));
        assert!(!protocol_matches_query(
            &candidate,
            "nsclc",
            Some(TreatmentLine::Second),
            false
        ));

        candidate.status = ProtocolStatus::Inactive;
        assert!(!protocol_matches_query(&candidate, "nsclc", None, false));
        assert!(protocol_matches_query(&candidate, "nsclc", None, true));
    }
}

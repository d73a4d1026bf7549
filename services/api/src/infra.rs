use async_trait::async_trait;
use metrics_exporter_prometheus::PrometheusHandle;
use oncomatch::error::AppError;
use oncomatch::matching::domain::{ProtocolId, TreatmentLine, TreatmentProtocol};
use oncomatch::matching::{protocol_matches_query, ProtocolRepository, RepositoryError};
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Protocol catalog held in memory, loaded once from JSON or the built-in demo set.
#[derive(Debug, Default, Clone)]
pub(crate) struct CatalogRepository {
    protocols: Arc<Vec<TreatmentProtocol>>,
}

impl CatalogRepository {
    pub(crate) fn new(protocols: Vec<TreatmentProtocol>) -> Self {
        Self {
            protocols: Arc::new(protocols),
        }
    }

    /// Reads a JSON array of protocols.
    pub(crate) fn from_path(path: &Path) -> Result<Self, AppError> {
        let raw = std::fs::read_to_string(path)?;
        let protocols: Vec<TreatmentProtocol> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), count = protocols.len(), "loaded protocol catalog");
        Ok(Self::new(protocols))
    }

    pub(crate) fn len(&self) -> usize {
        self.protocols.len()
    }
}

#[async_trait]
impl ProtocolRepository for CatalogRepository {
    async fn get_protocols_for_cancer(
        &self,
        cancer_type_id: &str,
        treatment_line: Option<TreatmentLine>,
        include_inactive: bool,
    ) -> Result<Vec<TreatmentProtocol>, RepositoryError> {
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
        Ok(self.protocols.iter().find(|protocol| &protocol.id == id).cloned())
    }
}

/// Accepts the same snake_case names the JSON API uses, e.g. `first` or `fourth_plus`.
pub(crate) fn parse_treatment_line(raw: &str) -> Result<TreatmentLine, String> {
    let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
    serde_json::from_value(serde_json::Value::String(normalized))
        .map_err(|_| {
            format!(
                "'{raw}' is not a treatment line \
                 (first, second, third, fourth_plus, salvage, maintenance, bridging)"
            )
        })
}

use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use survey_engine::error::AppError;
use survey_engine::surveys::{
    DedupKey, RepositoryError, ResponseId, ResponseRecord, ResponseRepository, SchemaError,
    SurveyCatalog, SurveyDefinition,
};
use tracing::{info, warn};

/// Sample survey served when no definitions file is configured.
pub(crate) const BUNDLED_SURVEYS: &str = include_str!("../fixtures/sat_survey.json");

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Catalog over survey definitions loaded once at startup.
#[derive(Debug, Clone, Default)]
pub(crate) struct InMemorySurveyCatalog {
    surveys: Arc<Vec<SurveyDefinition>>,
}

impl InMemorySurveyCatalog {
    pub(crate) fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let raw = match path {
            Some(path) => std::fs::read_to_string(path)?,
            None => BUNDLED_SURVEYS.to_string(),
        };
        let catalog = Self::from_json(&raw)?;
        let source = path
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| "bundled".to_string());
        info!(surveys = catalog.surveys.len(), %source, "survey catalog loaded");
        Ok(catalog)
    }

    /// Parse a JSON array of survey definitions, validating each one.
    pub(crate) fn from_json(raw: &str) -> Result<Self, SchemaError> {
        let surveys: Vec<SurveyDefinition> = serde_json::from_str(raw)?;
        for survey in &surveys {
            survey.validate()?;
            for mismatch in survey.declared_point_mismatches() {
                warn!(
                    survey = %survey.slug,
                    field_key = mismatch.field_key.as_deref().unwrap_or("<maxScore>"),
                    declared = mismatch.declared,
                    achievable = mismatch.achievable,
                    "declared points disagree with scoring rules"
                );
            }
        }
        Ok(Self {
            surveys: Arc::new(surveys),
        })
    }

    pub(crate) fn surveys(&self) -> &[SurveyDefinition] {
        &self.surveys
    }
}

impl SurveyCatalog for InMemorySurveyCatalog {
    fn by_slug(&self, slug: &str) -> Result<Option<SurveyDefinition>, RepositoryError> {
        Ok(self.surveys.iter().find(|survey| survey.slug == slug).cloned())
    }

    fn by_id(&self, id: &str) -> Result<Option<SurveyDefinition>, RepositoryError> {
        Ok(self.surveys.iter().find(|survey| survey.id == id).cloned())
    }
}

#[derive(Default, Clone)]
pub(crate) struct InMemoryResponseRepository {
    records: Arc<Mutex<HashMap<ResponseId, ResponseRecord>>>,
}

impl InMemoryResponseRepository {
    fn lock(&self) -> Result<MutexGuard<'_, HashMap<ResponseId, ResponseRecord>>, RepositoryError> {
        self.records
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ResponseRepository for InMemoryResponseRepository {
    fn insert(&self, record: ResponseRecord) -> Result<ResponseRecord, RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn insert_unique(
        &self,
        record: ResponseRecord,
        key: &DedupKey,
    ) -> Result<ResponseRecord, RepositoryError> {
        let mut guard = self.lock()?;
        if guard
            .values()
            .any(|stored| key.is_held_by(&record.survey_id, stored))
        {
            return Err(RepositoryError::DuplicateKey);
        }
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ResponseRecord) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        if guard.contains_key(&record.id) {
            guard.insert(record.id.clone(), record);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn modify(
        &self,
        id: &ResponseId,
        change: &mut dyn FnMut(&mut ResponseRecord),
    ) -> Result<ResponseRecord, RepositoryError> {
        let mut guard = self.lock()?;
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        change(record);
        Ok(record.clone())
    }

    fn fetch(&self, id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError> {
        let guard = self.lock()?;
        Ok(guard.get(id).cloned())
    }

    fn list_for_survey(&self, survey_id: &str) -> Result<Vec<ResponseRecord>, RepositoryError> {
        let guard = self.lock()?;
        let mut records: Vec<ResponseRecord> = guard
            .values()
            .filter(|record| record.survey_id == survey_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }
}

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};

use crate::surveys::repository::{
    DedupKey, RepositoryError, ResponseRecord, ResponseRepository, SurveyCatalog,
};
use crate::surveys::schema::{QuestionId, ResponseId, SurveyDefinition};
use crate::surveys::throttle::InMemorySubmissionThrottle;
use crate::surveys::{survey_router, SurveyResponseService};

pub(super) const SURVEY_ID: &str = "survey-focus";
pub(super) const SLUG: &str = "focus-group";

/// Focus-group screener: 45 declared points across five scored questions.
pub(super) fn survey_json() -> Value {
    json!({
        "id": SURVEY_ID,
        "slug": SLUG,
        "title": "Focus group screener",
        "status": "ACTIVE",
        "maxScore": 45,
        "dedupFieldKey": "handle",
        "pages": [
            {
                "title": "About you",
                "questions": [
                    { "id": "q-name", "fieldKey": "name", "label": "Name", "type": "TEXT", "required": true },
                    { "id": "q-handle", "fieldKey": "handle", "label": "Telegram", "type": "TEXT", "required": true },
                    {
                        "id": "q-timeline",
                        "fieldKey": "satTimeline",
                        "label": "When will you sit the SAT?",
                        "type": "RADIO",
                        "required": true,
                        "scoringCategory": "timeline",
                        "maxPoints": 20,
                        "options": [
                            { "id": "opt-taken", "value": "already_taken", "label": "Already taken", "points": 18 },
                            { "id": "opt-soon", "value": "next_3_months", "label": "Within 3 months", "points": 20 }
                        ]
                    },
                    {
                        "id": "q-taken",
                        "fieldKey": "hasTakenSat",
                        "label": "Taken the SAT before?",
                        "type": "BOOLEAN",
                        "required": true,
                        "scoringCategory": "hasTakenSat",
                        "maxPoints": 5,
                        "options": [
                            { "id": "opt-yes", "value": "true", "label": "Yes", "points": 5 },
                            { "id": "opt-no", "value": "false", "label": "No", "points": 0 }
                        ]
                    },
                    {
                        "id": "q-previous",
                        "fieldKey": "previousScore",
                        "label": "Previous score",
                        "type": "NUMBER",
                        "required": true,
                        "scoringCategory": "previousScore",
                        "maxPoints": 10,
                        "showIf": { "fieldKey": "hasTakenSat", "value": true },
                        "scoringRules": {
                            "type": "range",
                            "tiers": [
                                { "min": 1400, "points": 10 },
                                { "min": 1200, "points": 8 },
                                { "min": 0, "points": 2 }
                            ]
                        }
                    }
                ]
            },
            {
                "title": "Preparation",
                "questions": [
                    {
                        "id": "q-resources",
                        "fieldKey": "resources",
                        "label": "Resources",
                        "type": "CHECKBOX",
                        "required": true,
                        "scoringCategory": "resources",
                        "maxPoints": 5,
                        "scoringRules": {
                            "type": "count",
                            "tiers": [
                                { "min": 2, "points": 5 },
                                { "min": 1, "points": 3 }
                            ]
                        },
                        "options": [
                            { "id": "opt-khan", "value": "khan_academy", "label": "Khan Academy" },
                            { "id": "opt-youtube", "value": "youtube", "label": "YouTube" },
                            { "id": "opt-books", "value": "books", "label": "Books" }
                        ]
                    },
                    {
                        "id": "q-motivation",
                        "fieldKey": "motivation",
                        "label": "Motivation",
                        "type": "TEXTAREA",
                        "required": false,
                        "scoringCategory": "motivation",
                        "maxPoints": 5,
                        "scoringRules": {
                            "type": "textLength",
                            "tiers": [
                                { "min": 200, "points": 5 },
                                { "min": 100, "points": 4 },
                                { "min": 50, "points": 2.5 },
                                { "min": 20, "points": 1.5 }
                            ]
                        }
                    },
                    { "id": "q-consent", "fieldKey": "consent", "label": "I agree", "type": "CONSENT", "required": true }
                ]
            }
        ]
    })
}

pub(super) fn survey() -> SurveyDefinition {
    SurveyDefinition::from_json(&survey_json().to_string()).expect("fixture survey is valid")
}

pub(super) fn survey_with_status(status: &str) -> SurveyDefinition {
    let mut raw = survey_json();
    raw["status"] = json!(status);
    SurveyDefinition::from_json(&raw.to_string()).expect("fixture survey is valid")
}

/// Scores 25 of 45: timeline 20, resources 5, everything else 0.
pub(super) fn answers() -> Map<String, Value> {
    let raw = json!({
        "name": "Aida",
        "handle": "@aida",
        "satTimeline": "next_3_months",
        "hasTakenSat": false,
        "resources": ["khan_academy", "youtube"],
        "motivation": "",
        "consent": true
    });
    match raw {
        Value::Object(map) => map,
        _ => unreachable!("fixture answers are an object"),
    }
}

pub(super) fn answers_with(overrides: Value) -> Map<String, Value> {
    let mut map = answers();
    if let Value::Object(extra) = overrides {
        map.extend(extra);
    }
    map
}

pub(super) fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_760_000_000 + secs, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn qid(raw: &str) -> QuestionId {
    QuestionId(raw.to_string())
}

pub(super) type TestService =
    SurveyResponseService<MemoryCatalog, MemoryRepository, InMemorySubmissionThrottle>;

pub(super) fn build_service() -> (TestService, Arc<MemoryRepository>) {
    build_service_with(MemoryCatalog::with(survey()))
}

pub(super) fn build_service_with(catalog: MemoryCatalog) -> (TestService, Arc<MemoryRepository>) {
    let repository = Arc::new(MemoryRepository::default());
    let service = SurveyResponseService::new(
        Arc::new(catalog),
        repository.clone(),
        Arc::new(InMemorySubmissionThrottle::new(3600)),
    );
    (service, repository)
}

/// Three stored responses from separate sources, oldest first: 25, 23 and 40 points.
pub(super) fn submit_ranked_batch(service: &TestService) -> Vec<ResponseRecord> {
    let batch = [
        ("10.0.0.1", answers(), 0),
        (
            "10.0.0.2",
            answers_with(json!({ "handle": "@aida_two", "satTimeline": "already_taken" })),
            100,
        ),
        (
            "10.0.0.3",
            answers_with(json!({
                "name": "Bolat",
                "handle": "@bolat",
                "hasTakenSat": true,
                "previousScore": 1450
            })),
            200,
        ),
    ];

    batch
        .into_iter()
        .map(|(source, raw, secs)| {
            service
                .submit_at(SLUG, source, &raw, at(secs))
                .expect("batch submission succeeds")
        })
        .collect()
}

pub(super) fn survey_router_with_service(service: TestService) -> axum::Router {
    survey_router(Arc::new(service))
}

#[derive(Default, Clone)]
pub(super) struct MemoryCatalog {
    surveys: Vec<SurveyDefinition>,
}

impl MemoryCatalog {
    pub(super) fn with(survey: SurveyDefinition) -> Self {
        Self {
            surveys: vec![survey],
        }
    }
}

impl SurveyCatalog for MemoryCatalog {
    fn by_slug(&self, slug: &str) -> Result<Option<SurveyDefinition>, RepositoryError> {
        Ok(self.surveys.iter().find(|survey| survey.slug == slug).cloned())
    }

    fn by_id(&self, id: &str) -> Result<Option<SurveyDefinition>, RepositoryError> {
        Ok(self.surveys.iter().find(|survey| survey.id == id).cloned())
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<HashMap<ResponseId, ResponseRecord>>>,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }
}

impl ResponseRepository for MemoryRepository {
    fn insert(&self, record: ResponseRecord) -> Result<ResponseRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
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
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard.values().any(|stored| key.is_held_by(&record.survey_id, stored)) {
            return Err(RepositoryError::DuplicateKey);
        }
        if guard.contains_key(&record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn update(&self, record: ResponseRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
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
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        change(record);
        Ok(record.clone())
    }

    fn fetch(&self, id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn list_for_survey(&self, survey_id: &str) -> Result<Vec<ResponseRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .values()
            .filter(|record| record.survey_id == survey_id)
            .cloned()
            .collect())
    }
}

pub(super) struct ConflictRepository;

impl ResponseRepository for ConflictRepository {
    fn insert(&self, _record: ResponseRecord) -> Result<ResponseRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn insert_unique(
        &self,
        _record: ResponseRecord,
        _key: &DedupKey,
    ) -> Result<ResponseRecord, RepositoryError> {
        Err(RepositoryError::Conflict)
    }

    fn update(&self, _record: ResponseRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn modify(
        &self,
        _id: &ResponseId,
        _change: &mut dyn FnMut(&mut ResponseRecord),
    ) -> Result<ResponseRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("read only".to_string()))
    }

    fn fetch(&self, _id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError> {
        Ok(None)
    }

    fn list_for_survey(&self, _survey_id: &str) -> Result<Vec<ResponseRecord>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub(super) struct UnavailableRepository;

impl UnavailableRepository {
    fn offline() -> RepositoryError {
        RepositoryError::Unavailable("database offline".to_string())
    }
}

impl ResponseRepository for UnavailableRepository {
    fn insert(&self, _record: ResponseRecord) -> Result<ResponseRecord, RepositoryError> {
        Err(Self::offline())
    }

    fn insert_unique(
        &self,
        _record: ResponseRecord,
        _key: &DedupKey,
    ) -> Result<ResponseRecord, RepositoryError> {
        Err(Self::offline())
    }

    fn update(&self, _record: ResponseRecord) -> Result<(), RepositoryError> {
        Err(Self::offline())
    }

    fn modify(
        &self,
        _id: &ResponseId,
        _change: &mut dyn FnMut(&mut ResponseRecord),
    ) -> Result<ResponseRecord, RepositoryError> {
        Err(Self::offline())
    }

    fn fetch(&self, _id: &ResponseId) -> Result<Option<ResponseRecord>, RepositoryError> {
        Err(Self::offline())
    }

    fn list_for_survey(&self, _survey_id: &str) -> Result<Vec<ResponseRecord>, RepositoryError> {
        Err(Self::offline())
    }
}

pub(super) fn assert_conflict_response(response: Response) {
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

//! End-to-end scenarios for survey intake, scoring and review.
//!
//! Everything here goes through the public service facade and HTTP router, using a small
//! beta-tester screener whose questions exercise every rule kind.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::{json, Map, Value};

    use survey_engine::surveys::{
        DedupKey, InMemorySubmissionThrottle, RepositoryError, ResponseId, ResponseRecord,
        ResponseRepository, SurveyCatalog, SurveyDefinition, SurveyResponseService,
    };

    pub(super) const SLUG: &str = "beta";

    pub(super) fn survey() -> SurveyDefinition {
        let raw = json!({
            "id": "survey-beta",
            "slug": SLUG,
            "title": "Beta tester screener",
            "status": "ACTIVE",
            "maxScore": 30,
            "dedupFieldKey": "email",
            "scoreTiers": [
                { "label": "Invite", "min": 70 },
                { "label": "Waitlist", "min": 0 }
            ],
            "pages": [{
                "title": "Screener",
                "questions": [
                    { "id": "q-email", "fieldKey": "email", "label": "Email", "type": "TEXT", "required": true },
                    {
                        "id": "q-devices",
                        "fieldKey": "devices",
                        "label": "Devices",
                        "type": "CHIP_SELECT",
                        "required": true,
                        "scoringCategory": "reach",
                        "maxPoints": 10,
                        "scoringRules": { "type": "count", "tiers": [{ "min": 3, "points": 10 }, { "min": 1, "points": 4 }] },
                        "options": [
                            { "id": "opt-ios", "value": "ios", "label": "iOS" },
                            { "id": "opt-android", "value": "android", "label": "Android" },
                            { "id": "opt-web", "value": "web", "label": "Web" }
                        ]
                    },
                    {
                        "id": "q-hours",
                        "fieldKey": "hours",
                        "label": "Hours per week",
                        "type": "NUMBER",
                        "required": true,
                        "scoringCategory": "commitment",
                        "maxPoints": 10,
                        "scoringRules": { "type": "range", "tiers": [{ "min": 5, "points": 10 }, { "min": 2, "points": 5 }] }
                    },
                    {
                        "id": "q-pitch",
                        "fieldKey": "pitch",
                        "label": "Why you?",
                        "type": "TEXTAREA",
                        "required": false,
                        "scoringCategory": "commitment",
                        "maxPoints": 10,
                        "scoringRules": { "type": "textLength", "tiers": [{ "min": 40, "points": 10 }, { "min": 10, "points": 3 }] }
                    }
                ]
            }]
        });
        SurveyDefinition::from_json(&raw.to_string()).expect("survey loads")
    }

    pub(super) fn answers(email: &str) -> Map<String, Value> {
        let raw = json!({
            "email": email,
            "devices": ["ios", "android", "web"],
            "hours": "6",
            "pitch": "I file detailed bug reports"
        });
        match raw {
            Value::Object(map) => map,
            _ => unreachable!("answers are an object"),
        }
    }

    pub(super) struct SingleSurvey(pub(super) SurveyDefinition);

    impl SurveyCatalog for SingleSurvey {
        fn by_slug(&self, slug: &str) -> Result<Option<SurveyDefinition>, RepositoryError> {
            Ok((self.0.slug == slug).then(|| self.0.clone()))
        }

        fn by_id(&self, id: &str) -> Result<Option<SurveyDefinition>, RepositoryError> {
            Ok((self.0.id == id).then(|| self.0.clone()))
        }
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryRepository {
        records: Arc<Mutex<HashMap<ResponseId, ResponseRecord>>>,
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
            guard.insert(record.id.clone(), record.clone());
            Ok(record)
        }

        fn update(&self, record: ResponseRecord) -> Result<(), RepositoryError> {
            let mut guard = self.records.lock().expect("repository mutex poisoned");
            match guard.get_mut(&record.id) {
                Some(slot) => {
                    *slot = record;
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
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

    pub(super) type Service =
        SurveyResponseService<SingleSurvey, MemoryRepository, InMemorySubmissionThrottle>;

    pub(super) fn service() -> Arc<Service> {
        Arc::new(SurveyResponseService::new(
            Arc::new(SingleSurvey(survey())),
            Arc::new(MemoryRepository::default()),
            Arc::new(InMemorySubmissionThrottle::default()),
        ))
    }
}

mod scoring {
    use super::common::*;
    use survey_engine::surveys::{ResponseStatus, ReviewUpdate};

    #[test]
    fn strong_candidate_is_invited() {
        let service = service();

        let record = service
            .submit(SLUG, "192.0.2.1", &answers("ada@example.com"))
            .expect("submission succeeds");

        // reach 10, commitment 10 + 3.
        assert_eq!(record.score.total_score, 23.0);
        assert_eq!(record.score.score_percentage, 77);
        assert_eq!(record.score.score_breakdown.get("reach"), Some(&10.0));
        assert_eq!(record.score.score_breakdown.get("commitment"), Some(&13.0));

        let view = service.status_view(&record.id).expect("view builds");
        assert_eq!(view.rating.as_deref(), Some("Invite"));
    }

    #[test]
    fn review_then_rescore_keeps_review_fields() {
        let service = service();
        let record = service
            .submit(SLUG, "192.0.2.2", &answers("grace@example.com"))
            .expect("submission succeeds");

        service
            .review(
                &record.id,
                ReviewUpdate {
                    status: Some(ResponseStatus::Shortlisted),
                    admin_notes: None,
                },
            )
            .expect("review succeeds");
        let rescored = service.rescore(&record.id).expect("rescore succeeds");

        assert_eq!(rescored.status, ResponseStatus::Shortlisted);
        assert_eq!(rescored.score, record.score);
    }
}

mod routing {
    use super::common::*;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use survey_engine::surveys::survey_router;
    use tower::ServiceExt;

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    fn submit(email: &str, real_ip: &str) -> Request<axum::body::Body> {
        Request::post(format!("/api/v1/surveys/{SLUG}/responses"))
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-real-ip", real_ip)
            .body(axum::body::Body::from(
                json!({ "answers": answers(email) }).to_string(),
            ))
            .expect("request builds")
    }

    #[tokio::test]
    async fn submission_flow_over_http() {
        let router = survey_router(service());

        let created = router
            .clone()
            .oneshot(submit("linus@example.com", "192.0.2.10"))
            .await
            .expect("route executes");
        assert_eq!(created.status(), StatusCode::CREATED);
        let payload = read_json(created).await;
        assert_eq!(payload["percentage"], 77);
        let id = payload["id"].as_str().expect("id returned").to_string();

        let duplicate = router
            .clone()
            .oneshot(submit("linus@example.com", "192.0.2.11"))
            .await
            .expect("route executes");
        assert_eq!(duplicate.status(), StatusCode::CONFLICT);

        let shown = router
            .oneshot(
                Request::get(format!("/api/v1/responses/{id}"))
                    .body(axum::body::Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");
        assert_eq!(shown.status(), StatusCode::OK);
        let view = read_json(shown).await;
        assert_eq!(view["survey_slug"], SLUG);
        assert_eq!(view["score_breakdown"]["reach"], json!(10.0));
    }

    #[tokio::test]
    async fn unknown_survey_returns_not_found() {
        let router = survey_router(service());

        let response = router
            .oneshot(
                Request::get("/api/v1/surveys/missing/stats")
                    .body(axum::body::Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

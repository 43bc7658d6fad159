use super::common::*;

use crate::surveys::listing::{ResponsePage, ResponseQuery, ResponseSort, MAX_PAGE_SIZE};
use crate::surveys::repository::ResponseStatus;
use crate::surveys::service::{ResponseServiceError, ReviewUpdate};

fn scores(page: &ResponsePage) -> Vec<f64> {
    page.responses
        .iter()
        .map(|record| record.score.total_score)
        .collect()
}

fn query(sort: ResponseSort) -> ResponseQuery {
    ResponseQuery {
        sort,
        ..ResponseQuery::default()
    }
}

#[test]
fn score_sorts_rank_candidates() {
    let (service, _) = build_service();
    submit_ranked_batch(&service);

    let best_first = service
        .list(SLUG, &query(ResponseSort::ScoreDesc))
        .expect("listing builds");
    assert_eq!(scores(&best_first), vec![40.0, 25.0, 23.0]);
    assert_eq!(best_first.total, 3);

    let worst_first = service
        .list(SLUG, &query(ResponseSort::ScoreAsc))
        .expect("listing builds");
    assert_eq!(scores(&worst_first), vec![23.0, 25.0, 40.0]);
}

#[test]
fn default_listing_is_newest_first() {
    let (service, _) = build_service();
    let batch = submit_ranked_batch(&service);

    let newest_first = service
        .list(SLUG, &ResponseQuery::default())
        .expect("listing builds");
    let ids: Vec<_> = newest_first.responses.iter().map(|record| &record.id).collect();
    assert_eq!(ids, vec![&batch[2].id, &batch[1].id, &batch[0].id]);

    let oldest_first = service
        .list(SLUG, &query(ResponseSort::DateAsc))
        .expect("listing builds");
    assert_eq!(oldest_first.responses[0].id, batch[0].id);
}

#[test]
fn unknown_sort_names_fall_back_to_newest_first() {
    assert_eq!(ResponseSort::parse("score_desc"), ResponseSort::ScoreDesc);
    assert_eq!(ResponseSort::parse("date_asc"), ResponseSort::DateAsc);
    assert_eq!(ResponseSort::parse("by_vibes"), ResponseSort::DateDesc);
}

#[test]
fn status_filter_narrows_results_and_total() {
    let (service, _) = build_service();
    let batch = submit_ranked_batch(&service);
    service
        .review(
            &batch[1].id,
            ReviewUpdate {
                status: Some(ResponseStatus::Selected),
                admin_notes: None,
            },
        )
        .expect("review succeeds");

    let selected = service
        .list(
            SLUG,
            &ResponseQuery {
                status: Some(ResponseStatus::Selected),
                ..ResponseQuery::default()
            },
        )
        .expect("listing builds");

    assert_eq!(selected.total, 1);
    assert_eq!(selected.responses[0].id, batch[1].id);
}

#[test]
fn search_matches_text_answers_case_insensitively() {
    let (service, _) = build_service();
    submit_ranked_batch(&service);

    let search = |needle: &str| {
        service
            .list(
                SLUG,
                &ResponseQuery {
                    search: Some(needle.to_string()),
                    ..ResponseQuery::default()
                },
            )
            .expect("listing builds")
            .total
    };

    assert_eq!(search("BOLAT"), 1);
    assert_eq!(search("aid"), 2);
    assert_eq!(search(""), 3);
    // choice answers are not text
    assert_eq!(search("next_3_months"), 0);
}

#[test]
fn pages_are_limited_and_report_the_full_total() {
    let (service, _) = build_service();
    let batch = submit_ranked_batch(&service);

    let second_page = service
        .list(
            SLUG,
            &ResponseQuery {
                page: 2,
                limit: 2,
                ..ResponseQuery::default()
            },
        )
        .expect("listing builds");
    assert_eq!(second_page.total, 3);
    assert_eq!(second_page.page, 2);
    assert_eq!(second_page.limit, 2);
    assert_eq!(second_page.responses.len(), 1);
    assert_eq!(second_page.responses[0].id, batch[0].id);

    let past_the_end = service
        .list(
            SLUG,
            &ResponseQuery {
                page: 5,
                limit: 2,
                ..ResponseQuery::default()
            },
        )
        .expect("listing builds");
    assert!(past_the_end.responses.is_empty());
    assert_eq!(past_the_end.total, 3);
}

#[test]
fn page_bounds_are_clamped() {
    let (service, _) = build_service();
    submit_ranked_batch(&service);

    let clamped = service
        .list(
            SLUG,
            &ResponseQuery {
                page: 0,
                limit: 0,
                ..ResponseQuery::default()
            },
        )
        .expect("listing builds");
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.limit, 1);
    assert_eq!(clamped.responses.len(), 1);

    let oversized = service
        .list(
            SLUG,
            &ResponseQuery {
                limit: 10_000,
                ..ResponseQuery::default()
            },
        )
        .expect("listing builds");
    assert_eq!(oversized.limit, MAX_PAGE_SIZE);
}

#[test]
fn listing_unknown_survey_is_not_found() {
    let (service, _) = build_service();
    assert!(matches!(
        service.list("nope", &ResponseQuery::default()),
        Err(ResponseServiceError::SurveyNotFound(_))
    ));
}

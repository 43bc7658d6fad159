//! Reviewer listing: filter, rank and page the responses of one survey.

use std::cmp::Ordering;

use serde::Serialize;

use super::repository::{ResponseRecord, ResponseStatus};

pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const MAX_PAGE_SIZE: usize = 200;

/// Order of a response listing; newest first unless asked otherwise.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSort {
    ScoreDesc,
    ScoreAsc,
    DateAsc,
    #[default]
    DateDesc,
}

impl ResponseSort {
    /// Unknown names fall back to the default order.
    pub fn parse(raw: &str) -> Self {
        match raw {
            "score_desc" => ResponseSort::ScoreDesc,
            "score_asc" => ResponseSort::ScoreAsc,
            "date_asc" => ResponseSort::DateAsc,
            _ => ResponseSort::DateDesc,
        }
    }

    fn compare(self, a: &ResponseRecord, b: &ResponseRecord) -> Ordering {
        let by_score = || a.score.total_score.total_cmp(&b.score.total_score);
        match self {
            ResponseSort::ScoreDesc => by_score()
                .reverse()
                .then_with(|| b.created_at.cmp(&a.created_at)),
            ResponseSort::ScoreAsc => by_score().then_with(|| b.created_at.cmp(&a.created_at)),
            ResponseSort::DateAsc => a.created_at.cmp(&b.created_at),
            ResponseSort::DateDesc => b.created_at.cmp(&a.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseQuery {
    pub status: Option<ResponseStatus>,
    /// Case-insensitive substring matched against text answers.
    pub search: Option<String>,
    pub sort: ResponseSort,
    /// One-based page number.
    pub page: usize,
    pub limit: usize,
}

impl Default for ResponseQuery {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            sort: ResponseSort::default(),
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ResponseQuery {
    fn page(&self) -> usize {
        self.page.max(1)
    }

    fn limit(&self) -> usize {
        self.limit.clamp(1, MAX_PAGE_SIZE)
    }

    fn matches(&self, record: &ResponseRecord, needle: Option<&str>) -> bool {
        if self.status.is_some_and(|status| status != record.status) {
            return false;
        }
        match needle {
            Some(needle) => record
                .answers
                .iter()
                .filter_map(|answer| answer.text())
                .any(|text| text.to_lowercase().contains(needle)),
            None => true,
        }
    }
}

/// One page of a ranked listing; `total` counts every match, not just this page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponsePage {
    pub responses: Vec<ResponseRecord>,
    pub total: usize,
    pub page: usize,
    pub limit: usize,
}

pub fn select(responses: Vec<ResponseRecord>, query: &ResponseQuery) -> ResponsePage {
    let needle = query
        .search
        .as_deref()
        .filter(|search| !search.is_empty())
        .map(str::to_lowercase);

    let mut matched: Vec<ResponseRecord> = responses
        .into_iter()
        .filter(|record| query.matches(record, needle.as_deref()))
        .collect();
    matched.sort_by(|a, b| query.sort.compare(a, b));

    let total = matched.len();
    let page = query.page();
    let limit = query.limit();
    let responses = matched
        .into_iter()
        .skip((page - 1).saturating_mul(limit))
        .take(limit)
        .collect();

    ResponsePage {
        responses,
        total,
        page,
        limit,
    }
}

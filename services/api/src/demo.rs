use crate::infra::{InMemoryResponseRepository, InMemorySurveyCatalog};
use chrono::Utc;
use clap::Args;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use survey_engine::error::AppError;
use survey_engine::surveys::{
    RatingBand, ResponseQuery, ResponseServiceError, ResponseSort, ResponseStatus, ReviewUpdate,
    ScoringEngine, ScoringResult, SubmissionGuard, SurveyCatalog, SurveyDefinition,
    SurveyResponseService, Unthrottled,
};

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON answers file: either a `fieldKey -> value` object or `{ "answers": {...} }`
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// Survey slug to score against
    #[arg(long, default_value = "sat")]
    pub(crate) slug: String,
    /// JSON file with an array of survey definitions (defaults to the bundled sample)
    #[arg(long)]
    pub(crate) surveys: Option<PathBuf>,
    /// Print the full scoring result as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// JSON file with an array of survey definitions (defaults to the bundled sample)
    #[arg(long)]
    pub(crate) surveys: Option<PathBuf>,
    /// Survey slug to run the demo against
    #[arg(long)]
    pub(crate) slug: Option<String>,
    /// Print the CSV export after the stats summary
    #[arg(long)]
    pub(crate) export: bool,
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        answers,
        slug,
        surveys,
        json,
    } = args;

    let catalog = InMemorySurveyCatalog::load(surveys.as_deref())?;
    let survey = catalog
        .by_slug(&slug)
        .map_err(ResponseServiceError::from)?
        .ok_or_else(|| ResponseServiceError::SurveyNotFound(slug.clone()))?;

    let raw = std::fs::read_to_string(&answers)?;
    let parsed: Value = serde_json::from_str(&raw).map_err(|err| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is not valid JSON: {err}", answers.display()),
        )
    })?;
    let submitted = answers_object(parsed).ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} must hold a JSON object of answers", answers.display()),
        )
    })?;

    let records = SubmissionGuard::new()
        .prepare(&survey, &submitted)
        .map_err(ResponseServiceError::from)?;
    let result = ScoringEngine::new().score_survey(&survey, &records);

    if json {
        let payload = json!({
            "survey": survey.slug,
            "total_score": result.total_score,
            "score_percentage": result.score_percentage,
            "score_breakdown": result.score_breakdown,
            "answer_points": result.answer_points,
        });
        match serde_json::to_string_pretty(&payload) {
            Ok(text) => println!("{text}"),
            Err(err) => println!("Scoring result unavailable: {err}"),
        }
    } else {
        render_result(&survey, &result);
    }

    Ok(())
}

fn answers_object(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(mut map) => match map.remove("answers") {
            Some(Value::Object(inner)) => Some(inner),
            Some(other) => {
                map.insert("answers".to_string(), other);
                Some(map)
            }
            None => Some(map),
        },
        _ => None,
    }
}

fn render_result(survey: &SurveyDefinition, result: &ScoringResult) {
    let rating = RatingBand::classify(result.score_percentage, &survey.rating_bands)
        .map(|band| band.label.as_str())
        .unwrap_or("-");

    println!(
        "{}: {} / {} points ({}%, {})",
        survey.title, result.total_score, survey.max_score, result.score_percentage, rating
    );
    println!("Breakdown by category:");
    for (category, points) in &result.score_breakdown {
        println!("  - {category}: {points}");
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        surveys,
        slug,
        export,
    } = args;

    let catalog = InMemorySurveyCatalog::load(surveys.as_deref())?;
    let slug = match slug.or_else(|| catalog.surveys().first().map(|s| s.slug.clone())) {
        Some(slug) => slug,
        None => {
            println!("No surveys configured");
            return Ok(());
        }
    };

    println!("Survey scoring demo ({slug})");
    let repository = Arc::new(InMemoryResponseRepository::default());
    let service = SurveyResponseService::new(Arc::new(catalog), repository, Arc::new(Unthrottled));

    for (index, candidate) in demo_candidates().into_iter().enumerate() {
        let source = format!("demo-{index}");
        match service.submit(&slug, &source, &candidate) {
            Ok(record) => println!(
                "- Scored response {} -> {} points ({}%)",
                record.id, record.score.total_score, record.score.score_percentage
            ),
            Err(err) => println!("- Submission rejected: {err}"),
        }
    }

    let ranking = service.list(
        &slug,
        &ResponseQuery {
            sort: ResponseSort::ScoreDesc,
            ..ResponseQuery::default()
        },
    )?;
    println!("\nRanking ({} candidates):", ranking.total);
    for (position, record) in ranking.responses.iter().enumerate() {
        println!(
            "  {}. {} -> {} points",
            position + 1,
            record.id,
            record.score.total_score
        );
    }

    if let Some(best) = ranking.responses.first() {
        let update = ReviewUpdate {
            status: Some(ResponseStatus::Shortlisted),
            admin_notes: Some("highest score in demo batch".to_string()),
        };
        match service
            .review(&best.id, update)
            .and_then(|_| service.status_view(&best.id))
        {
            Ok(view) => match serde_json::to_string_pretty(&view) {
                Ok(json) => println!("  Shortlisted payload:\n{json}"),
                Err(err) => println!("  Shortlisted payload unavailable: {err}"),
            },
            Err(err) => println!("  Review failed: {err}"),
        }
    }

    let stats = service.stats(&slug, Utc::now())?;
    println!(
        "\n{}: {} responses | average {} / {}",
        stats.survey_title, stats.total, stats.avg_score, stats.max_score
    );
    println!("Rating bands:");
    for band in &stats.rating_counts {
        println!("  - {} (>= {}%): {}", band.label, band.min, band.count);
    }

    if export {
        let csv = service.export_csv(&slug)?;
        println!("\n{csv}");
    }

    Ok(())
}

fn demo_candidates() -> Vec<Map<String, Value>> {
    let candidates = [
        json!({
            "name": "Aruzhan",
            "telegramUsername": "@aruzhan",
            "age": 17,
            "city": "Almaty",
            "educationLevel": "11_class",
            "satTimeline": "next_3_months",
            "hasTakenSat": true,
            "previousScore": 1320,
            "weeklyHours": "3_to_7",
            "resources": ["khan_academy", "college_board", "books", "tutor"],
            "whatYouLike": "Practice tests with detailed explanations make it easy to see exactly which reading skills still need work, and the progress feels measurable week to week. I also like timed drills because they build stamina for the real exam day.",
            "whatFrustrates": "Finding good math practice for the hardest questions is difficult and most free material repeats the same easy patterns.",
            "motivation": "I want to help shape a preparation course that fits students like me who study on their own after school, and I can share what worked and what wasted my time over the past year of preparing for this test.",
            "sessionReadiness": "definitely",
            "availableDays": ["mon", "wed", "fri", "sat", "sun"],
            "availableTimes": ["afternoon", "evening"],
            "consentData": true,
            "consentRecording": true,
            "referralSource": "friend"
        }),
        json!({
            "name": "Daniyar",
            "telegramUsername": "@daniyar",
            "age": 16,
            "city": "Astana",
            "educationLevel": "10_class",
            "satTimeline": "6_to_12",
            "hasTakenSat": false,
            "weeklyHours": "1_to_3",
            "resources": ["youtube"],
            "whatYouLike": "Short video lessons",
            "whatFrustrates": "Not sure where to start with grammar rules.",
            "motivation": "Curious about the format and want to learn more.",
            "sessionReadiness": "maybe",
            "availableDays": ["sat"],
            "availableTimes": ["morning"],
            "consentData": true,
            "consentRecording": true
        }),
        json!({
            "name": "Madina",
            "telegramUsername": "@madina",
            "age": 18,
            "city": "Shymkent",
            "educationLevel": "gap_year",
            "satTimeline": "already_taken",
            "hasTakenSat": true,
            "weeklyHours": "7_to_14",
            "resources": ["prep_course", "books"],
            "whatYouLike": "Structured courses",
            "whatFrustrates": "Expensive tutors",
            "motivation": "Retaking to improve my score",
            "sessionReadiness": "probably",
            "availableDays": ["tue", "thu"],
            "availableTimes": ["evening"],
            "consentData": true,
            "consentRecording": false
        }),
    ];

    candidates
        .into_iter()
        .filter_map(|candidate| match candidate {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Local, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    models::{Concert, ConcertTag, References, SearchQuery, TagFilter},
    services::{DispatchReport, SearchHit, SubscriberDigest},
};

use super::AppState;

// Request/Response types

/// Query string of the concert search page
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_range: bool,
    /// Comma-separated tag codes, e.g. `OG,CV`
    pub tags: Option<String>,
    /// Comma-separated catalog ids of reference artists
    pub artists: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ConcertResponse {
    pub concert_id: i64,
    pub date: NaiveDate,
    pub venue: String,
    pub performers: Vec<String>,
    pub tags: Vec<ConcertTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl ConcertResponse {
    fn new(concert: &Concert, score: Option<f64>) -> Self {
        Self {
            concert_id: concert.concert_id,
            date: concert.date,
            venue: concert.venue.name.clone(),
            performers: concert.bill.iter().map(|artist| artist.name.clone()).collect(),
            tags: concert.tags.iter().copied().collect(),
            score,
        }
    }
}

impl From<&SearchHit> for ConcertResponse {
    fn from(hit: &SearchHit) -> Self {
        Self::new(&hit.concert, hit.score)
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub concerts: Vec<ConcertResponse>,
    pub degraded: bool,
}

#[derive(Debug, Serialize)]
pub struct DigestPreviewResponse {
    pub subscriber_id: i64,
    pub contact_address: String,
    pub used_fallback: bool,
    pub degraded: bool,
    pub concerts: Vec<ConcertResponse>,
}

impl From<&SubscriberDigest> for DigestPreviewResponse {
    fn from(entry: &SubscriberDigest) -> Self {
        Self {
            subscriber_id: entry.subscriber.subscriber_id,
            contact_address: entry.subscriber.contact_address.clone(),
            used_fallback: entry.digest.used_fallback,
            degraded: entry.digest.degraded,
            concerts: entry
                .digest
                .concerts
                .iter()
                .map(|concert| ConcertResponse::new(concert, None))
                .collect(),
        }
    }
}

/// Validates search parameters against `today` and turns them into a query
pub fn build_search_query(
    params: &SearchParams,
    today: NaiveDate,
    max_range: TimeDelta,
) -> AppResult<SearchQuery> {
    let query = if params.is_range {
        let end = params.end_date.ok_or_else(|| {
            AppError::InvalidInput("end_date is required for a date range".to_string())
        })?;
        if end < today {
            return Err(AppError::InvalidInput("end_date may not be in the past".to_string()));
        }

        // Order and span are checked on the requested start, before clamping
        if let Some(requested) = params.date {
            if requested > end {
                return Err(AppError::InvalidInput("date must not be after end_date".to_string()));
            }
            if end - requested > max_range {
                return Err(AppError::InvalidInput(format!(
                    "date range may span at most {} days",
                    max_range.num_days()
                )));
            }
        }

        let start = params.date.map_or(today, |date| date.max(today));
        SearchQuery::between(start, end)
    } else {
        let date = params.date.unwrap_or(today);
        if date < today {
            return Err(AppError::InvalidInput("date may not be in the past".to_string()));
        }
        SearchQuery::on(date)
    };

    let tags = match params.tags.as_deref() {
        Some(codes) => parse_tag_codes(codes)?,
        None => TagFilter::All,
    };
    let references = params
        .artists
        .as_deref()
        .map_or(References::NoPreference, |ids| References::from_ids(ids.split(',')));

    Ok(query.with_tags(tags).with_references(references))
}

fn parse_tag_codes(codes: &str) -> AppResult<TagFilter> {
    let tags = codes
        .split(',')
        .filter(|code| !code.trim().is_empty())
        .map(str::parse::<ConcertTag>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| {
            let known: Vec<&str> = ConcertTag::ALL.iter().map(ConcertTag::code).collect();
            AppError::InvalidInput(format!("{e} (expected one of {})", known.join(", ")))
        })?;
    Ok(TagFilter::from_selection(tags))
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Concerts matching the browse-page filters, best matches first
pub async fn search_concerts(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<SearchResponse>> {
    let query = build_search_query(&params, today(), state.settings.max_date_range)?;
    let results = state.search.search(&query).await?;

    Ok(Json(SearchResponse {
        concerts: results.hits.iter().map(ConcertResponse::from).collect(),
        degraded: results.degraded,
    }))
}

/// This week's digests for every subscriber, without sending anything
pub async fn preview_digests(State(state): State<AppState>) -> AppResult<Json<Vec<DigestPreviewResponse>>> {
    let subscribers = state.subscribers.digest_subscribers().await?;
    let digests = state.digests.generate(today(), &subscribers).await?;
    Ok(Json(digests.iter().map(DigestPreviewResponse::from).collect()))
}

/// Runs the weekly digest job now
pub async fn send_digests(State(state): State<AppState>) -> AppResult<Json<DispatchReport>> {
    let report = state.weekly_job.run(today()).await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateFilter;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 18).unwrap()
    }

    fn days(n: i64) -> NaiveDate {
        today() + TimeDelta::days(n)
    }

    fn build(params: SearchParams) -> AppResult<SearchQuery> {
        build_search_query(&params, today(), TimeDelta::days(30))
    }

    #[test]
    fn test_single_date_defaults_to_today() {
        let query = build(SearchParams::default()).unwrap();
        assert_eq!(query.dates, DateFilter::Day(today()));
        assert_eq!(query.tags, TagFilter::All);
        assert_eq!(query.references, References::NoPreference);
    }

    #[test]
    fn test_past_single_date_rejected() {
        let result = build(SearchParams {
            date: Some(days(-1)),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_range_requires_end_date() {
        let result = build(SearchParams {
            is_range: true,
            date: Some(days(1)),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_range_start_clamped_to_today() {
        let query = build(SearchParams {
            is_range: true,
            date: Some(days(-3)),
            end_date: Some(days(4)),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(query.dates, DateFilter::Range { start: today(), end: days(4) });
    }

    #[test]
    fn test_range_span_measured_from_requested_start() {
        let result = build(SearchParams {
            is_range: true,
            date: Some(days(-40)),
            end_date: Some(days(5)),
            ..Default::default()
        });
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_range_limits() {
        let past_end = build(SearchParams {
            is_range: true,
            end_date: Some(days(-1)),
            ..Default::default()
        });
        assert!(past_end.is_err());

        let inverted = build(SearchParams {
            is_range: true,
            date: Some(days(5)),
            end_date: Some(days(2)),
            ..Default::default()
        });
        assert!(inverted.is_err());

        let too_long = build(SearchParams {
            is_range: true,
            date: Some(days(1)),
            end_date: Some(days(32)),
            ..Default::default()
        });
        assert!(too_long.is_err());

        let longest = build(SearchParams {
            is_range: true,
            date: Some(days(1)),
            end_date: Some(days(31)),
            ..Default::default()
        });
        assert!(longest.is_ok());
    }

    #[test]
    fn test_tags_and_artists_parsed() {
        let query = build(SearchParams {
            tags: Some("og, CV,".to_string()),
            artists: Some("2468, ,1357".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(
            query.tags,
            TagFilter::from_selection([ConcertTag::Originals, ConcertTag::Covers])
        );
        assert_eq!(query.references, References::from_ids(["1357", "2468"]));
    }

    #[test]
    fn test_unknown_tag_rejected() {
        let result = build(SearchParams {
            tags: Some("OG,XX".to_string()),
            ..Default::default()
        });
        match result {
            Err(AppError::InvalidInput(message)) => assert!(message.contains("XX")),
            other => panic!("expected invalid input, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_artists_means_no_preference() {
        let query = build(SearchParams {
            artists: Some(" , ".to_string()),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(query.references, References::NoPreference);
    }
}

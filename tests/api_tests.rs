use std::{collections::BTreeSet, sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::{Local, NaiveDate, TimeDelta, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use showfinder::{
    api::{create_router, AppState},
    config::EngineSettings,
    db::{InMemoryCatalog, InMemoryConcerts, InMemorySubscribers},
    models::{CatalogArtist, Concert, ConcertTag, LocalArtist, SimilarityMap, Subscriber, Venue, VenueStatus},
    services::{LogMailer, ProviderError, SimilarityCache, SimilarityProvider},
};

/// Provider for a catalog that is always fresh; any call is a test failure
struct UnreachableProvider;

#[async_trait::async_trait]
impl SimilarityProvider for UnreachableProvider {
    async fn fetch(&self, catalog_id: &str) -> Result<SimilarityMap, ProviderError> {
        Err(ProviderError::Malformed(format!("unexpected fetch for {catalog_id}")))
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn catalog_artist(id: &str, entries: &[(&str, f64)]) -> CatalogArtist {
    let map = entries.iter().map(|(k, v)| (k.to_string(), *v)).collect();
    CatalogArtist::new(id, id).with_similarity(map, Utc::now())
}

fn concert(id: i64, days_ahead: i64, analog: &str, tags: &[ConcertTag]) -> Concert {
    Concert {
        concert_id: id,
        date: today() + TimeDelta::days(days_ahead),
        venue: Venue {
            venue_id: 1,
            name: "Thalia Hall".to_string(),
            status: VenueStatus::Verified,
        },
        bill: vec![LocalArtist::new(id, format!("Band {id}"), [analog])],
        tags: tags.iter().copied().collect::<BTreeSet<_>>(),
        cancelled: false,
    }
}

fn create_test_app(concerts: Vec<Concert>, subscribers: Vec<Subscriber>) -> Router {
    let catalog = InMemoryCatalog::with_artists([
        catalog_artist("close", &[("2468", 0.9)]),
        catalog_artist("near", &[("2468", 0.4)]),
        catalog_artist("far", &[("1357", 0.8)]),
    ]);
    let cache = Arc::new(SimilarityCache::new(
        Arc::new(catalog),
        Arc::new(UnreachableProvider),
        TimeDelta::days(30),
        Duration::from_secs(1),
    ));
    let state = AppState::new(
        cache,
        Arc::new(InMemoryConcerts::new(concerts)),
        Arc::new(InMemorySubscribers::new(subscribers)),
        Arc::new(LogMailer),
        EngineSettings::default(),
    );
    create_router(state)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::post(uri).body(Body::empty()).unwrap()).await
}

fn concert_ids(body: &Value) -> Vec<i64> {
    body["concerts"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["concert_id"].as_i64().unwrap())
        .collect()
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(vec![], vec![]);
    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_app(vec![], vec![]);
    let request = Request::get("/health")
        .header("x-request-id", "trace-me")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "trace-me");
}

#[tokio::test]
async fn test_search_ranks_by_reference_artists() {
    let app = create_test_app(
        vec![
            concert(1, 1, "far", &[]),
            concert(2, 1, "close", &[]),
            concert(3, 1, "near", &[]),
        ],
        vec![],
    );
    let date = today() + TimeDelta::days(1);
    let (status, body) = get(app, &format!("/api/v1/concerts/search?date={date}&artists=2468")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(concert_ids(&body), vec![2, 3, 1]);
    assert_eq!(body["concerts"][0]["score"], 0.9);
    assert_eq!(body["degraded"], false);
}

#[tokio::test]
async fn test_search_range_with_tags() {
    let app = create_test_app(
        vec![
            concert(1, 0, "far", &[ConcertTag::Covers]),
            concert(2, 2, "far", &[ConcertTag::Dj]),
            concert(3, 4, "far", &[ConcertTag::Originals, ConcertTag::Covers]),
            concert(4, 9, "far", &[ConcertTag::Covers]),
        ],
        vec![],
    );
    let start = today();
    let end = today() + TimeDelta::days(5);
    let (status, body) = get(
        app,
        &format!("/api/v1/concerts/search?date={start}&end_date={end}&is_range=true&tags=CV"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let mut ids = concert_ids(&body);
    ids.sort();
    assert_eq!(ids, vec![1, 3]);
    // No references, so no scores
    assert!(body["concerts"][0].get("score").is_none());
}

#[tokio::test]
async fn test_search_rejects_bad_input() {
    let yesterday = today() - TimeDelta::days(1);
    let far_end = today() + TimeDelta::days(45);

    for uri in [
        format!("/api/v1/concerts/search?date={yesterday}"),
        "/api/v1/concerts/search?is_range=true".to_string(),
        format!("/api/v1/concerts/search?is_range=true&end_date={far_end}"),
        "/api/v1/concerts/search?tags=OG,ZZ".to_string(),
    ] {
        let app = create_test_app(vec![], vec![]);
        let (status, body) = get(app, &uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert!(body["error"].is_string(), "{uri}");
    }
}

#[tokio::test]
async fn test_digest_preview() {
    let app = create_test_app(
        vec![concert(1, 1, "close", &[]), concert(2, 2, "far", &[])],
        vec![
            Subscriber::new(1, "fan@example.com").with_references(["2468"]),
            Subscriber::new(2, "curious@example.com"),
        ],
    );
    let (status, body) = post(app, "/api/v1/digests/preview").await;

    assert_eq!(status, StatusCode::OK);
    let digests = body.as_array().unwrap();
    assert_eq!(digests.len(), 2);

    assert_eq!(digests[0]["contact_address"], "fan@example.com");
    assert_eq!(digests[0]["used_fallback"], false);
    assert_eq!(concert_ids(&digests[0]), vec![1]);

    assert_eq!(digests[1]["used_fallback"], true);
    assert_eq!(digests[1]["concerts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_digest_send_skips_empty() {
    let app = create_test_app(
        vec![concert(1, 1, "close", &[ConcertTag::Covers])],
        vec![
            Subscriber::new(1, "covers@example.com").with_tags([ConcertTag::Covers]),
            Subscriber::new(2, "dj@example.com").with_tags([ConcertTag::Dj]),
        ],
    );
    let (status, body) = post(app, "/api/v1/digests/send").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], 1);
    assert_eq!(body["skipped"], 1);
    assert_eq!(body["failed"], 0);
}

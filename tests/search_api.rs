use async_trait::async_trait;
use autoplaza_search::{
    cache::MemoryCacheStore,
    catalog::SeedData,
    config::Settings,
    error::{AuditError, RepositoryError},
    history::{AuditSink, SearchHistoryRecorder},
    models::{Listing, SearchHistoryRecord},
    pagination::{PageRequest, SortSpec},
    predicate::Predicate,
    repository::{
        CountField, InMemoryListingRepository, ListingRepository, NumericField, NumericRange,
        TextField,
    },
    routes::create_router,
    search::SearchEngine,
    AppState,
};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower::ServiceExt;

const SECRET: &str = "test-secret";

fn seed() -> SeedData {
    SeedData::load(concat!(env!("CARGO_MANIFEST_DIR"), "/data/seed.json")).unwrap()
}

fn settings() -> Settings {
    Settings {
        jwt_secret: Some(SECRET.to_string()),
        ..Settings::default()
    }
}

fn app_with(repository: Arc<dyn ListingRepository>, history: SearchHistoryRecorder) -> Router {
    let settings = Arc::new(settings());
    let (catalog, _) = seed().into_parts();
    let engine = SearchEngine::new(
        &settings,
        repository,
        Arc::new(catalog),
        Arc::new(MemoryCacheStore::new(1024)),
        history,
    );
    create_router(AppState {
        settings,
        engine: Arc::new(engine),
    })
}

fn app() -> Router {
    let (_, listings) = seed().into_parts();
    app_with(
        Arc::new(InMemoryListingRepository::new(listings)),
        SearchHistoryRecorder::disabled(),
    )
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::builder().uri(uri).body(Body::empty()).unwrap()).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn ids(body: &Value) -> Vec<u64> {
    body["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect()
}

#[tokio::test]
async fn search_without_parameters_lists_live_listings_newest_first() {
    let (status, body) = get(app(), "/api/search").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 9);
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 20);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["has_previous"], false);
    assert_eq!(body["sort"], "created_at");
    assert_eq!(body["order"], "desc");
    assert_eq!(ids(&body)[0], 11);
    // Sold, draft and unpublished listings never show up
    assert!(ids(&body).iter().all(|id| ![9, 10, 12].contains(id)));
}

#[tokio::test]
async fn brand_filter_and_its_facets() {
    let (status, body) = get(app(), "/api/search?brand=toyota").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 4);
    assert_eq!(body["facets"]["price_min"].as_f64(), Some(1_800_000.0));
    assert_eq!(body["facets"]["price_max"].as_f64(), Some(4_100_000.0));
    assert_eq!(body["facets"]["distinct_body_types"], serde_json::json!(["sedan", "suv"]));

    let (_, body) = get(app(), "/api/search?brand=toyota&min_price=5000000").await;
    assert_eq!(body["total_count"], 0);
    assert!(ids(&body).is_empty());
}

#[tokio::test]
async fn unknown_brand_returns_empty_results_and_facets() {
    let (status, body) = get(app(), "/api/search?brand=fakebrand").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 0);
    assert!(body["facets"]["price_min"].is_null());
    assert!(body["facets"]["engine_volume_range"].is_null());
    assert_eq!(body["facets"]["distinct_cities"], serde_json::json!([]));
    assert_eq!(body["facets"]["door_options"], serde_json::json!([]));
}

#[tokio::test]
async fn malformed_parameters_are_reported_not_fatal() {
    let (status, body) = get(app(), "/api/search?min_year=abc&fuel_type=coal").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 9);
    let rejected = body["rejected_params"].as_array().unwrap();
    assert!(rejected.contains(&Value::from("min_year")));
    assert!(rejected.contains(&Value::from("fuel_type")));
}

#[tokio::test]
async fn paging_parameters_are_clamped() {
    let (_, body) = get(app(), "/api/search?page_size=1000&page=0").await;
    assert_eq!(body["page_size"], 100);
    assert_eq!(body["page"], 1);

    let (_, body) = get(app(), "/api/search?page_size=4&page=3&sort=price&order=asc").await;
    assert_eq!(body["total_pages"], 3);
    assert_eq!(body["has_next"], false);
    assert_eq!(body["has_previous"], true);
    // Most expensive live listing is alone on the last page
    assert_eq!(ids(&body), vec![8]);

    let (status, body) = get(app(), "/api/search?page=50").await;
    assert_eq!(status, StatusCode::OK);
    assert!(ids(&body).is_empty());
}

#[tokio::test]
async fn text_search_covers_descriptions_and_vin() {
    let (_, body) = get(app(), "/api/search?search=SERVICE%20history").await;
    assert_eq!(ids(&body), vec![4]);

    let (_, body) = get(app(), "/api/search?search=xta21000000000006").await;
    assert_eq!(ids(&body), vec![6]);
}

#[tokio::test]
async fn model_and_service_history_filters() {
    let (status, body) = get(app(), "/api/search?model=rav4").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![8, 3]);

    let (_, body) = get(app(), "/api/search?has_service_history=true").await;
    assert_eq!(ids(&body), vec![4, 2]);

    let (_, body) = get(app(), "/api/search?brand=toyota&has_service_history=true").await;
    assert_eq!(body["total_count"], 1);
    assert_eq!(ids(&body), vec![2]);

    let (_, body) = get(app(), "/api/search?model=rav4&has_service_history=true").await;
    assert_eq!(body["total_count"], 0);
}

#[tokio::test]
async fn facets_endpoint_ignores_its_own_field() {
    let (status, body) = get(app(), "/api/facets?city=kazan").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["distinct_cities"].as_array().unwrap().len(), 6);
    assert_eq!(body["distinct_regions"], serde_json::json!(["Tatarstan"]));
}

#[tokio::test]
async fn reference_endpoints() {
    let (status, body) = get(app(), "/api/brands").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
    assert_eq!(body[0]["name"], "BMW");

    let (_, body) = get(app(), "/api/brands/active").await;
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = get(app(), "/api/brands/toyota/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = get(app(), "/api/brands/2/models").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["name"], "3 Series");

    let (status, _) = get(app(), "/api/brands/fakebrand/models").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = get(app(), "/api/stats").await;
    assert_eq!(body["total_active_listings"], 9);
    assert_eq!(body["price_stats"]["min"].as_f64(), Some(620_000.0));
    assert_eq!(body["price_stats"]["max"].as_f64(), Some(4_100_000.0));
    let avg = body["price_stats"]["avg"].as_f64().unwrap();
    assert!((avg - 23_320_000.0 / 9.0).abs() < 1e-6);
    let popular: Vec<(&str, u64)> = body["popular_brands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| (b["slug"].as_str().unwrap(), b["listing_count"].as_u64().unwrap()))
        .collect();
    assert_eq!(popular, vec![("toyota", 4), ("bmw", 3), ("lada", 2)]);
    let recent: Vec<u64> = body["recent_listings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|l| l["id"].as_u64().unwrap())
        .collect();
    assert_eq!(recent, vec![11, 8, 7, 6, 5]);

    let (_, body) = get(app(), "/api/options").await;
    assert!(body["fuel_types"].as_array().unwrap().contains(&Value::from("petrol_gas")));

    let (status, body) = get(app(), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

struct DownRepository;

#[async_trait]
impl ListingRepository for DownRepository {
    async fn count(&self, _predicate: &Predicate) -> Result<u64, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn find_page(
        &self,
        _predicate: &Predicate,
        _sort: SortSpec,
        _page: PageRequest,
    ) -> Result<Vec<Listing>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn numeric_range(
        &self,
        _predicate: &Predicate,
        _field: NumericField,
    ) -> Result<Option<NumericRange>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn average(
        &self,
        _predicate: &Predicate,
        _field: NumericField,
    ) -> Result<Option<f64>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn count_by_brand(&self, _predicate: &Predicate) -> Result<Vec<(u64, u64)>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn distinct_text(
        &self,
        _predicate: &Predicate,
        _field: TextField,
        _limit: Option<usize>,
    ) -> Result<Vec<String>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn distinct_counts(
        &self,
        _predicate: &Predicate,
        _field: CountField,
    ) -> Result<Vec<u8>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }

    async fn live_brand_ids(&self) -> Result<Vec<u64>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".into()))
    }
}

#[tokio::test]
async fn repository_outage_is_a_service_error() {
    let app = app_with(Arc::new(DownRepository), SearchHistoryRecorder::disabled());
    let (status, body) = get(app.clone(), "/api/search?brand=toyota").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"].is_string());

    let (status, _) = get(app, "/api/stats").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<SearchHistoryRecord>>,
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn append(&self, record: SearchHistoryRecord) -> Result<(), AuditError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

fn bearer(sub: &str) -> String {
    #[derive(serde::Serialize)]
    struct Claims<'a> {
        sub: &'a str,
        exp: usize,
    }
    let claims = Claims {
        sub,
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    let token = encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap();
    format!("Bearer {token}")
}

async fn recorded(sink: &MemorySink, expected: usize) -> Vec<SearchHistoryRecord> {
    for _ in 0..100 {
        if sink.records.lock().await.len() >= expected {
            break;
        }
        tokio::task::yield_now().await;
    }
    sink.records.lock().await.clone()
}

#[tokio::test]
async fn signed_in_searches_are_recorded() {
    let sink = Arc::new(MemorySink::default());
    let (_, listings) = seed().into_parts();
    let app = app_with(
        Arc::new(InMemoryListingRepository::new(listings)),
        SearchHistoryRecorder::new(sink.clone()),
    );

    let request = Request::builder()
        .uri("/api/search?search=camry&brand=toyota")
        .header(header::AUTHORIZATION, bearer("user-42"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(app.clone(), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_count"], 2);

    let records = recorded(&sink, 1).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].actor.as_deref(), Some("user-42"));
    assert_eq!(records[0].query, "camry");
    assert_eq!(records[0].result_count, 2);
    assert_eq!(records[0].filters.get("brand").map(String::as_str), Some("toyota"));

    // Anonymous and badly signed requests still get results but leave no trace
    let (status, _) = get(app.clone(), "/api/search?search=camry").await;
    assert_eq!(status, StatusCode::OK);
    let request = Request::builder()
        .uri("/api/search?search=camry")
        .header(header::AUTHORIZATION, "Bearer not-a-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recorded(&sink, 2).await.len(), 1);
}

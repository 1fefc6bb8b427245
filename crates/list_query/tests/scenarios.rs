use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use list_query::{
    ControllerConfig, FetchMode, ListQueryController, ManualClock, MemoryQueryCache,
    MutationBody, RestResourceApi,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::domain::{PageSize, Resource};
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Course {
    id: i64,
    name: String,
}

#[derive(Clone)]
struct Backend {
    rows: Arc<Mutex<Vec<Course>>>,
    requests: Arc<Mutex<Vec<(String, HashMap<String, String>)>>>,
}

impl Backend {
    fn seeded(count: i64) -> Self {
        let rows = (1..=count)
            .map(|id| Course {
                id,
                name: if id <= 3 {
                    format!("Algorithms {id}")
                } else {
                    format!("Course {id:02}")
                },
            })
            .collect();
        Self {
            rows: Arc::new(Mutex::new(rows)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    async fn requests_to(&self, route: &str) -> Vec<HashMap<String, String>> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|(name, _)| name == route)
            .map(|(_, query)| query.clone())
            .collect()
    }
}

fn page_of(rows: &[Course], query: &HashMap<String, String>) -> serde_json::Value {
    let page: usize = query.get("page").and_then(|v| v.parse().ok()).unwrap_or(1);
    let size: usize = query
        .get("pageSize")
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);
    let data: Vec<&Course> = rows.iter().skip((page - 1) * size).take(size).collect();
    json!({
        "data": data,
        "totalPages": rows.len().div_ceil(size),
        "totalCount": rows.len(),
    })
}

async fn list_courses(
    State(backend): State<Backend>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    backend
        .requests
        .lock()
        .await
        .push(("list".into(), query.clone()));
    let mut rows = backend.rows.lock().await.clone();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    if query.get("ascending").map(String::as_str) == Some("false") {
        rows.reverse();
    }
    Json(page_of(&rows, &query))
}

async fn search_courses(
    State(backend): State<Backend>,
    Query(query): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    backend
        .requests
        .lock()
        .await
        .push(("search".into(), query.clone()));
    let keyword = query
        .get("keyword")
        .map(|k| k.to_lowercase())
        .unwrap_or_default();
    let mut rows: Vec<Course> = backend
        .rows
        .lock()
        .await
        .iter()
        .filter(|row| row.name.to_lowercase().contains(&keyword))
        .cloned()
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Json(page_of(&rows, &query))
}

async fn create_course(
    State(backend): State<Backend>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let mut rows = backend.rows.lock().await;
    let course = Course {
        id: rows.iter().map(|row| row.id).max().unwrap_or_default() + 1,
        name: body["name"].as_str().unwrap_or_default().to_string(),
    };
    rows.push(course.clone());
    (StatusCode::CREATED, Json(course))
}

async fn spawn_backend(backend: Backend) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/Course", get(list_courses).post(create_course))
        .route("/api/Course/search", get(search_courses))
        .with_state(backend);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}/api")
}

async fn course_controller(
    backend: &Backend,
    clock: Arc<ManualClock>,
) -> Arc<ListQueryController<Course>> {
    let url = spawn_backend(backend.clone()).await;
    let api = RestResourceApi::<Course>::new(&url, Resource::Course).expect("api url");
    ListQueryController::<Course>::new(
        Arc::new(api),
        MemoryQueryCache::<Course>::shared(),
        clock,
        ControllerConfig::default(),
        "name",
    )
}

fn ids(items: &[Course]) -> Vec<i64> {
    items.iter().map(|course| course.id).collect()
}

#[tokio::test]
async fn browsing_to_page_three() {
    let backend = Backend::seeded(47);
    let controller = course_controller(&backend, Arc::new(ManualClock::new())).await;

    let first = controller.load().await;
    assert_eq!(first.total_pages(), 5);
    assert_eq!(first.total_count(), 47);

    assert!(controller.set_page(3).await);
    let third = controller.load().await;
    assert_eq!(ids(third.items()), (21..=30).collect::<Vec<_>>());

    let lists = backend.requests_to("list").await;
    let page_three = lists
        .iter()
        .find(|query| query.get("page").map(String::as_str) == Some("3"))
        .expect("page 3 request");
    assert_eq!(page_three["pageSize"], "10");
    assert_eq!(page_three["ascending"], "true");
    assert_eq!(page_three["sortField"], "name");
}

#[tokio::test]
async fn typing_a_search_term() {
    let backend = Backend::seeded(47);
    let clock = Arc::new(ManualClock::new());
    let controller = course_controller(&backend, clock.clone()).await;
    controller.load().await;

    for text in ["a", "al", "alg", "algo"] {
        controller.set_keyword(text).await;
        controller.current_result().await;
        clock.advance(Duration::from_millis(100));
    }
    clock.advance(Duration::from_millis(600));

    let view = controller.load().await;
    assert_eq!(controller.mode().await, FetchMode::Search);
    assert_eq!(ids(view.items()), vec![1, 2, 3]);

    let searches = backend.requests_to("search").await;
    assert_eq!(searches.len(), 1);
    assert_eq!(searches[0]["keyword"], "algo");
    assert_eq!(searches[0]["page"], "1");
    assert!(!searches[0].contains_key("sortField"));
}

#[tokio::test]
async fn whitespace_search_browses() {
    let backend = Backend::seeded(47);
    let clock = Arc::new(ManualClock::new());
    let controller = course_controller(&backend, clock.clone()).await;

    controller.set_keyword("   ").await;
    clock.advance(Duration::from_millis(600));
    let view = controller.load().await;

    assert_eq!(view.items().len(), 10);
    assert!(backend.requests_to("search").await.is_empty());
    assert_eq!(backend.requests_to("list").await[0]["page"], "1");
}

#[tokio::test]
async fn created_record_shows_after_refresh() {
    let backend = Backend::seeded(47);
    let controller = course_controller(&backend, Arc::new(ManualClock::new())).await;
    controller.set_page_size(PageSize::Fifty).await;
    let before = controller.load().await;
    assert_eq!(before.total_count(), 47);

    let created = controller
        .create(MutationBody::Json(json!({"name": "Aardvark Anatomy"})))
        .await
        .expect("create");
    assert_eq!(created.id, 48);

    let after = controller.load().await;
    assert_eq!(after.total_count(), 48);
    assert_eq!(after.items()[0], created);
}

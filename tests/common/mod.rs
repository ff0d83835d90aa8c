//! In-process fake of the search and login endpoints, plus stub downloaders.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Form, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use nicoloader::downloader::{Authorization, Downloader};
use nicoloader::utils::Result;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

pub const USER: &str = "me@example.com";
pub const PASSWORD: &str = "correct horse";
pub const TOKEN: &str = "user_session_1_abcdef";

#[derive(Default)]
pub struct FakeState {
    /// Login requests answered with 503 before succeeding
    pub login_failures_left: AtomicUsize,
    pub login_requests: AtomicUsize,
    pub search_requests: Mutex<Vec<HashMap<String, String>>>,
}

pub struct FakePlatform {
    pub addr: SocketAddr,
    pub state: Arc<FakeState>,
}

impl FakePlatform {
    pub async fn start() -> Self {
        Self::start_with_state(FakeState::default()).await
    }

    pub async fn start_with_state(state: FakeState) -> Self {
        let state = Arc::new(state);
        let app = Router::new()
            .route("/search", get(search))
            .route("/broken-search", get(|| async { "<html>maintenance</html>" }))
            .route("/login", post(login))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://{}{}", self.addr, path)).unwrap()
    }

    pub fn login_requests(&self) -> usize {
        self.state.login_requests.load(Ordering::SeqCst)
    }

    pub fn search_requests(&self) -> usize {
        self.state.search_requests.lock().unwrap().len()
    }
}

async fn search(
    State(state): State<Arc<FakeState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.search_requests.lock().unwrap().push(params.clone());

    let q = params.get("q").cloned().unwrap_or_default();
    let data = match q.as_str() {
        "仮装大賞 高坂海美" => json!([
            {"contentId": "sm37998381", "title": "仮装大賞 高坂海美"}
        ]),
        "nothing" => json!([]),
        "slow" => {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            json!([])
        }
        "error" => return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response(),
        // Deliberately ignores _limit so the client has to enforce it
        _ => json!([
            {"contentId": "sm3", "title": "third upload"},
            {"contentId": "sm2", "title": "second/upload"},
            {"contentId": "sm1", "title": "first upload"}
        ]),
    };

    Json(json!({
        "meta": {"status": 200, "totalCount": data.as_array().map(|a| a.len()).unwrap_or(0), "id": "fake"},
        "data": data
    }))
    .into_response()
}

async fn login(
    State(state): State<Arc<FakeState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.login_requests.fetch_add(1, Ordering::SeqCst);

    let failures_left = state.login_failures_left.load(Ordering::SeqCst);
    if failures_left > 0 {
        state
            .login_failures_left
            .store(failures_left - 1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let ok = form.get("mail_tel").map(String::as_str) == Some(USER)
        && form.get("password").map(String::as_str) == Some(PASSWORD);

    if ok {
        (
            StatusCode::FOUND,
            [
                (header::LOCATION, "/".to_string()),
                (header::SET_COOKIE, format!("user_session={}; Path=/; HttpOnly", TOKEN)),
            ],
        )
            .into_response()
    } else {
        (StatusCode::FOUND, [(header::LOCATION, "/login?message=cant_login".to_string())])
            .into_response()
    }
}

/// A recorded delegation
#[derive(Debug, Clone)]
pub struct FetchCall {
    pub url: String,
    pub destination: PathBuf,
    pub session_token: String,
}

/// Writes a small file to the destination and records the call
#[derive(Default)]
pub struct RecordingDownloader {
    pub calls: Mutex<Vec<FetchCall>>,
    /// Video ids whose fetch fails
    pub failing: Vec<String>,
}

impl RecordingDownloader {
    pub fn failing(ids: &[&str]) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            failing: ids.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Downloader for RecordingDownloader {
    fn id(&self) -> &str {
        "recording"
    }

    async fn fetch(&self, auth: Authorization<'_>, url: &Url, destination: &Path) -> Result<()> {
        self.calls.lock().unwrap().push(FetchCall {
            url: url.to_string(),
            destination: destination.to_path_buf(),
            session_token: auth.session.token().to_string(),
        });

        if self.failing.iter().any(|id| url.as_str().ends_with(id.as_str())) {
            return Err(std::io::Error::other("simulated tool crash").into());
        }

        tokio::fs::write(destination, b"fake video").await?;
        Ok(())
    }
}

/// Writes part of the file, then never finishes
pub struct HangingDownloader;

#[async_trait]
impl Downloader for HangingDownloader {
    fn id(&self) -> &str {
        "hanging"
    }

    async fn fetch(&self, _auth: Authorization<'_>, _url: &Url, destination: &Path) -> Result<()> {
        tokio::fs::write(destination, b"half a vid").await?;
        let mut part = destination.as_os_str().to_os_string();
        part.push(".part");
        tokio::fs::write(PathBuf::from(part), b"fragment").await?;
        std::future::pending::<()>().await;
        Ok(())
    }
}

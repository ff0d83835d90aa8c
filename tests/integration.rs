//! End-to-end flows against a local fake of the platform; no real network.

mod common;

use common::{FakePlatform, FakeState, RecordingDownloader, PASSWORD, TOKEN, USER};
use nicoloader::downloader::{
    Credentials, DownloadManager, DownloadOptions, DownloadTask, RetryPolicy, SessionClient,
    TaskState,
};
use nicoloader::search::{SearchClient, SearchQuery, TargetField};
use nicoloader::{BatchRunner, NicoloaderError, QueryJob};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn fast_retry(attempts: u32) -> RetryPolicy {
    RetryPolicy {
        attempts,
        backoff_factor: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
    }
}

fn good_credentials() -> Credentials {
    Credentials::new(USER, PASSWORD)
}

#[tokio::test]
async fn search_returns_single_exact_match() {
    let platform = FakePlatform::start().await;
    let client = SearchClient::new(platform.url("/search")).unwrap();

    let query = SearchQuery::new("仮装大賞 高坂海美", vec![TargetField::Title], 1).unwrap();
    let hits = client.search(&query).await.unwrap();

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].video_id, "sm37998381");
    assert_eq!(hits[0].title, "仮装大賞 高坂海美");

    let requests = platform.state.search_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["targets"], "title");
    assert_eq!(requests[0]["fields"], "contentId,title");
    assert_eq!(requests[0]["_sort"], "-startTime");
    assert_eq!(requests[0]["_limit"], "1");
}

#[tokio::test]
async fn search_never_exceeds_limit_and_keeps_order() {
    let platform = FakePlatform::start().await;
    let client = SearchClient::new(platform.url("/search")).unwrap();

    let query = SearchQuery::new("anything", vec![TargetField::Title, TargetField::Tags], 2).unwrap();
    let hits = client.search(&query).await.unwrap();

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].video_id, "sm3");
    assert_eq!(hits[1].video_id, "sm2");
}

#[tokio::test]
async fn repeated_search_is_stable() {
    let platform = FakePlatform::start().await;
    let client = SearchClient::new(platform.url("/search")).unwrap();
    let query = SearchQuery::new("anything", vec![TargetField::Title], 10).unwrap();

    let first = client.search(&query).await.unwrap();
    let second = client.search(&query).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn search_surfaces_status_and_parse_errors() {
    let platform = FakePlatform::start().await;

    let client = SearchClient::new(platform.url("/search")).unwrap();
    let query = SearchQuery::new("error", vec![TargetField::Title], 1).unwrap();
    let err = client.search(&query).await.unwrap_err();
    assert!(matches!(err, NicoloaderError::HttpStatus { .. }), "{:?}", err);

    let client = SearchClient::new(platform.url("/broken-search")).unwrap();
    let query = SearchQuery::new("x", vec![TargetField::Title], 1).unwrap();
    let err = client.search(&query).await.unwrap_err();
    assert!(matches!(err, NicoloaderError::Parse(_)), "{:?}", err);

    // Exactly one request per search: no retries on the search path
    assert_eq!(platform.state.search_requests.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn login_yields_session_cookie() {
    let platform = FakePlatform::start().await;
    let client = SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap();

    let session = client.login(&good_credentials()).await.unwrap();
    assert_eq!(session.token(), TOKEN);
}

#[tokio::test]
async fn login_without_cookie_is_authentication_failure() {
    let platform = FakePlatform::start().await;
    let client = SessionClient::new(platform.url("/login"), fast_retry(3)).unwrap();

    let err = client
        .login(&Credentials::new(USER, "wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, NicoloaderError::AuthenticationFailed(_)));
    assert!(err.is_fatal());
    // A definitive answer is not retried
    assert_eq!(platform.login_requests(), 1);
}

#[tokio::test]
async fn login_retries_gateway_errors() {
    let platform = FakePlatform::start_with_state(FakeState {
        login_failures_left: AtomicUsize::new(2),
        ..Default::default()
    })
    .await;
    let client = SessionClient::new(platform.url("/login"), fast_retry(3)).unwrap();

    let session = client.login(&good_credentials()).await.unwrap();
    assert_eq!(session.token(), TOKEN);
    assert_eq!(platform.login_requests(), 3);
}

#[tokio::test]
async fn login_gives_up_after_bounded_retries() {
    let platform = FakePlatform::start_with_state(FakeState {
        login_failures_left: AtomicUsize::new(10),
        ..Default::default()
    })
    .await;
    let client = SessionClient::new(platform.url("/login"), fast_retry(2)).unwrap();

    let err = client.login(&good_credentials()).await.unwrap_err();
    assert!(matches!(err, NicoloaderError::HttpStatus { .. }), "{:?}", err);
    assert_eq!(platform.login_requests(), 3);
}

#[tokio::test]
async fn connect_fails_on_bad_credentials() {
    let platform = FakePlatform::start().await;
    let result = DownloadManager::connect(
        Credentials::new(USER, "wrong"),
        SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap(),
        Arc::new(RecordingDownloader::default()),
    )
    .await;
    assert!(matches!(result, Err(NicoloaderError::AuthenticationFailed(_))));
}

#[tokio::test]
async fn download_with_overwrite_replaces_file_and_reuses_session() {
    let platform = FakePlatform::start().await;
    let temp = TempDir::new().unwrap();
    let downloader = Arc::new(RecordingDownloader::default());
    let manager = DownloadManager::connect(
        good_credentials(),
        SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap(),
        downloader.clone(),
    )
    .await
    .unwrap();

    let target = temp.path().join("tmp").join("tmp.mp4");
    std::fs::create_dir_all(target.parent().unwrap()).unwrap();
    std::fs::write(&target, b"").unwrap();

    let cancel = CancellationToken::new();
    for id in ["sm37701231", "so24277772"] {
        let task = DownloadTask::new(id, &target).overwrite(true);
        let path = manager.download(&task, &cancel).await.unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }

    let calls = downloader.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].url, "https://www.nicovideo.jp/watch/sm37701231");
    assert_eq!(calls[1].url, "https://www.nicovideo.jp/watch/so24277772");
    assert!(calls.iter().all(|c| c.session_token == TOKEN));
    assert_eq!(platform.login_requests(), 1, "one login per manager");
}

#[tokio::test]
async fn download_without_overwrite_keeps_existing_file() {
    let platform = FakePlatform::start().await;
    let temp = TempDir::new().unwrap();
    let downloader = Arc::new(RecordingDownloader::default());
    let manager = DownloadManager::new(
        good_credentials(),
        SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap(),
        downloader.clone(),
    )
    .unwrap();

    let target = temp.path().join("tmp.mp4");
    std::fs::write(&target, b"keep me").unwrap();

    let (state, result) = manager
        .run(&DownloadTask::new("sm37701231", &target), &CancellationToken::new())
        .await;

    assert_eq!(state, TaskState::ConflictRejected);
    assert!(matches!(result, Err(NicoloaderError::AlreadyExists(_))));
    assert_eq!(std::fs::read(&target).unwrap(), b"keep me");
    assert!(downloader.calls().is_empty());
    assert_eq!(platform.login_requests(), 0);
}

#[tokio::test]
async fn failed_delegation_is_wrapped_with_context() {
    let platform = FakePlatform::start().await;
    let temp = TempDir::new().unwrap();
    let manager = DownloadManager::new(
        good_credentials(),
        SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap(),
        Arc::new(RecordingDownloader::failing(&["sm1"])),
    )
    .unwrap();

    let (state, result) = manager
        .run(
            &DownloadTask::new("sm1", temp.path().join("a.mp4")),
            &CancellationToken::new(),
        )
        .await;

    assert_eq!(state, TaskState::Failed);
    match result {
        Err(NicoloaderError::DownloadFailed { video_id, url, detail }) => {
            assert_eq!(video_id, "sm1");
            assert!(url.ends_with("/watch/sm1"));
            assert!(detail.contains("simulated tool crash"));
        }
        other => panic!("expected DownloadFailed, got {:?}", other),
    }
}

fn batch_jobs(temp: &TempDir) -> Vec<QueryJob> {
    vec![
        QueryJob {
            query: SearchQuery::new("anything", vec![TargetField::Title], 3).unwrap(),
            directory: temp.path().join("all"),
        },
        QueryJob {
            query: SearchQuery::new("error", vec![TargetField::Title], 3).unwrap(),
            directory: temp.path().join("broken"),
        },
        QueryJob {
            query: SearchQuery::new("仮装大賞 高坂海美", vec![TargetField::Title], 1).unwrap(),
            directory: temp.path().join("kasou"),
        },
    ]
}

#[tokio::test]
async fn batch_continues_past_per_item_failures() {
    let platform = FakePlatform::start().await;
    let temp = TempDir::new().unwrap();

    // Pre-existing file for one hit
    std::fs::create_dir_all(temp.path().join("all")).unwrap();
    std::fs::write(temp.path().join("all").join("first upload.mp4"), b"old").unwrap();

    let downloader = Arc::new(RecordingDownloader::failing(&["sm2"]));
    let manager = DownloadManager::connect(
        good_credentials(),
        SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap(),
        downloader.clone(),
    )
    .await
    .unwrap();
    let runner = BatchRunner::new(
        SearchClient::new(platform.url("/search")).unwrap(),
        manager,
        batch_jobs(&temp),
        DownloadOptions::default(),
    );

    let report = runner.run(&CancellationToken::new()).await;

    assert!(report.aborted.is_none());
    assert_eq!(report.items.len(), 4);
    assert_eq!(report.count(TaskState::Succeeded), 2);
    assert_eq!(report.count(TaskState::Failed), 1);
    assert_eq!(report.count(TaskState::ConflictRejected), 1);
    assert_eq!(report.failed_queries.len(), 1);
    assert_eq!(report.failed_queries[0].query, "error");

    assert!(temp.path().join("all").join("third upload.mp4").exists());
    assert!(temp.path().join("kasou").join("仮装大賞 高坂海美.mp4").exists());
    assert_eq!(
        std::fs::read(temp.path().join("all").join("first upload.mp4")).unwrap(),
        b"old"
    );

    let failed = report
        .items
        .iter()
        .find(|item| item.state == TaskState::Failed)
        .unwrap();
    assert_eq!(failed.video_id, "sm2");
    assert_eq!(failed.path, temp.path().join("all").join("second_upload.mp4"));
}

#[tokio::test]
async fn dry_run_batch_touches_nothing() {
    let platform = FakePlatform::start().await;
    let temp = TempDir::new().unwrap();
    let downloader = Arc::new(RecordingDownloader::default());
    let manager = DownloadManager::new(
        good_credentials(),
        SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap(),
        downloader.clone(),
    )
    .unwrap();
    let runner = BatchRunner::new(
        SearchClient::new(platform.url("/search")).unwrap(),
        manager,
        batch_jobs(&temp),
        DownloadOptions {
            overwrite: false,
            dry_run: true,
        },
    );

    let report = runner.run(&CancellationToken::new()).await;

    assert_eq!(report.count(TaskState::DryRunSkipped), 4);
    assert!(downloader.calls().is_empty());
    assert_eq!(platform.login_requests(), 0);
    assert!(!temp.path().join("all").exists());
    assert!(!temp.path().join("kasou").exists());
}

#[tokio::test]
async fn batch_aborts_on_authentication_failure() {
    let platform = FakePlatform::start().await;
    let temp = TempDir::new().unwrap();
    let downloader = Arc::new(RecordingDownloader::default());
    let manager = DownloadManager::new(
        Credentials::new(USER, "wrong"),
        SessionClient::new(platform.url("/login"), fast_retry(0)).unwrap(),
        downloader.clone(),
    )
    .unwrap();
    let runner = BatchRunner::new(
        SearchClient::new(platform.url("/search")).unwrap(),
        manager,
        batch_jobs(&temp),
        DownloadOptions::default(),
    );

    let report = runner.run(&CancellationToken::new()).await;

    assert!(matches!(
        report.aborted,
        Some(NicoloaderError::AuthenticationFailed(_))
    ));
    assert_eq!(report.items.len(), 1);
    assert!(downloader.calls().is_empty());
}

#[tokio::test]
async fn batch_aborts_when_login_stays_unavailable() {
    let platform = FakePlatform::start_with_state(FakeState {
        login_failures_left: AtomicUsize::new(usize::MAX),
        ..Default::default()
    })
    .await;
    let temp = TempDir::new().unwrap();
    let downloader = Arc::new(RecordingDownloader::default());
    let manager = DownloadManager::new(
        good_credentials(),
        SessionClient::new(platform.url("/login"), fast_retry(2)).unwrap(),
        downloader.clone(),
    )
    .unwrap();
    let runner = BatchRunner::new(
        SearchClient::new(platform.url("/search")).unwrap(),
        manager,
        batch_jobs(&temp),
        DownloadOptions::default(),
    );

    let report = runner.run(&CancellationToken::new()).await;

    assert!(matches!(
        report.aborted,
        Some(NicoloaderError::AuthenticationFailed(_))
    ));
    assert_eq!(report.items.len(), 1);
    assert_eq!(report.count(TaskState::Failed), 1);
    assert_eq!(platform.login_requests(), 3, "one bounded retry cycle only");
    assert!(downloader.calls().is_empty());
}

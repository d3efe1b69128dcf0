//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use async_trait::async_trait;
use ripple_engine::config::{
    Config, CrawlerConfig, DownloadConfig, FilterConfig, QueueOrder, StorageBackend,
    StorageConfig, UrlConfig, UserAgentConfig,
};
use ripple_engine::crawler::{
    CrawlObserver, CrawlStep, Coordinator, DownloadError, Downloader, FetchResult, HttpDownloader,
    LinkExtractor, ProgressCallback, Properties, QueueEntry,
};
use ripple_engine::{CrawlPhase, StopReason};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// Creates a test configuration crawling from the given seeds
fn create_test_config(seeds: Vec<String>) -> Config {
    Config {
        crawler: CrawlerConfig {
            seeds,
            max_concurrent_downloads: 4,
            max_depth: Some(2),
            max_downloads: None,
            max_download_errors: None,
            max_crawl_time: Some(30),
            queue_order: QueueOrder::Lifo,
            step_timeout: Some(5_000),
        },
        download: DownloadConfig {
            connect_timeout: 2_000,
            read_timeout: 5_000,
            retry_count: 0,
            retry_delay: 0,
            ..DownloadConfig::default()
        },
        user_agent: user_agent(),
        url: UrlConfig::default(),
        filters: FilterConfig {
            respect_robots: false,
            ..FilterConfig::default()
        },
        storage: StorageConfig::default(),
    }
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.as_bytes().to_vec(), "text/html")
}

async fn mount_page(server: &MockServer, route: &str, body: &str, expected_hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(html_page(body))
        .expect(expected_hits)
        .mount(server)
        .await;
}

fn entry(url: &str) -> QueueEntry {
    let step = CrawlStep::new(Url::parse(url).unwrap(), 0).unwrap();
    QueueEntry::new(step, None, Properties::new())
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<html><head><title>Home</title></head><body>
            <a href="/page1">Page 1</a>
            <a href="/page2">Page 2</a>
        </body></html>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/page1", r#"<a href="/page2">Page 2</a><a href="/">Home</a>"#, 1).await;
    mount_page(&mock_server, "/page2", r#"<a href="/page1">Page 1</a>"#, 1).await;

    let config = create_test_config(vec![format!("{}/", base_url)]);
    let crawler = Coordinator::from_config(&config, "test", false).unwrap();
    let stats = crawler.crawl().await.unwrap();

    assert_eq!(stats.downloads_completed, 3);
    assert_eq!(stats.download_errors, 0);
    assert_eq!(stats.pipeline_errors, 0);
    assert_eq!(stats.urls_registered, 3);
    assert_eq!(stats.queued_remaining, 0);
    assert_eq!(stats.stop_reason, None);
    assert_eq!(stats.phase, CrawlPhase::Completed);
}

#[tokio::test]
async fn test_external_links_are_not_followed() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let port = Url::parse(&base_url).unwrap().port().unwrap();

    // Same server, different host name: "localhost" is external to "127.0.0.1"
    mount_page(
        &mock_server,
        "/",
        &format!(
            r#"<a href="/x">same host</a><a href="http://localhost:{}/y">external</a>"#,
            port
        ),
        1,
    )
    .await;
    mount_page(&mock_server, "/x", "<p>x</p>", 1).await;
    mount_page(&mock_server, "/y", "<p>y</p>", 0).await;

    let mut config = create_test_config(vec![format!("{}/", base_url)]);
    config.crawler.max_depth = Some(1);
    config.filters.follow_external = false;

    let crawler = Coordinator::from_config(&config, "test", false).unwrap();
    let stats = crawler.crawl().await.unwrap();

    assert_eq!(stats.downloads_completed, 2);
}

#[tokio::test]
async fn test_robots_txt_respect() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"),
        )
        .mount(&mock_server)
        .await;

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/public">Public</a><a href="/private">Private</a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/public", "<p>public</p>", 1).await;
    mount_page(&mock_server, "/private", "<p>private</p>", 0).await;

    let mut config = create_test_config(vec![format!("{}/", base_url)]);
    config.filters.respect_robots = true;

    let crawler = Coordinator::from_config(&config, "test", false).unwrap();
    let stats = crawler.crawl().await.unwrap();

    assert_eq!(stats.downloads_completed, 2);
    assert_eq!(stats.urls_registered, 2);
}

#[tokio::test]
async fn test_crawl_with_depth_limit() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<a href="/d1">Depth 1</a>"#, 1).await;
    mount_page(&mock_server, "/d1", r#"<a href="/d2">Depth 2</a>"#, 1).await;
    mount_page(&mock_server, "/d2", "<p>too deep</p>", 0).await;

    let mut config = create_test_config(vec![format!("{}/", base_url)]);
    config.crawler.max_depth = Some(1);

    let crawler = Coordinator::from_config(&config, "test", false).unwrap();
    let stats = crawler.crawl().await.unwrap();

    assert_eq!(stats.downloads_completed, 2);
    assert_eq!(stats.urls_registered, 2);
}

#[tokio::test]
async fn test_non_2xx_is_a_result_not_an_error() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(&mock_server, "/", r#"<a href="/missing">Broken</a>"#, 1).await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    let config = create_test_config(vec![format!("{}/", base_url)]);
    let crawler = Coordinator::from_config(&config, "test", false).unwrap();
    let stats = crawler.crawl().await.unwrap();

    assert_eq!(stats.downloads_completed, 2);
    assert_eq!(stats.download_errors, 0);
}

#[tokio::test]
async fn test_always_timing_out_server_gets_retry_count_plus_one_attempts() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(html_page("<p>late</p>").set_delay(Duration::from_secs(2)))
        .expect(3)
        .mount(&mock_server)
        .await;

    let download = DownloadConfig {
        read_timeout: 200,
        retry_count: 2,
        retry_delay: 10,
        ..DownloadConfig::default()
    };
    let downloader = HttpDownloader::new(&user_agent(), &download).unwrap();

    let result = downloader
        .download(&entry(&format!("{}/slow", mock_server.uri())))
        .await;

    assert!(matches!(result, Err(DownloadError::Timeout { .. })));
}

#[tokio::test]
async fn test_max_download_errors_stops_crawl() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    Mock::given(method("GET"))
        .respond_with(html_page("<p>late</p>").set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let mut config = create_test_config(vec![
        format!("{}/e1", base_url),
        format!("{}/e2", base_url),
        format!("{}/e3", base_url),
    ]);
    config.crawler.max_concurrent_downloads = 1;
    config.crawler.max_download_errors = Some(2);
    config.download.read_timeout = 100;

    let crawler = Coordinator::from_config(&config, "test", false).unwrap();
    let stats = crawler.crawl().await.unwrap();

    assert_eq!(stats.download_errors, 2);
    assert_eq!(stats.downloads_started, 2);
    assert_eq!(stats.queued_remaining, 1);
    assert_eq!(stats.stop_reason, Some(StopReason::MaxDownloadErrors));
    assert_eq!(stats.phase, CrawlPhase::Completed);
}

#[tokio::test]
async fn test_large_bodies_spool_to_disk_and_oversized_bodies_are_dropped() {
    let mock_server = MockServer::start().await;
    let payload: Vec<u8> = (0..4096).map(|i| (i % 251) as u8).collect();

    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&mock_server)
        .await;

    let url = format!("{}/blob", mock_server.uri());

    let spooling = HttpDownloader::new(
        &user_agent(),
        &DownloadConfig {
            max_in_memory_size: 1024,
            ..DownloadConfig::default()
        },
    )
    .unwrap();
    let result = spooling.download(&entry(&url)).await.unwrap();
    let body = result.body.as_ref().unwrap();
    let spill_path = body.path().unwrap().to_path_buf();
    assert!(spill_path.exists());
    assert_eq!(body.read_all().unwrap(), payload);
    drop(result);
    assert!(!spill_path.exists());

    let capped = HttpDownloader::new(
        &user_agent(),
        &DownloadConfig {
            max_content_size: Some(100),
            ..DownloadConfig::default()
        },
    )
    .unwrap();
    let result = capped.download(&entry(&url)).await.unwrap();
    assert!(result.truncated);
    assert!(result.body.is_none());
    assert_eq!(result.status, 200);
}

#[tokio::test]
async fn test_progress_callback_reports_bytes_per_attempt() {
    let mock_server = MockServer::start().await;
    let payload = vec![b'x'; 64 * 1024];

    Mock::given(method("GET"))
        .and(path("/large"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(payload.clone()))
        .mount(&mock_server)
        .await;

    let seen: Arc<Mutex<Vec<(String, u32, u64)>>> = Arc::new(Mutex::new(Vec::new()));
    let progress: ProgressCallback = {
        let seen = seen.clone();
        Arc::new(move |step: &CrawlStep, attempt: u32, bytes: u64| {
            seen.lock()
                .unwrap()
                .push((step.uri().path().to_string(), attempt, bytes));
        })
    };

    let downloader = HttpDownloader::new(&user_agent(), &DownloadConfig::default())
        .unwrap()
        .with_progress(progress);
    let result = downloader
        .download(&entry(&format!("{}/large", mock_server.uri())))
        .await
        .unwrap();
    assert_eq!(result.body.as_ref().unwrap().len(), payload.len() as u64);

    let seen = seen.lock().unwrap();
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|(p, attempt, _)| p == "/large" && *attempt == 0));
    assert!(seen.windows(2).all(|pair| pair[0].2 <= pair[1].2));
    assert_eq!(seen.last().unwrap().2, payload.len() as u64);
}

/// Downloader that records how many downloads overlap
#[derive(Default)]
struct OverlapTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Downloader for OverlapTracker {
    async fn download(&self, entry: &QueueEntry) -> Result<FetchResult, DownloadError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(FetchResult::new(entry.clone(), 200))
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_in_flight_downloads_never_exceed_limit() {
    let tracker = Arc::new(OverlapTracker::default());
    let seeds: Vec<String> = (0..12)
        .map(|i| format!("https://example.com/page{}", i))
        .collect();

    let crawler = Coordinator::builder()
        .seeds(seeds)
        .max_concurrent_downloads(3)
        .downloader(tracker.clone())
        .build()
        .unwrap();

    let stats = crawler.crawl().await.unwrap();

    assert_eq!(stats.downloads_completed, 12);
    assert!(tracker.peak.load(Ordering::SeqCst) <= 3);
    assert!(tracker.peak.load(Ordering::SeqCst) >= 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_add_step_of_same_url_queues_once() {
    let crawler = Coordinator::builder()
        .downloader(Arc::new(OverlapTracker::default()))
        .build()
        .unwrap();

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let crawler = crawler.clone();
            tokio::spawn(async move {
                crawler
                    .add_step(
                        Url::parse("https://example.com/same").unwrap(),
                        1,
                        None,
                        Properties::new(),
                    )
                    .await
                    .unwrap()
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(crawler.stats().queued_remaining, 1);
}

struct SkipPath(&'static str);

#[async_trait]
impl CrawlObserver for SkipPath {
    async fn before_download(&self, step: &CrawlStep) -> bool {
        step.uri().path() != self.0
    }
}

#[tokio::test]
async fn test_observer_can_veto_downloads() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/keep">Keep</a><a href="/skip">Skip</a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/keep", "<p>kept</p>", 1).await;
    mount_page(&mock_server, "/skip", "<p>skipped</p>", 0).await;

    let downloader = HttpDownloader::new(&user_agent(), &DownloadConfig::default()).unwrap();
    let crawler = Coordinator::builder()
        .seeds([format!("{}/", base_url)])
        .downloader(Arc::new(downloader))
        .pipeline_step(Arc::new(LinkExtractor::new()))
        .observer(Arc::new(SkipPath("/skip")))
        .build()
        .unwrap();

    let stats = crawler.crawl().await.unwrap();
    assert_eq!(stats.downloads_completed, 2);
}

#[tokio::test]
async fn test_sqlite_crawl_resumes_queue() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    mount_page(
        &mock_server,
        "/",
        r#"<a href="/a">A</a><a href="/b">B</a>"#,
        1,
    )
    .await;
    mount_page(&mock_server, "/a", "<p>a</p>", 1).await;
    mount_page(&mock_server, "/b", "<p>b</p>", 1).await;

    let mut config = create_test_config(vec![format!("{}/", base_url)]);
    config.storage = StorageConfig {
        backend: StorageBackend::Sqlite,
        database_path: Some(db_path.to_string_lossy().into_owned()),
    };
    config.crawler.max_concurrent_downloads = 1;
    config.crawler.max_downloads = Some(1);

    let first = Coordinator::from_config(&config, "first", false).unwrap();
    let stats = first.crawl().await.unwrap();
    assert_eq!(stats.downloads_completed, 1);
    assert_eq!(stats.queued_remaining, 2);
    assert_eq!(stats.stop_reason, Some(StopReason::MaxDownloads));
    drop(first);

    config.crawler.max_downloads = None;
    let resumed = Coordinator::from_config(&config, "second", false).unwrap();
    let stats = resumed.crawl().await.unwrap();

    assert_eq!(stats.downloads_completed, 2);
    assert_eq!(stats.queued_remaining, 0);
    assert_eq!(stats.urls_registered, 3);
    assert_eq!(stats.stop_reason, None);
}

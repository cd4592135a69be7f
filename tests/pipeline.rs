//! Integration tests against an in-process fake extraction service.
//!
//! The fake answers every endpoint the batch uses and counts the requests it
//! receives, so the tests can check exactly which calls a run makes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Once};
use tei_harvest::artifact::{NO_LINKS_SENTINEL, NO_REFERENCES_SENTINEL};
use tei_harvest::{
    run_batch, verify_categories, ArtifactKind, ArtifactStatus, ArtifactStore, CheckCategory, HarvestConfig,
    HarvestError, Stage, StageOutcome, SummaryOutcome,
};
use tracing_subscriber::EnvFilter;

const SERVICE_VERSION: &str = "0.8.1";

const FULL_TEXT_TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <text>
    <body>
      <figure xml:id="fig_0"><head>Figure 1</head></figure>
      <figure xml:id="fig_1"><head>Figure 2</head></figure>
      <figure type="table" xml:id="tab_0"><head>Table 1</head></figure>
    </body>
  </text>
</TEI>"#;

const HEADER_TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader>
    <profileDesc>
      <abstract>
        <div><p>Galaxies evolve through mergers. Galaxy mergers shape the stellar mass of
        galaxies and the structure of dark matter halos across cosmic time.</p></div>
      </abstract>
    </profileDesc>
  </teiHeader>
</TEI>"#;

const REFERENCES_TEI: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <text><back><listBibl>
    <biblStruct><ptr target="https://example.org/b"/></biblStruct>
    <biblStruct><ptr target="https://example.org/a"/></biblStruct>
    <biblStruct><ptr target="https://example.org/a"/></biblStruct>
  </listBibl></back></text>
</TEI>"#;

// ── Fake service ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeService {
    hits: Mutex<HashMap<&'static str, usize>>,
    /// Answer `processReferences` with HTTP 204.
    references_empty: AtomicBool,
    /// Answer `processFulltextDocument` with HTTP 500.
    full_text_broken: AtomicBool,
    /// Body of `isalive`; `None` answers `true`.
    alive_body: Mutex<Option<&'static str>>,
}

impl FakeService {
    fn hit(&self, endpoint: &'static str) {
        *self.hits.lock().unwrap().entry(endpoint).or_default() += 1;
    }

    fn answer_alive(&self, body: &'static str) {
        *self.alive_body.lock().unwrap() = Some(body);
    }

    fn hits(&self, endpoint: &str) -> usize {
        self.hits.lock().unwrap().get(endpoint).copied().unwrap_or(0)
    }

    /// Document uploads only; probe calls are not counted.
    fn uploads(&self) -> usize {
        ["fulltext", "header", "references", "figures"]
            .iter()
            .map(|e| self.hits(e))
            .sum()
    }
}

async fn version(State(s): State<Arc<FakeService>>) -> &'static str {
    s.hit("version");
    SERVICE_VERSION
}

async fn is_alive(State(s): State<Arc<FakeService>>) -> &'static str {
    s.hit("isalive");
    let body = s.alive_body.lock().unwrap().unwrap_or("true");
    body
}

async fn full_text(State(s): State<Arc<FakeService>>) -> impl IntoResponse {
    s.hit("fulltext");
    if s.full_text_broken.load(Ordering::SeqCst) {
        (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response()
    } else {
        FULL_TEXT_TEI.into_response()
    }
}

async fn header(State(s): State<Arc<FakeService>>) -> &'static str {
    s.hit("header");
    HEADER_TEI
}

async fn references(State(s): State<Arc<FakeService>>) -> impl IntoResponse {
    s.hit("references");
    if s.references_empty.load(Ordering::SeqCst) {
        StatusCode::NO_CONTENT.into_response()
    } else {
        REFERENCES_TEI.into_response()
    }
}

async fn figures(State(s): State<Arc<FakeService>>) -> Vec<u8> {
    s.hit("figures");
    b"\x89PNG\r\n\x1a\nfake".to_vec()
}

/// Start the fake on an ephemeral port; returns its base URL.
async fn spawn_service(state: Arc<FakeService>) -> String {
    let app = Router::new()
        .route("/api/version", get(version))
        .route("/api/isalive", get(is_alive))
        .route("/api/processFulltextDocument", post(full_text))
        .route("/api/processHeaderDocument", post(header))
        .route("/api/processReferences", post(references))
        .route("/api/visualization/figures", post(figures))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn write_pdfs(dir: &Path, ids: &[&str]) {
    for id in ids {
        std::fs::write(dir.join(format!("{id}.pdf")), b"%PDF-1.4\n%%EOF\n").unwrap();
    }
}

static TRACING: Once = Once::new();

/// Library logs on the test writer; `RUST_LOG=tei_harvest=debug` shows them.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with_test_writer()
            .try_init();
    });
}

fn config(url: &str, input: &Path) -> tei_harvest::HarvestConfigBuilder {
    init_tracing();
    HarvestConfig::builder()
        .service_url(url)
        .input_folder(input)
        .probe_attempts(2)
        .probe_interval_secs(0)
        .probe_timeout_secs(5)
        .request_timeout_secs(10)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_run_makes_no_uploads() {
    let service = Arc::new(FakeService::default());
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["beta", "alpha"]);
    let config = config(&url, dir.path()).build().unwrap();

    let first = run_batch(&config).await.unwrap();
    assert_eq!(first.service_version.as_deref(), Some(SERVICE_VERSION));
    assert_eq!(first.documents.len(), 2);
    assert_eq!(first.documents[0].doc_id, "alpha");
    for endpoint in ["fulltext", "header", "references", "figures"] {
        assert_eq!(service.hits(endpoint), 2, "{endpoint}");
    }
    assert_eq!(first.stats.requests, 8);
    assert!(!first.has_failures(), "{:?}", first.documents);

    let store = ArtifactStore::new(dir.path());
    let links = String::from_utf8(store.read("alpha", ArtifactKind::LinksList).unwrap()).unwrap();
    assert_eq!(links, "https://example.org/a\nhttps://example.org/b\n");
    assert!(store.is_complete("alpha", ArtifactKind::FullText));
    assert!(store.is_complete("beta", ArtifactKind::FigureVisualization));
    let cloud = image::load_from_memory(&store.read("beta", ArtifactKind::KeywordCloud).unwrap())
        .unwrap()
        .to_rgba8();
    assert_eq!(cloud.dimensions(), (800, 400));
    assert!(matches!(first.summary, SummaryOutcome::Written { documents: 2, .. }));

    let second = run_batch(&config).await.unwrap();
    assert_eq!(service.uploads(), 8, "no document may be uploaded again");
    assert_eq!(second.stats.requests, 0);
    assert_eq!(second.summary, SummaryOutcome::UpToDate);
    for doc in &second.documents {
        for stage in Stage::ALL {
            assert_eq!(doc.stage(stage).unwrap().outcome, StageOutcome::Skipped);
        }
    }
}

#[tokio::test]
async fn references_204_writes_sentinel() {
    let service = Arc::new(FakeService::default());
    service.references_empty.store(true, Ordering::SeqCst);
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["paper"]);
    let config = config(&url, dir.path())
        .stages(vec![Stage::Links])
        .summary(false)
        .build()
        .unwrap();

    let report = run_batch(&config).await.unwrap();
    assert_eq!(
        report.documents[0].stage(Stage::Links).unwrap().outcome,
        StageOutcome::EmptyResult
    );

    let store = ArtifactStore::new(dir.path());
    let text = String::from_utf8(store.read("paper", ArtifactKind::LinksList).unwrap()).unwrap();
    assert_eq!(text, NO_REFERENCES_SENTINEL);
    assert!(!store.exists("paper", ArtifactKind::References));
    assert_eq!(
        store.status("paper", ArtifactKind::References),
        Some(ArtifactStatus::EmptyResult)
    );

    run_batch(&config).await.unwrap();
    assert_eq!(service.hits("references"), 1);
}

#[tokio::test]
async fn references_without_links_write_sentinel() {
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    write_pdfs(dir.path(), &["paper"]);
    store
        .write_new(
            "paper",
            ArtifactKind::References,
            br#"<TEI xmlns="http://www.tei-c.org/ns/1.0"><listBibl/></TEI>"#,
        )
        .unwrap();

    // Stored references are reused, so the unreachable service is never hit.
    let config = config("http://127.0.0.1:9", dir.path())
        .skip_probe(true)
        .stages(vec![Stage::Links])
        .summary(false)
        .build()
        .unwrap();
    let report = run_batch(&config).await.unwrap();
    assert_eq!(report.stats.requests, 0);
    let text = String::from_utf8(store.read("paper", ArtifactKind::LinksList).unwrap()).unwrap();
    assert_eq!(text, NO_LINKS_SENTINEL);
}

#[tokio::test]
async fn failed_stage_is_retried_next_run() {
    let service = Arc::new(FakeService::default());
    service.full_text_broken.store(true, Ordering::SeqCst);
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["paper"]);
    let config = config(&url, dir.path())
        .stages(vec![Stage::FullText])
        .build()
        .unwrap();

    let first = run_batch(&config).await.unwrap();
    assert!(first.has_failures());
    assert_eq!(first.summary, SummaryOutcome::NoData);
    let store = ArtifactStore::new(dir.path());
    assert_eq!(
        store.status("paper", ArtifactKind::FullText),
        Some(ArtifactStatus::Failed)
    );
    assert!(!store.is_complete("paper", ArtifactKind::FullText));

    service.full_text_broken.store(false, Ordering::SeqCst);
    let second = run_batch(&config).await.unwrap();
    assert!(!second.has_failures());
    assert_eq!(service.hits("fulltext"), 2);
    assert!(store.is_complete("paper", ArtifactKind::FullText));
    assert!(matches!(second.summary, SummaryOutcome::Written { documents: 1, .. }));
}

#[tokio::test]
async fn empty_input_folder_produces_nothing() {
    let service = Arc::new(FakeService::default());
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a pdf").unwrap();

    let report = run_batch(&config(&url, dir.path()).build().unwrap()).await.unwrap();
    assert!(report.documents.is_empty());
    assert_eq!(report.summary, SummaryOutcome::NoData);
    assert_eq!(service.uploads(), 0);
    assert_eq!(service.hits("version"), 0, "nothing to do, nothing to probe");
    let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(entries.len(), 1, "only notes.txt may remain");
}

#[tokio::test]
async fn empty_input_folder_needs_no_service() {
    let dir = tempfile::tempdir().unwrap();
    let config = config("http://127.0.0.1:9", dir.path()).build().unwrap();

    let report = run_batch(&config).await.unwrap();
    assert!(report.documents.is_empty());
    assert_eq!(report.service_version, None);
    assert_eq!(report.summary, SummaryOutcome::NoData);
    assert!(!report.has_failures());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn liveness_answer_is_case_insensitive() {
    let service = Arc::new(FakeService::default());
    service.answer_alive(" True\n");
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["paper"]);
    let config = config(&url, dir.path())
        .stages(vec![Stage::FullText])
        .summary(false)
        .build()
        .unwrap();

    let report = run_batch(&config).await.unwrap();
    assert_eq!(report.service_version.as_deref(), Some(SERVICE_VERSION));
    assert_eq!(service.hits("isalive"), 1);
    assert_eq!(service.hits("fulltext"), 1);
}

#[tokio::test]
async fn service_answering_not_alive_never_becomes_ready() {
    let service = Arc::new(FakeService::default());
    service.answer_alive("false");
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["paper"]);

    let err = run_batch(&config(&url, dir.path()).build().unwrap()).await.unwrap_err();
    assert!(matches!(err, HarvestError::ServiceNotReady { attempts: 2, .. }));
    assert_eq!(service.hits("isalive"), 2);
    assert_eq!(service.uploads(), 0);
}

#[tokio::test]
async fn version_mismatch_never_becomes_ready() {
    let service = Arc::new(FakeService::default());
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["paper"]);
    let config = config(&url, dir.path())
        .expected_version("9.9.9")
        .build()
        .unwrap();

    let err = run_batch(&config).await.unwrap_err();
    match err {
        HarvestError::ServiceNotReady { attempts, .. } => assert_eq!(attempts, 2),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.hits("version"), 2);
    assert_eq!(service.uploads(), 0);
    assert!(!dir.path().join("paper").exists());
}

#[tokio::test]
async fn unreachable_service_gives_up() {
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["paper"]);
    let config = config("http://127.0.0.1:9", dir.path())
        .probe_timeout_secs(1)
        .build()
        .unwrap();
    let err = run_batch(&config).await.unwrap_err();
    assert!(matches!(err, HarvestError::ServiceNotReady { attempts: 2, .. }));
}

#[tokio::test]
async fn summary_chart_is_a_png() {
    let service = Arc::new(FakeService::default());
    let url = spawn_service(Arc::clone(&service)).await;
    let dir = tempfile::tempdir().unwrap();
    write_pdfs(dir.path(), &["a", "b", "c"]);
    let config = config(&url, dir.path())
        .stages(vec![Stage::FullText])
        .build()
        .unwrap();

    let report = run_batch(&config).await.unwrap();
    let path = match report.summary {
        SummaryOutcome::Written { path, documents } => {
            assert_eq!(documents, 3);
            path
        }
        other => panic!("unexpected summary outcome: {other:?}"),
    };
    assert_eq!(path, dir.path().join("figures_in_articles.png"));
    let chart = image::open(&path).unwrap().to_rgba8();
    assert_eq!(chart.height(), 600);
}

#[tokio::test]
async fn verifier_flags_partial_artifacts() {
    let service = Arc::new(FakeService::default());
    let url = spawn_service(Arc::clone(&service)).await;
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_pdfs(input.path(), &["one", "two"]);
    let config = config(&url, input.path())
        .output_folder(output.path())
        .stages(vec![Stage::FullText, Stage::Links])
        .build()
        .unwrap();
    run_batch(&config).await.unwrap();

    let store = ArtifactStore::new(output.path());
    let categories = [
        CheckCategory::DocumentFolder,
        CheckCategory::FullText,
        CheckCategory::LinksList,
        CheckCategory::FiguresSummary,
    ];
    assert!(verify_categories(&store, &["one", "two"], &categories).passed());
    assert!(!input.path().join("one").exists(), "artifacts belong under the output root");

    // The references TEI stays, the derived list goes.
    std::fs::remove_file(store.artifact_path("two", ArtifactKind::LinksList)).unwrap();
    let report = verify_categories(&store, &["one", "two"], &categories);
    assert!(!report.passed());
    let links = report.category(CheckCategory::LinksList).unwrap();
    assert_eq!(links.failing, vec![store.artifact_path("two", ArtifactKind::LinksList)]);
    assert!(report.category(CheckCategory::FullText).unwrap().passed);

    // The next run rebuilds the list from the stored TEI without uploading.
    let before = service.uploads();
    run_batch(&config).await.unwrap();
    assert_eq!(service.uploads(), before);
    assert!(verify_categories(&store, &["one", "two"], &categories).passed());
}

//! Behaviour tests for the acquisition cascade.
//!
//! These tests drive the standard three-tier chain through scripted HTTP
//! responses and a real snapshot file, and check which tier wins, what gets
//! persisted, and what the gate makes of the result.

mod support;

use std::sync::Arc;

use quotegate_core::{
    Batch, CascadeController, HttpError, HttpResponse, PlausibilityGate, Provenance, QuoteRecord,
    Session, SnapshotStore,
};
use support::{
    document_tier, page_url, quote_page, structured_body, structured_client, sym, symbols,
    RoutedHttpClient, DOCUMENT_URL, EMPTY_PAGE, STRUCTURED_URL,
};
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SnapshotStore {
    SnapshotStore::new(dir.path().join("snapshot.json"))
}

fn standard(client: &Arc<RoutedHttpClient>, store: SnapshotStore) -> CascadeController {
    CascadeController::standard(
        structured_client(client.clone()),
        document_tier(client.clone()),
        store,
    )
}

// =============================================================================
// Escalation
// =============================================================================

#[tokio::test]
async fn when_structured_endpoint_answers_pages_are_never_fetched() {
    // Given: a healthy structured endpoint
    let dir = TempDir::new().expect("temp dir");
    let client = Arc::new(RoutedHttpClient::new().route(
        STRUCTURED_URL,
        vec![Ok(HttpResponse::ok(structured_body(&[
            ("SMR", 18.4, 5_432_100),
            ("URA", 27.1, 812_000),
        ])))],
    ));
    let cascade = standard(&client, store_in(&dir));

    // When: the cascade runs
    let success = cascade
        .acquire(&symbols(&["SMR", "URA"]))
        .await
        .expect("structured tier succeeds");

    // Then: the batch is live-structured and no quote page was requested
    assert_eq!(success.provenance, Provenance::LiveStructured);
    assert_eq!(success.chain, vec![Provenance::LiveStructured]);
    assert!(success.failures.is_empty());
    assert_eq!(client.requests_to(DOCUMENT_URL), 0);
    assert_eq!(success.batch.get(&sym("SMR")).and_then(|r| r.price), Some(18.4));
}

#[tokio::test]
async fn when_structured_extraction_fails_pages_win_and_the_snapshot_is_written() {
    // Given: a structured endpoint serving a captcha and working quote pages
    let dir = TempDir::new().expect("temp dir");
    let store = store_in(&dir);
    let client = Arc::new(
        RoutedHttpClient::new()
            .route(STRUCTURED_URL, vec![Ok(HttpResponse::ok("<html>captcha</html>"))])
            .route(&page_url("SMR"), vec![Ok(HttpResponse::ok(quote_page("SMR", 18.4, 1_000)))])
            .route(&page_url("URA"), vec![Ok(HttpResponse::ok(EMPTY_PAGE))]),
    );
    let cascade = standard(&client, store.clone());

    // When: the cascade runs
    let success = cascade
        .acquire(&symbols(&["SMR", "URA"]))
        .await
        .expect("document tier succeeds");

    // Then: the batch comes from the pages, the structured failure is recorded,
    // and the snapshot now holds the page data
    assert_eq!(success.provenance, Provenance::LiveUnstructured);
    assert_eq!(success.failures.len(), 1);
    assert_eq!(success.failures[0].code, "extraction.malformed");
    assert!(success.warnings.iter().any(|w| w.contains("fell back")));

    let saved = store.load().expect("snapshot written");
    let smr = saved.get(&sym("SMR")).expect("SMR persisted");
    assert_eq!(smr.price, Some(18.4));
    assert_eq!(smr.provenance, Provenance::Cached);
    assert!(saved.get(&sym("URA")).is_none());
}

#[tokio::test]
async fn when_live_tiers_fail_the_previous_snapshot_is_served_unchanged() {
    // Given: a snapshot from an earlier run and an upstream that is down
    let dir = TempDir::new().expect("temp dir");
    let store = store_in(&dir);
    store
        .save(&Batch::from_records(vec![
            QuoteRecord::empty(sym("SMR"), Provenance::LiveStructured).with_price(17.9),
            QuoteRecord::empty(sym("URA"), Provenance::LiveStructured).with_price(26.5),
        ]))
        .expect("seed snapshot");
    let before = std::fs::read(store.path()).expect("snapshot bytes");

    let client = Arc::new(
        RoutedHttpClient::new()
            .route(STRUCTURED_URL, vec![Ok(HttpResponse::new(503, ""))])
            .route(DOCUMENT_URL, vec![Err(HttpError::connect("connection refused"))]),
    );
    let cascade = standard(&client, store.clone());

    // When: only SMR is requested
    let success = cascade
        .acquire(&symbols(&["SMR"]))
        .await
        .expect("snapshot tier succeeds");

    // Then: the cached batch is restricted to SMR and the file is untouched
    assert_eq!(success.provenance, Provenance::Cached);
    assert_eq!(success.batch.len(), 1);
    assert_eq!(success.batch.get(&sym("SMR")).and_then(|r| r.price), Some(17.9));
    assert_eq!(
        success.failures.iter().map(|f| f.code).collect::<Vec<_>>(),
        vec!["transport.status", "transport.connect"]
    );
    assert_eq!(std::fs::read(store.path()).expect("snapshot bytes"), before);
}

#[tokio::test]
async fn when_every_tier_fails_the_cascade_is_exhausted() {
    // Given: no upstream and no snapshot on disk
    let dir = TempDir::new().expect("temp dir");
    let client = Arc::new(
        RoutedHttpClient::new()
            .route(STRUCTURED_URL, vec![Err(HttpError::timeout("deadline"))])
            .route(DOCUMENT_URL, vec![Ok(HttpResponse::ok(EMPTY_PAGE))]),
    );
    let cascade = standard(&client, store_in(&dir));

    // When: the cascade runs
    let exhausted = cascade
        .acquire(&symbols(&["SMR", "URA"]))
        .await
        .expect_err("nothing usable anywhere");

    // Then: each tier is reported once, in order
    assert_eq!(
        exhausted.chain,
        vec![Provenance::LiveStructured, Provenance::LiveUnstructured, Provenance::Cached]
    );
    assert_eq!(
        exhausted.failures.iter().map(|f| f.code).collect::<Vec<_>>(),
        vec!["transport.timeout", "tier.no_data", "snapshot.unavailable"]
    );
    // Timeouts are retried up to the bound
    assert_eq!(client.requests_to(STRUCTURED_URL), 3);
}

#[tokio::test]
async fn when_quote_pages_are_rate_limited_remaining_symbols_are_skipped() {
    // Given: the structured endpoint is down and the first page answers 429
    let dir = TempDir::new().expect("temp dir");
    let client = Arc::new(
        RoutedHttpClient::new()
            .route(STRUCTURED_URL, vec![Ok(HttpResponse::new(500, ""))])
            .route(DOCUMENT_URL, vec![Ok(HttpResponse::new(429, ""))]),
    );
    let cascade = standard(&client, store_in(&dir));

    // When: three symbols are requested
    let exhausted = cascade
        .acquire(&symbols(&["SMR", "URA", "XLU"]))
        .await
        .expect_err("no data");

    // Then: only one page was fetched and the throttle is what gets reported
    assert_eq!(client.requests_to(DOCUMENT_URL), 1);
    assert_eq!(exhausted.failures[1].code, "transport.rate_limited");
}

#[tokio::test]
async fn when_parallel_pages_are_rate_limited_every_page_is_still_requested() {
    // Given: the structured endpoint is down and every page answers 429
    let dir = TempDir::new().expect("temp dir");
    let client = Arc::new(
        RoutedHttpClient::new()
            .route(STRUCTURED_URL, vec![Ok(HttpResponse::new(500, ""))])
            .route(DOCUMENT_URL, vec![Ok(HttpResponse::new(429, ""))]),
    );
    let cascade = CascadeController::standard(
        structured_client(client.clone()),
        document_tier(client.clone()).with_parallel(true),
        store_in(&dir),
    );

    // When: three symbols are requested with parallel page fetching
    let exhausted = cascade
        .acquire(&symbols(&["SMR", "URA", "XLU"]))
        .await
        .expect_err("no data");

    // Then: all pages went out together, each once, and the throttle is reported
    assert_eq!(client.requests_to(DOCUMENT_URL), 3);
    assert_eq!(exhausted.failures[1].code, "transport.rate_limited");
}

// =============================================================================
// Cascade into the gate
// =============================================================================

#[tokio::test]
async fn when_pages_yield_negative_volume_and_a_blank_symbol_the_batch_is_rejected() {
    // Given: structured tier fails; page A has price 5.0 and volume -10,
    // page B exposes nothing
    let dir = TempDir::new().expect("temp dir");
    let store = store_in(&dir);
    let client = Arc::new(
        RoutedHttpClient::new()
            .route(
                STRUCTURED_URL,
                vec![Ok(HttpResponse::ok(
                    r#"{"quoteResponse":{"result":[],"error":null}}"#,
                ))],
            )
            .route(&page_url("A"), vec![Ok(HttpResponse::ok(quote_page("A", 5.0, -10)))])
            .route(&page_url("B"), vec![Ok(HttpResponse::ok(EMPTY_PAGE))]),
    );
    let session = Session::new(standard(&client, store.clone()), PlausibilityGate::default());

    // When: the session acquires and gates A and B
    let acquisition = session
        .acquire(&symbols(&["A", "B"]))
        .await
        .expect("document tier succeeds");

    // Then: both symbols are flagged, the majority rule rejects the batch,
    // and the live data was still persisted
    assert_eq!(acquisition.provenance(), Provenance::LiveUnstructured);
    let verdict = &acquisition.verdict;
    assert!(!verdict.ok);
    assert!(verdict.issues.iter().any(|i| i == "A: negative volume -10"));
    assert!(verdict.issues.iter().any(|i| i == "B: price missing (no record)"));
    assert!(verdict
        .issues
        .iter()
        .any(|i| i == "majority flagged: 2 of 2 symbols have findings"));
    assert_eq!(verdict.summary, "suspect, 3 incidents");

    assert!(acquisition.context.contains("A: 5.00 (chg N/A %, vol -10, src live-unstructured)"));
    assert!(acquisition.context.contains("B: no data"));
    assert!(store.load().is_some());
}

#[tokio::test]
async fn when_upstream_returns_an_unrequested_symbol_the_verdict_ignores_it() {
    // Given: SMR is requested but the endpoint also returns XYZ with a negative price
    let dir = TempDir::new().expect("temp dir");
    let client = Arc::new(RoutedHttpClient::new().route(
        STRUCTURED_URL,
        vec![Ok(HttpResponse::ok(structured_body(&[
            ("SMR", 21.5, 1_000),
            ("XYZ", -1.0, 1_000),
        ])))],
    ));
    let session = Session::new(standard(&client, store_in(&dir)), PlausibilityGate::default());

    // When: the session acquires and gates SMR
    let acquisition = session
        .acquire(&symbols(&["SMR"]))
        .await
        .expect("structured tier succeeds");

    // Then: XYZ never enters the batch, so the verdict is the one SMR alone earns
    assert_eq!(acquisition.cascade.batch.requested(), symbols(&["SMR"]).as_slice());
    assert!(acquisition.cascade.batch.get(&sym("XYZ")).is_none());
    assert!(acquisition.verdict.ok);
    assert!(acquisition.verdict.issues.is_empty());
    assert!(acquisition.verdict.tolerated.is_empty());
    assert_eq!(acquisition.verdict.summary, "stable");
    assert!(!acquisition.context.contains("XYZ"));
}

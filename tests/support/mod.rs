//! Shared doubles and fixtures for the behaviour tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::io::Write;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use quotegate_core::{
    DocumentQuoteClient, DocumentTier, HttpClient, HttpError, HttpRequest, HttpResponse,
    RetryConfig, StructuredQuoteClient, Symbol, Transport,
};

pub const STRUCTURED_URL: &str = "https://structured.test/v7/finance/quote";
pub const DOCUMENT_URL: &str = "https://pages.test/quote";

type Reply = Result<HttpResponse, HttpError>;

/// HTTP double that answers by URL prefix from per-route scripts.
///
/// A route whose script runs dry keeps repeating its last reply. Unrouted
/// URLs fail with a connect error.
#[derive(Default)]
pub struct RoutedHttpClient {
    routes: Mutex<Vec<(String, VecDeque<Reply>, Option<Reply>)>>,
    requests: Mutex<Vec<String>>,
}

impl RoutedHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(self, prefix: &str, replies: Vec<Reply>) -> Self {
        self.routes
            .lock()
            .expect("routes lock")
            .push((prefix.to_owned(), replies.into(), None));
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn requests_to(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|url| url.starts_with(prefix))
            .count()
    }

    fn reply_for(&self, url: &str) -> Reply {
        let mut routes = self.routes.lock().expect("routes lock");
        let route = routes
            .iter_mut()
            .filter(|(prefix, _, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _, _)| prefix.len());

        match route {
            Some((_, script, last)) => match script.pop_front() {
                Some(reply) => {
                    *last = Some(reply.clone());
                    reply
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Err(HttpError::other("script exhausted"))),
            },
            None => Err(HttpError::connect(format!("no route for {url}"))),
        }
    }
}

impl HttpClient for RoutedHttpClient {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.url.clone());
        let reply = self.reply_for(&request.url);
        Box::pin(async move { reply })
    }
}

pub fn transport(client: Arc<RoutedHttpClient>) -> Transport {
    Transport::new(client, RetryConfig::fixed(Duration::ZERO, 3))
}

pub fn structured_client(client: Arc<RoutedHttpClient>) -> StructuredQuoteClient {
    StructuredQuoteClient::new(transport(client), STRUCTURED_URL).with_timeout_ms(100)
}

pub fn document_tier(client: Arc<RoutedHttpClient>) -> DocumentTier {
    DocumentTier::new(DocumentQuoteClient::new(transport(client), DOCUMENT_URL).with_timeout_ms(100))
}

pub fn page_url(symbol: &str) -> String {
    format!("{DOCUMENT_URL}/{symbol}")
}

pub fn symbols(raw: &[&str]) -> Vec<Symbol> {
    raw.iter()
        .map(|symbol| Symbol::parse(symbol).expect("valid symbol"))
        .collect()
}

pub fn sym(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

/// Structured endpoint body from `(symbol, price, volume)` triples.
pub fn structured_body(quotes: &[(&str, f64, i64)]) -> String {
    let result: Vec<serde_json::Value> = quotes
        .iter()
        .map(|(symbol, price, volume)| {
            serde_json::json!({
                "symbol": symbol,
                "regularMarketPrice": price,
                "regularMarketChangePercent": 1.25,
                "regularMarketVolume": volume,
                "currency": "USD",
                "regularMarketTime": 1_718_029_800,
            })
        })
        .collect();
    serde_json::json!({ "quoteResponse": { "result": result, "error": null } }).to_string()
}

/// Quote page exposing price and volume through inline widgets.
pub fn quote_page(symbol: &str, price: f64, volume: i64) -> String {
    format!(
        concat!(
            "<html><body>",
            r#"<fin-streamer data-symbol="{symbol}" data-field="regularMarketPrice" value="{price}"></fin-streamer>"#,
            r#"<fin-streamer data-symbol="{symbol}" data-field="regularMarketVolume" value="{volume}"></fin-streamer>"#,
            "</body></html>"
        ),
        symbol = symbol,
        price = price,
        volume = volume
    )
}

pub const EMPTY_PAGE: &str = "<html><body><h1>Symbol lookup</h1></body></html>";

pub fn gzip(text: &str) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(text.as_bytes()).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{ExtractionError, TierError};
use crate::transport::Transport;
use crate::{validate_currency_code, Batch, Provenance, QuoteRecord, Symbol};

/// Multi-symbol JSON quote client. One round-trip for the whole symbol set.
#[derive(Clone)]
pub struct StructuredQuoteClient {
    transport: Transport,
    endpoint: String,
    headers: BTreeMap<String, String>,
    timeout_ms: u64,
}

impl StructuredQuoteClient {
    pub fn new(transport: Transport, endpoint: impl Into<String>) -> Self {
        Self {
            transport,
            endpoint: endpoint.into(),
            headers: super::request_headers(super::DEFAULT_USER_AGENT),
            timeout_ms: 8_000,
        }
    }

    pub fn with_headers(mut self, headers: BTreeMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn url_for(&self, symbols: &[Symbol]) -> String {
        let joined = symbols
            .iter()
            .map(Symbol::as_str)
            .collect::<Vec<_>>()
            .join(",");
        format!("{}?symbols={}", self.endpoint, urlencoding::encode(&joined))
    }

    /// Fetch and parse quotes for `symbols`.
    pub async fn fetch(&self, symbols: &[Symbol]) -> Result<Batch, TierError> {
        let url = self.url_for(symbols);
        let body = self
            .transport
            .fetch_text(&url, &self.headers, self.timeout_ms)
            .await?;
        Ok(parse_structured(&body, symbols)?)
    }
}

#[derive(Debug, Deserialize)]
struct QuoteEnvelope {
    #[serde(rename = "quoteResponse")]
    quote_response: QuoteResponse,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    result: Vec<QuoteItem>,
    #[serde(default)]
    error: Option<Value>,
}

// Numeric fields stay as raw JSON so one odd value cannot fail the envelope.
#[derive(Debug, Deserialize)]
struct QuoteItem {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(rename = "regularMarketPrice", default)]
    regular_market_price: Option<Value>,
    #[serde(rename = "regularMarketChangePercent", default)]
    regular_market_change_percent: Option<Value>,
    #[serde(rename = "regularMarketVolume", default)]
    regular_market_volume: Option<Value>,
    #[serde(default)]
    currency: Option<Value>,
    #[serde(rename = "regularMarketTime", default)]
    regular_market_time: Option<Value>,
}

impl QuoteItem {
    fn into_record(self) -> Option<QuoteRecord> {
        let symbol = Symbol::parse(self.symbol.as_deref()?).ok()?;

        Some(QuoteRecord {
            symbol,
            price: self.regular_market_price.as_ref().and_then(number_f64),
            change_percent: self
                .regular_market_change_percent
                .as_ref()
                .and_then(number_f64),
            volume: self.regular_market_volume.as_ref().and_then(number_i64),
            currency: self
                .currency
                .as_ref()
                .and_then(Value::as_str)
                .and_then(|raw| validate_currency_code(raw).ok()),
            as_of: self.regular_market_time.as_ref().and_then(number_i64),
            provenance: Provenance::LiveStructured,
        })
    }
}

/// Parse a quote envelope into a batch for `requested`.
///
/// Items without a valid symbol are skipped, as are symbols that were not
/// requested. Absent or unparseable fields stay absent.
pub fn parse_structured(body: &str, requested: &[Symbol]) -> Result<Batch, ExtractionError> {
    let envelope: QuoteEnvelope =
        serde_json::from_str(body).map_err(|error| ExtractionError::Malformed(error.to_string()))?;

    if let Some(error) = envelope.quote_response.error.filter(|value| !value.is_null()) {
        let description = error
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| error.to_string());
        return Err(ExtractionError::Upstream(description));
    }

    let mut batch = Batch::new(requested.to_vec());
    let mut skipped = 0_usize;
    for item in envelope.quote_response.result {
        match item.into_record() {
            Some(record) if requested.contains(&record.symbol) => batch.insert(record),
            Some(record) => {
                tracing::debug!(symbol = %record.symbol, "unrequested structured item dropped");
                skipped += 1;
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::debug!(skipped, "structured items skipped");
    }
    if batch.is_empty() {
        return Err(ExtractionError::Empty);
    }

    Ok(batch)
}

// Accepts plain numbers, numeric strings and `{"raw": n}` wrappers.
fn number_f64(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        Value::Object(map) => map.get("raw").and_then(number_f64),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}

fn number_i64(value: &Value) -> Option<i64> {
    if let Some(integer) = value.as_i64() {
        return Some(integer);
    }
    let float = number_f64(value)?;
    if float.fract() != 0.0 || float.abs() > i64::MAX as f64 {
        return None;
    }
    Some(float as i64)
}

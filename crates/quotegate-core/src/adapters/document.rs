use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TierError;
use crate::transport::{FetchedBody, Transport};
use crate::{Provenance, QuoteRecord, Symbol};

const NUMBER: &str = r"([0-9eE.+\-]+)";

static EMBEDDED_PRICE: LazyLock<Regex> = LazyLock::new(|| embedded_raw("regularMarketPrice"));
static EMBEDDED_CHANGE: LazyLock<Regex> =
    LazyLock::new(|| embedded_raw("regularMarketChangePercent"));
static EMBEDDED_VOLUME: LazyLock<Regex> = LazyLock::new(|| embedded_raw("regularMarketVolume"));
static EMBEDDED_TIME: LazyLock<Regex> = LazyLock::new(|| embedded_raw("regularMarketTime"));
static BARE_VOLUME: LazyLock<Regex> = LazyLock::new(|| embedded_bare("regularMarketVolume"));
static BARE_TIME: LazyLock<Regex> = LazyLock::new(|| embedded_bare("regularMarketTime"));
static CURRENCY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""currency"\s*:\s*"([A-Z]{3})""#).expect("static pattern"));

fn embedded_raw(field: &str) -> Regex {
    Regex::new(&format!(r#""{field}"\s*:\s*\{{\s*"raw"\s*:\s*{NUMBER}"#)).expect("static pattern")
}

fn embedded_bare(field: &str) -> Regex {
    Regex::new(&format!(r#""{field}"\s*:\s*{NUMBER}"#)).expect("static pattern")
}

const WIDGET_FIELDS: [&str; 3] = [
    "regularMarketPrice",
    "regularMarketChangePercent",
    "regularMarketVolume",
];

/// Inline quote widgets: `data-symbol="SYM" ... data-field="F" ... value="n"`.
fn widget_patterns(symbol: &Symbol) -> BTreeMap<&'static str, Regex> {
    let escaped = regex::escape(symbol.as_str());
    WIDGET_FIELDS
        .iter()
        .filter_map(|&field| {
            let pattern =
                format!(r#"data-symbol="{escaped}".+?data-field="{field}".+?value="{NUMBER}""#);
            match Regex::new(&pattern) {
                Ok(regex) => Some((field, regex)),
                Err(error) => {
                    tracing::debug!(symbol = %symbol, field, %error, "widget pattern rejected");
                    None
                }
            }
        })
        .collect()
}

/// Page text plus the widget patterns of the symbol being extracted.
struct Scope<'a> {
    widgets: BTreeMap<&'static str, Regex>,
    text: &'a str,
}

impl<'a> Scope<'a> {
    fn new(symbol: &Symbol, text: &'a str) -> Self {
        Self {
            widgets: widget_patterns(symbol),
            text,
        }
    }

    fn widget(&self, field: &str) -> Option<String> {
        capture(self.widgets.get(field)?, self.text)
    }

    fn embedded(&self, regex: &Regex) -> Option<String> {
        capture(regex, self.text)
    }
}

fn capture(regex: &Regex, text: &str) -> Option<String> {
    regex
        .captures(text)
        .and_then(|captures| captures.get(1))
        .map(|matched| matched.as_str().to_owned())
}

type Rule = fn(&Scope<'_>) -> Option<String>;

const PRICE_RULES: &[Rule] = &[
    |scope| scope.widget("regularMarketPrice"),
    |scope| scope.embedded(&EMBEDDED_PRICE),
];

const CHANGE_RULES: &[Rule] = &[
    |scope| scope.widget("regularMarketChangePercent"),
    |scope| scope.embedded(&EMBEDDED_CHANGE),
];

const VOLUME_RULES: &[Rule] = &[
    |scope| scope.widget("regularMarketVolume"),
    |scope| scope.embedded(&EMBEDDED_VOLUME),
    |scope| scope.embedded(&BARE_VOLUME),
];

const TIME_RULES: &[Rule] = &[
    |scope| scope.embedded(&EMBEDDED_TIME),
    |scope| scope.embedded(&BARE_TIME),
];

const CURRENCY_RULES: &[Rule] = &[|scope| scope.embedded(&CURRENCY)];

/// First rule whose capture also parses wins.
fn first_match<T>(scope: &Scope<'_>, rules: &[Rule], parse: fn(&str) -> Option<T>) -> Option<T> {
    rules
        .iter()
        .find_map(|rule| rule(scope).and_then(|raw| parse(&raw)))
}

fn parse_float(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|value| value.is_finite())
}

// Integer fields also appear in float notation (`1.2E6`).
fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(value) = raw.parse::<i64>() {
        return Some(value);
    }
    let value = parse_float(raw)?;
    if value.fract() != 0.0 || value.abs() > i64::MAX as f64 {
        return None;
    }
    Some(value as i64)
}

fn parse_currency(raw: &str) -> Option<String> {
    Some(raw.to_owned())
}

/// Extract one symbol's record from a quote page. Never fails; fields the
/// page does not expose stay absent.
pub fn parse_document(symbol: &Symbol, text: &str) -> QuoteRecord {
    let scope = Scope::new(symbol, text);

    QuoteRecord {
        symbol: symbol.clone(),
        price: first_match(&scope, PRICE_RULES, parse_float),
        change_percent: first_match(&scope, CHANGE_RULES, parse_float),
        volume: first_match(&scope, VOLUME_RULES, parse_integer),
        currency: first_match(&scope, CURRENCY_RULES, parse_currency),
        as_of: first_match(&scope, TIME_RULES, parse_integer),
        provenance: Provenance::LiveUnstructured,
    }
}

/// Per-symbol quote page client. One round-trip per symbol.
#[derive(Clone)]
pub struct DocumentQuoteClient {
    transport: Transport,
    base_url: String,
    headers: BTreeMap<String, String>,
    timeout_ms: u64,
}

impl DocumentQuoteClient {
    pub fn new(transport: Transport, base_url: impl Into<String>) -> Self {
        Self {
            transport,
            base_url: base_url.into(),
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

    pub fn url_for(&self, symbol: &Symbol) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            urlencoding::encode(symbol.as_str())
        )
    }

    /// Raw page for `symbol`, for inspecting markup changes.
    pub async fn fetch_raw(&self, symbol: &Symbol) -> Result<FetchedBody, TierError> {
        Ok(self
            .transport
            .fetch(&self.url_for(symbol), &self.headers, self.timeout_ms)
            .await?)
    }

    pub async fn fetch(&self, symbol: &Symbol) -> Result<QuoteRecord, TierError> {
        let text = self.fetch_raw(symbol).await?.text();
        let record = parse_document(symbol, &text);
        tracing::debug!(
            symbol = %symbol,
            bytes = text.len(),
            has_data = record.has_data(),
            "quote page parsed"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sym(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid symbol")
    }

    #[test]
    fn widget_values_win_over_embedded_data() {
        let page = concat!(
            r#"<fin-streamer data-symbol="SMR" data-field="regularMarketPrice" value="18.5"></fin-streamer>"#,
            "\n",
            r#"{"regularMarketPrice":{"raw":99.0,"fmt":"99.00"}}"#
        );

        let record = parse_document(&sym("SMR"), page);
        assert_eq!(record.price, Some(18.5));
    }

    #[test]
    fn widget_is_scoped_to_the_requested_symbol() {
        let page = concat!(
            r#"<fin-streamer data-symbol="URA" data-field="regularMarketPrice" value="27.1">"#,
            "\n",
            r#""regularMarketPrice":{"raw":18.25}"#
        );

        let record = parse_document(&sym("SMR"), page);
        assert_eq!(record.price, Some(18.25));
    }

    #[test]
    fn caret_symbols_are_escaped_in_widget_rule() {
        let page = r#"<fin-streamer data-symbol="^VIX" data-field="regularMarketPrice" value="14.2">"#;

        let record = parse_document(&sym("^VIX"), page);
        assert_eq!(record.price, Some(14.2));
    }

    #[test]
    fn widget_patterns_cover_every_widget_field() {
        let widgets = widget_patterns(&sym("^VIX"));

        assert_eq!(widgets.len(), WIDGET_FIELDS.len());
        assert!(widgets["regularMarketVolume"]
            .is_match(r#"data-symbol="^VIX" data-field="regularMarketVolume" value="12""#));
        assert!(!widgets["regularMarketVolume"]
            .is_match(r#"data-symbol="XVIX" data-field="regularMarketVolume" value="12""#));
    }

    #[test]
    fn fields_fall_back_independently() {
        let page = concat!(
            r#"<fin-streamer data-symbol="XLU" data-field="regularMarketChangePercent" value="-0.42">"#,
            "\n",
            r#"{"regularMarketPrice":{"raw":71.3},"regularMarketVolume":1.2E6,"#,
            r#""currency":"USD","regularMarketTime":1718035200}"#
        );

        let record = parse_document(&sym("XLU"), page);

        assert_eq!(record.price, Some(71.3));
        assert_eq!(record.change_percent, Some(-0.42));
        assert_eq!(record.volume, Some(1_200_000));
        assert_eq!(record.currency.as_deref(), Some("USD"));
        assert_eq!(record.as_of, Some(1_718_035_200));
        assert_eq!(record.provenance, Provenance::LiveUnstructured);
    }

    #[test]
    fn unparseable_values_leave_the_field_absent() {
        let page = concat!(
            r#"<fin-streamer data-symbol="URNM" data-field="regularMarketPrice" value="1.2.3">"#,
            "\n",
            r#""regularMarketVolume":{"raw":4500}"#
        );

        let record = parse_document(&sym("URNM"), page);
        assert_eq!(record.price, None);
        assert_eq!(record.volume, Some(4_500));
    }

    #[test]
    fn empty_page_yields_record_without_data() {
        let record = parse_document(&sym("SMR"), "<html></html>");
        assert!(!record.has_data());
    }

    #[test]
    fn negative_widget_values_are_kept() {
        let page = r#"<fin-streamer data-symbol="SMR" data-field="regularMarketVolume" value="-10">"#;
        let record = parse_document(&sym("SMR"), page);
        assert_eq!(record.volume, Some(-10));
    }
}

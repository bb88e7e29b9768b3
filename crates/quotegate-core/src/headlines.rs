//! Headline titles from RSS and Atom feeds. Never fatal to a run.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::transport::Transport;

pub const DEFAULT_FEED_URL: &str = "https://world-nuclear-news.org/Feeds/All-news";

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:item|entry)\b[^>]*>(.*?)</(?:item|entry)\s*>").expect("static pattern")
});
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title\s*>").expect("static pattern"));
static CDATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>").expect("static pattern"));
static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,7});")
        .expect("static pattern")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

const NAMED_ENTITIES: &[(&str, char)] = &[
    ("amp", '&'),
    ("lt", '<'),
    ("gt", '>'),
    ("quot", '"'),
    ("apos", '\''),
    ("nbsp", '\u{a0}'),
    ("ndash", '\u{2013}'),
    ("mdash", '\u{2014}'),
    ("lsquo", '\u{2018}'),
    ("rsquo", '\u{2019}'),
    ("ldquo", '\u{201c}'),
    ("rdquo", '\u{201d}'),
    ("hellip", '\u{2026}'),
    ("laquo", '\u{ab}'),
    ("raquo", '\u{bb}'),
    ("middot", '\u{b7}'),
    ("deg", '\u{b0}'),
    ("euro", '\u{20ac}'),
    ("pound", '\u{a3}'),
    ("copy", '\u{a9}'),
    ("reg", '\u{ae}'),
    ("trade", '\u{2122}'),
    ("aacute", '\u{e1}'),
    ("agrave", '\u{e0}'),
    ("auml", '\u{e4}'),
    ("ccedil", '\u{e7}'),
    ("eacute", '\u{e9}'),
    ("egrave", '\u{e8}'),
    ("iacute", '\u{ed}'),
    ("ntilde", '\u{f1}'),
    ("oacute", '\u{f3}'),
    ("ouml", '\u{f6}'),
    ("uacute", '\u{fa}'),
    ("uuml", '\u{fc}'),
];

/// RSS `<item>` and Atom `<entry>` titles in document order, at most `limit`.
pub fn extract_titles(xml: &str, limit: usize) -> Vec<String> {
    ENTRY
        .captures_iter(xml)
        .filter_map(|entry| {
            let body = entry.get(1)?.as_str();
            let title = TITLE.captures(body)?.get(1)?.as_str();
            let title = clean_title(title);
            (!title.is_empty()).then_some(title)
        })
        .take(limit)
        .collect()
}

fn clean_title(raw: &str) -> String {
    let unwrapped = CDATA.replace_all(raw, "$1");
    let decoded = decode_entities(&unwrapped);
    WHITESPACE.replace_all(decoded.trim(), " ").into_owned()
}

/// Single pass, so `&amp;lt;` decodes to `&lt;`. Unknown references are
/// left as written.
fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |captures: &Captures<'_>| {
            let reference = &captures[1];
            match resolve_entity(reference) {
                Some(decoded) => decoded.to_string(),
                None => captures[0].to_owned(),
            }
        })
        .into_owned()
}

fn resolve_entity(reference: &str) -> Option<char> {
    let code = if let Some(hex) = reference
        .strip_prefix("#x")
        .or_else(|| reference.strip_prefix("#X"))
    {
        u32::from_str_radix(hex, 16).ok()?
    } else if let Some(decimal) = reference.strip_prefix('#') {
        decimal.parse::<u32>().ok()?
    } else {
        return NAMED_ENTITIES
            .iter()
            .find(|(name, _)| *name == reference)
            .map(|(_, decoded)| *decoded);
    };

    char::from_u32(code).filter(|decoded| *decoded != '\0')
}

/// Fetches configured feeds through the shared transport.
#[derive(Clone)]
pub struct HeadlineFeed {
    transport: Transport,
    feeds: Vec<String>,
    max_headlines: usize,
    headers: BTreeMap<String, String>,
    timeout_ms: u64,
}

impl HeadlineFeed {
    pub fn new(transport: Transport, feeds: Vec<String>, max_headlines: usize) -> Self {
        Self {
            transport,
            feeds,
            max_headlines,
            headers: crate::adapters::request_headers(crate::adapters::DEFAULT_USER_AGENT),
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

    /// Titles across all feeds, capped at `max_headlines` in total.
    pub async fn fetch(&self) -> Vec<String> {
        let mut headlines = Vec::new();
        for feed in &self.feeds {
            let remaining = self.max_headlines.saturating_sub(headlines.len());
            if remaining == 0 {
                break;
            }

            match self.transport.fetch_text(feed, &self.headers, self.timeout_ms).await {
                Ok(xml) => {
                    let titles = extract_titles(&xml, remaining);
                    tracing::debug!(feed = %feed, titles = titles.len(), "headline feed parsed");
                    headlines.extend(titles);
                }
                Err(error) => {
                    tracing::warn!(feed = %feed, %error, "headline feed unavailable");
                }
            }
        }
        headlines
    }
}

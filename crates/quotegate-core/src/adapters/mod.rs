//! Upstream quote sources.
//!
//! | Client | Endpoint | Extraction |
//! |--------|----------|------------|
//! | [`StructuredQuoteClient`] | multi-symbol JSON quote endpoint | serde envelope |
//! | [`DocumentQuoteClient`] | per-symbol HTML quote page | ordered regex rules per field |

use std::collections::BTreeMap;

mod document;
mod structured;

pub use document::{parse_document, DocumentQuoteClient};
pub use structured::{parse_structured, StructuredQuoteClient};

/// Default quote endpoint for [`StructuredQuoteClient`].
pub const DEFAULT_STRUCTURED_URL: &str = "https://query1.finance.yahoo.com/v7/finance/quote";

/// Default quote page prefix for [`DocumentQuoteClient`].
pub const DEFAULT_DOCUMENT_URL: &str = "https://finance.yahoo.com/quote";

pub const DEFAULT_USER_AGENT: &str = concat!("quotegate/", env!("CARGO_PKG_VERSION"));

/// Headers sent with every upstream request.
///
/// Brotli is not advertised because the body decoder only understands gzip
/// and deflate.
pub fn request_headers(user_agent: &str) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert(String::from("user-agent"), user_agent.to_owned());
    headers.insert(String::from("accept-encoding"), String::from("gzip, deflate"));
    headers.insert(String::from("accept-language"), String::from("en-US,en;q=0.9"));
    headers
}

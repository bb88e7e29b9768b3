use crate::{Batch, Provenance, QuoteRecord, UtcDateTime};

/// Deterministic text block handed to the report generator.
///
/// Lines follow the batch's requested order; identical inputs always render
/// identically so repeated runs can be diffed.
pub fn render_context(
    batch: &Batch,
    provenance: Provenance,
    acquired_at: UtcDateTime,
    headlines: &[String],
) -> String {
    let mut out = String::new();
    out.push_str("[market data]\n");
    out.push_str(&format!("provenance: {provenance}\n"));
    out.push_str(&format!("acquired_at: {acquired_at}\n"));
    if provenance == Provenance::Cached {
        out.push_str("freshness: unknown\n");
    }

    for symbol in batch.requested() {
        match batch.get(symbol) {
            Some(record) => {
                out.push_str(&format!("{}\n", render_record(record)));
            }
            None => {
                out.push_str(&format!("{symbol}: no data\n"));
            }
        }
    }

    if !headlines.is_empty() {
        out.push_str("[headlines]\n");
        for headline in headlines {
            out.push_str(&format!("- {headline}\n"));
        }
    }

    out
}

fn render_record(record: &QuoteRecord) -> String {
    let price = record
        .price
        .map_or_else(|| String::from("N/A"), |price| format!("{price:.2}"));
    let change = record
        .change_percent
        .map_or_else(|| String::from("N/A"), |change| format!("{change:+.2}"));
    let volume = record
        .volume
        .map_or_else(|| String::from("N/A"), format_volume);

    format!(
        "{}: {price} (chg {change} %, vol {volume}, src {})",
        record.symbol, record.provenance
    )
}

/// Compact volume: `5.43M`, `12.30K`, or the plain integer.
pub fn format_volume(volume: i64) -> String {
    let magnitude = volume.unsigned_abs() as f64;
    let sign = if volume < 0 { "-" } else { "" };
    if magnitude > 1_000_000.0 {
        format!("{sign}{:.2}M", magnitude / 1_000_000.0)
    } else if magnitude > 1_000.0 {
        format!("{sign}{:.2}K", magnitude / 1_000.0)
    } else {
        volume.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Symbol;

    fn sym(raw: &str) -> Symbol {
        Symbol::parse(raw).expect("valid symbol")
    }

    fn at() -> UtcDateTime {
        UtcDateTime::parse("2024-06-10T14:30:00Z").expect("valid timestamp")
    }

    #[test]
    fn renders_one_line_per_requested_symbol() {
        let mut batch = Batch::new(vec![sym("SMR"), sym("^VIX")]);
        batch.insert(
            QuoteRecord::empty(sym("SMR"), Provenance::LiveStructured)
                .with_price(18.4)
                .with_change_percent(2.5)
                .with_volume(5_432_100),
        );

        let text = render_context(&batch, Provenance::LiveStructured, at(), &[]);

        assert_eq!(
            text,
            "[market data]\n\
             provenance: live-structured\n\
             acquired_at: 2024-06-10T14:30:00Z\n\
             SMR: 18.40 (chg +2.50 %, vol 5.43M, src live-structured)\n\
             ^VIX: no data\n"
        );
    }

    #[test]
    fn cached_context_flags_unknown_freshness_and_lists_headlines() {
        let batch = Batch::from_records(vec![QuoteRecord::empty(sym("URA"), Provenance::Cached)]);

        let text = render_context(
            &batch,
            Provenance::Cached,
            at(),
            &[String::from("Reactor restart approved")],
        );

        assert!(text.contains("freshness: unknown\n"));
        assert!(text.contains("URA: N/A (chg N/A %, vol N/A, src cached)\n"));
        assert!(text.ends_with("[headlines]\n- Reactor restart approved\n"));
    }

    #[test]
    fn volume_uses_compact_suffixes() {
        assert_eq!(format_volume(999), "999");
        assert_eq!(format_volume(12_300), "12.30K");
        assert_eq!(format_volume(2_000_000), "2.00M");
        assert_eq!(format_volume(-10), "-10");
    }
}

use std::process::ExitCode;

use quotegate_core::{
    parse_document, request_headers, DocumentQuoteClient, PipelineConfig, Symbol, Transport,
};

use crate::cli::DebugDocumentArgs;
use crate::error::CliError;

pub async fn run(args: &DebugDocumentArgs, config: &PipelineConfig) -> Result<ExitCode, CliError> {
    let symbol = Symbol::parse(&args.symbol)?;
    let transport = Transport::new(super::http_client(config), config.retry_config());
    let client = DocumentQuoteClient::new(transport, &config.document_url)
        .with_headers(request_headers(&config.user_agent))
        .with_timeout_ms(config.timeout_ms);

    let body = client.fetch_raw(&symbol).await?;
    let text = body.text();
    let record = parse_document(&symbol, &text);

    println!("url: {}", client.url_for(&symbol));
    println!(
        "bytes: {} (content-encoding: {}, attempts: {})",
        body.bytes.len(),
        body.content_encoding.as_deref().unwrap_or("none"),
        body.attempts
    );
    println!("decoded_chars: {}", text.chars().count());
    println!("{}", serde_json::to_string_pretty(&record)?);

    if let Some(path) = &args.out {
        std::fs::write(path, &text)?;
        println!("page written to {}", path.display());
    }

    Ok(ExitCode::SUCCESS)
}

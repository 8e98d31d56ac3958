use anyhow::Context;
use std::io::{BufRead, Write};

pub const TICKER_PROMPT: &str = "Enter stock ticker (e.g., AAPL): ";

/// Trimmed, upper-cased ticker. Blank input is rejected.
pub fn normalize_ticker(raw: &str) -> anyhow::Result<String> {
    let ticker = raw.trim().to_uppercase();
    anyhow::ensure!(!ticker.is_empty(), "ticker must be non-empty");
    Ok(ticker)
}

/// Writes the prompt to `out` and reads one line from `input`.
pub fn read_ticker(input: &mut impl BufRead, out: &mut impl Write) -> anyhow::Result<String> {
    out.write_all(TICKER_PROMPT.as_bytes())?;
    out.flush()?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("failed to read ticker from stdin")?;
    normalize_ticker(&line)
}

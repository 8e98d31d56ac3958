use crate::ingest::types::StatementTable;

// Row labels vary by provider and by endpoint; try them in this order.
pub const REVENUE_ROW_ALIASES: [&str; 2] = ["Total Revenue", "TotalRevenue"];
pub const CURRENT_ASSETS_ALIASES: [&str; 3] =
    ["Total Current Assets", "Current Assets", "CurrentAssets"];
pub const CURRENT_LIABILITIES_ALIASES: [&str; 3] = [
    "Total Current Liabilities",
    "Current Liabilities",
    "CurrentLiabilities",
];

/// Most recent value of the first alias that has a row in `table`.
///
/// The first existing row wins even when its latest cell is empty; later aliases are only
/// consulted when earlier labels are absent altogether.
pub fn first_matching_row(table: &StatementTable, aliases: &[&str]) -> Option<f64> {
    let label = aliases.iter().find(|label| table.contains(label))?;
    table.latest(label)
}

/// Latest-period total revenue; zero and non-finite values count as missing.
pub fn total_revenue(table: &StatementTable) -> Option<f64> {
    first_matching_row(table, &REVENUE_ROW_ALIASES).filter(|v| is_present(*v))
}

/// Current assets / current liabilities for the latest period.
///
/// Zero on either side is treated as missing, so a ratio of exactly 0.0 is never produced.
pub fn current_ratio(table: &StatementTable) -> Option<f64> {
    let assets = first_matching_row(table, &CURRENT_ASSETS_ALIASES).filter(|v| is_present(*v))?;
    let liabilities =
        first_matching_row(table, &CURRENT_LIABILITIES_ALIASES).filter(|v| is_present(*v))?;

    let ratio = assets / liabilities;
    ratio.is_finite().then_some(ratio)
}

fn is_present(v: f64) -> bool {
    v.is_finite() && v != 0.0
}

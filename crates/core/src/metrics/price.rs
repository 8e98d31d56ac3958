use crate::ingest::types::DailyBar;

/// Annualization factor for daily return dispersion.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PriceRisk {
    /// Annualized standard deviation of daily close-to-close returns.
    pub volatility: Option<f64>,
    /// Mean daily traded value (close * volume).
    pub liquidity: Option<f64>,
}

/// Day-over-day percentage change of consecutive closes.
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Sample standard deviation (n - 1). A single observation has no dispersion.
pub fn sample_std_dev(values: &[f64]) -> Option<f64> {
    match values.len() {
        0 => None,
        1 => Some(0.0),
        n => {
            let mean = values.iter().sum::<f64>() / n as f64;
            let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            Some(var.sqrt())
        }
    }
}

/// Volatility and liquidity over `bars`.
///
/// Bars without a close are ignored. With fewer than two closes both fields are `None`;
/// otherwise each field is `None` only when its own inputs are unusable.
pub fn price_risk(bars: &[DailyBar]) -> PriceRisk {
    let closes: Vec<f64> = bars.iter().filter_map(|b| b.close).collect();
    if closes.len() < 2 {
        return PriceRisk::default();
    }

    PriceRisk {
        volatility: annualized_volatility(&closes),
        liquidity: mean_traded_value(bars),
    }
}

fn annualized_volatility(closes: &[f64]) -> Option<f64> {
    let returns = daily_returns(closes);
    if returns.iter().any(|r| !r.is_finite()) {
        return None;
    }
    let volatility = sample_std_dev(&returns)? * TRADING_DAYS_PER_YEAR.sqrt();
    volatility.is_finite().then_some(volatility)
}

fn mean_traded_value(bars: &[DailyBar]) -> Option<f64> {
    let traded: Vec<f64> = bars
        .iter()
        .filter_map(|b| Some(b.close? * b.volume?))
        .collect();
    if traded.is_empty() {
        return None;
    }
    let liquidity = traded.iter().sum::<f64>() / traded.len() as f64;
    liquidity.is_finite().then_some(liquidity)
}

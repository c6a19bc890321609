use crate::processor::AggregateOp;

const LANES: usize = 4;

/// Parses a trimmed numeric string. Blank or unparsable input yields `None`.
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = atoi_simd::parse::<i64>(trimmed.as_bytes()) {
        return Some(v as f64);
    }
    fast_float::parse::<f64, _>(trimmed).ok()
}

/// Like [`parse_number`] but rejects NaN and infinities
pub fn parse_finite(text: &str) -> Option<f64> {
    parse_number(text).filter(|v| v.is_finite())
}

/// Reduces `values` with `op`, four lanes at a time.
///
/// Empty input reduces to 0 for every op.
pub fn reduce_f64(values: &[f64], op: AggregateOp) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    let mut sum = [0f64; LANES];
    let mut min = [f64::INFINITY; LANES];
    let mut max = [f64::NEG_INFINITY; LANES];

    let chunks = values.chunks_exact(LANES);
    let remainder = chunks.remainder();

    for chunk in chunks {
        for lane in 0..LANES {
            sum[lane] += chunk[lane];
            min[lane] = min[lane].min(chunk[lane]);
            max[lane] = max[lane].max(chunk[lane]);
        }
    }

    // horizontal reduction
    let mut total_sum: f64 = sum.iter().sum();
    let mut total_min = min.iter().copied().fold(f64::INFINITY, f64::min);
    let mut total_max = max.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    for &v in remainder {
        total_sum += v;
        total_min = total_min.min(v);
        total_max = total_max.max(v);
    }

    match op {
        AggregateOp::Sum => total_sum,
        AggregateOp::Min => total_min,
        AggregateOp::Max => total_max,
        AggregateOp::Count => values.len() as f64,
        AggregateOp::Avg => total_sum / values.len() as f64,
    }
}

/// `numerator / denominator * 100` with two decimals, or "0" for a zero denominator.
///
/// Halves round away from zero (0.125 gives "0.13"), not to even.
pub fn percent(numerator: f64, denominator: f64) -> String {
    if denominator == 0.0 {
        return "0".to_string();
    }
    let hundredths = (numerator / denominator * 100.0 * 100.0).round();
    format!("{:.2}", hundredths / 100.0)
}

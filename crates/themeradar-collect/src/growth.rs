//! Growth rate arithmetic shared by the source collectors.

use chrono::{DateTime, Utc};

/// Percentage change of the recent average over the previous average.
///
/// Edge cases: growth from nothing reports 100% rather than a division by
/// zero, and two empty windows report 0%.
#[must_use]
pub fn growth_rate(recent: &[f64], previous: &[f64]) -> f64 {
    let recent_avg = average(recent);
    let previous_avg = average(previous);

    if previous_avg == 0.0 {
        if recent_avg > 0.0 {
            return 100.0;
        }
        return 0.0;
    }

    (recent_avg - previous_avg) / previous_avg * 100.0
}

/// Splits a chronologically ordered series into equal halves and returns the
/// growth of the later half over the earlier one.
#[must_use]
pub fn windowed_growth(series: &[f64]) -> f64 {
    if series.len() < 2 {
        return 0.0;
    }
    let mid = series.len() / 2;
    growth_rate(&series[mid..], &series[..mid])
}

/// Growth of timestamped values: the observed time range is split at its
/// midpoint and the later half is compared against the earlier half.
///
/// Points measured at a single instant have no preceding window, so they
/// report growth from nothing.
#[must_use]
pub fn timed_growth(points: &[(DateTime<Utc>, f64)]) -> f64 {
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let Some(earliest) = points.iter().map(|(t, _)| *t).min() else {
        return 0.0;
    };
    let Some(latest) = points.iter().map(|(t, _)| *t).max() else {
        return 0.0;
    };
    if earliest == latest {
        return growth_rate(&values, &[]);
    }

    let midpoint = earliest + (latest - earliest) / 2;
    let previous: Vec<f64> = points
        .iter()
        .filter(|(t, _)| *t < midpoint)
        .map(|(_, v)| *v)
        .collect();
    let recent: Vec<f64> = points
        .iter()
        .filter(|(t, _)| *t >= midpoint)
        .map(|(_, v)| *v)
        .collect();
    growth_rate(&recent, &previous)
}

fn average(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let n = values.len() as f64;
    values.iter().sum::<f64>() / n
}

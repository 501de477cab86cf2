//! Fixed-range histograms that render as metric payloads.

use logsend_core::{LogMessage, Priority};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{MetricsError, Result};

/// What to do with a value outside `[min, max)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Count it in the nearest edge bucket.
    #[default]
    Truncate,
    /// Count it as ignored.
    Ignore,
    /// Return [`MetricsError::OutOfRange`].
    Reject,
}

/// Equal-width buckets over `[min, max)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    min: f64,
    max: f64,
    counts: Vec<u64>,
    ignored: u64,
    sum: f64,
    policy: OutOfRangePolicy,
}

impl Histogram {
    /// Creates a histogram with `buckets` bins.
    ///
    /// # Errors
    ///
    /// Returns an error unless both bounds are finite, `min < max`, and
    /// `buckets > 0`.
    pub fn new(min: f64, max: f64, buckets: usize, policy: OutOfRangePolicy) -> Result<Self> {
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(MetricsError::InvalidConfig(format!(
                "histogram bounds must be finite with min < max, got [{min}, {max})"
            )));
        }
        if buckets == 0 {
            return Err(MetricsError::InvalidConfig(
                "histogram needs at least one bucket".to_string(),
            ));
        }
        Ok(Self {
            min,
            max,
            counts: vec![0; buckets],
            ignored: 0,
            sum: 0.0,
            policy,
        })
    }

    /// Records a value according to the out-of-range policy.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::OutOfRange`] for out-of-range or NaN values
    /// under [`OutOfRangePolicy::Reject`].
    pub fn record(&mut self, value: f64) -> Result<()> {
        let last = self.counts.len() - 1;
        let index = if value >= self.min && value < self.max {
            let width = (self.max - self.min) / self.counts.len() as f64;
            (((value - self.min) / width) as usize).min(last)
        } else {
            match self.policy {
                OutOfRangePolicy::Reject => {
                    return Err(MetricsError::OutOfRange {
                        value,
                        min: self.min,
                        max: self.max,
                    });
                }
                OutOfRangePolicy::Truncate if value < self.min => 0,
                OutOfRangePolicy::Truncate if value >= self.max => last,
                // NaN has no edge to clamp to.
                OutOfRangePolicy::Truncate | OutOfRangePolicy::Ignore => {
                    self.ignored += 1;
                    return Ok(());
                }
            }
        };
        self.counts[index] += 1;
        self.sum += value.clamp(self.min, self.max);
        Ok(())
    }

    /// Returns the bucket counts.
    #[must_use]
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// Returns the `[low, high)` bounds of bucket `index`.
    #[must_use]
    pub fn bucket_bounds(&self, index: usize) -> Option<(f64, f64)> {
        if index >= self.counts.len() {
            return None;
        }
        let width = (self.max - self.min) / self.counts.len() as f64;
        let low = (index as f64).mul_add(width, self.min);
        Some((low, low + width))
    }

    /// Returns the number of recorded values, excluding ignored ones.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    /// Returns the number of values dropped by the ignore policy.
    #[must_use]
    pub const fn ignored(&self) -> u64 {
        self.ignored
    }

    /// Returns the mean of recorded values, clamped to the range.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| self.sum / total as f64)
    }

    /// Returns the upper bound of the bucket holding quantile `q`.
    #[must_use]
    pub fn quantile(&self, q: f64) -> Option<f64> {
        let total = self.total();
        if total == 0 || !(0.0..=1.0).contains(&q) {
            return None;
        }
        let rank = ((q * total as f64).ceil() as u64).max(1);
        let mut seen = 0;
        for (index, count) in self.counts.iter().enumerate() {
            seen += count;
            if seen >= rank {
                return self.bucket_bounds(index).map(|(_, high)| high);
            }
        }
        None
    }

    /// Clears every count.
    pub fn reset(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.ignored = 0;
        self.sum = 0.0;
    }

    /// Renders the histogram as a JSON payload.
    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({
            "min": self.min,
            "max": self.max,
            "counts": self.counts,
            "total": self.total(),
            "ignored": self.ignored,
            "mean": self.mean(),
        })
    }

    /// Wraps [`to_payload`](Self::to_payload) in a metric message.
    #[must_use]
    pub fn to_message(&self, schema: impl Into<String>) -> LogMessage {
        LogMessage::metric(Priority::Info, schema, self.to_payload())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn histogram(policy: OutOfRangePolicy) -> Histogram {
        Histogram::new(0.0, 10.0, 5, policy).unwrap_or_else(|e| panic!("{e}"))
    }

    #[test]
    fn buckets_in_range_values() {
        let mut h = histogram(OutOfRangePolicy::Reject);
        for v in [0.0, 1.9, 2.0, 5.5, 9.99] {
            assert!(h.record(v).is_ok());
        }
        assert_eq!(h.counts(), &[2, 1, 1, 0, 1]);
        assert_eq!(h.total(), 5);
        assert_eq!(h.bucket_bounds(1), Some((2.0, 4.0)));
        assert_eq!(h.bucket_bounds(5), None);
    }

    #[test]
    fn truncate_clamps_to_edges() {
        let mut h = histogram(OutOfRangePolicy::Truncate);
        assert!(h.record(-3.0).is_ok());
        assert!(h.record(10.0).is_ok());
        assert!(h.record(42.0).is_ok());
        assert_eq!(h.counts(), &[1, 0, 0, 0, 2]);
        assert_eq!(h.ignored(), 0);
    }

    #[test]
    fn ignore_counts_separately() {
        let mut h = histogram(OutOfRangePolicy::Ignore);
        assert!(h.record(-1.0).is_ok());
        assert!(h.record(11.0).is_ok());
        assert!(h.record(3.0).is_ok());
        assert_eq!(h.total(), 1);
        assert_eq!(h.ignored(), 2);
    }

    #[test]
    fn reject_returns_error_and_leaves_counts() {
        let mut h = histogram(OutOfRangePolicy::Reject);
        assert!(matches!(
            h.record(10.0),
            Err(MetricsError::OutOfRange { value, .. }) if (value - 10.0).abs() < f64::EPSILON
        ));
        assert!(h.record(f64::NAN).is_err());
        assert_eq!(h.total(), 0);
    }

    #[test]
    fn nan_is_ignored_when_truncating() {
        let mut h = histogram(OutOfRangePolicy::Truncate);
        assert!(h.record(f64::NAN).is_ok());
        assert_eq!(h.ignored(), 1);
        assert_eq!(h.total(), 0);
    }

    #[test_case(0.0, 10.0, 0 ; "no buckets")]
    #[test_case(5.0, 5.0, 3 ; "empty range")]
    #[test_case(5.0, 1.0, 3 ; "inverted range")]
    #[test_case(f64::NEG_INFINITY, 1.0, 3 ; "infinite bound")]
    fn rejects_bad_shape(min: f64, max: f64, buckets: usize) {
        assert!(Histogram::new(min, max, buckets, OutOfRangePolicy::Truncate).is_err());
    }

    #[test]
    fn quantiles_use_bucket_upper_bounds() {
        let mut h = histogram(OutOfRangePolicy::Reject);
        for v in [1.0, 1.0, 3.0, 9.0] {
            assert!(h.record(v).is_ok());
        }
        assert_eq!(h.quantile(0.5), Some(2.0));
        assert_eq!(h.quantile(1.0), Some(10.0));
        assert_eq!(h.quantile(1.5), None);
    }

    #[test]
    fn payload_and_message() {
        let mut h = histogram(OutOfRangePolicy::Ignore);
        assert!(h.record(4.0).is_ok());
        assert!(h.record(-4.0).is_ok());

        let payload = h.to_payload();
        assert_eq!(payload["counts"], json!([0, 0, 1, 0, 0]));
        assert_eq!(payload["total"], 1);
        assert_eq!(payload["ignored"], 1);

        let msg = h.to_message("latency");
        assert_eq!(msg.schema.as_deref(), Some("latency"));

        h.reset();
        assert_eq!(h.total(), 0);
        assert_eq!(h.mean(), None);
    }
}

//! Offset estimation from round-trip samples.
//!
//! A single exchange yields one [`Sample`]. Each peer's samples are reduced
//! to a [`PeerEstimate`] by rejecting high-latency outliers and averaging the
//! remaining offsets; all peer estimates are then reduced to one global
//! offset by [`aggregate`].
//!
//! The offset of a single exchange follows Cristian's algorithm: assuming the
//! request and the reply took equally long, the remote clock read
//! `remote` at local time `end - round_trip / 2`.

use crate::stats;
use serde::{Deserialize, Serialize};

/// A successful round-trip measurement against one peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    /// Remote peer the exchange was performed with
    pub peer: String,
    /// Local time elapsed between sending the request and receiving the reply
    pub round_trip_ms: i64,
    /// Estimated offset of the local clock against the remote clock
    pub offset_ms: i64,
}

impl Measurement {
    /// Derive a measurement from one request/response exchange.
    ///
    /// `start` and `end` are local clock readings taken right before the
    /// request was sent and right after the reply arrived; `remote` is the
    /// time the peer reported in its reply.
    ///
    /// Returns `None` if `remote` is not a finite number, if the readings are
    /// too far apart to subtract, or if the offset does not fit an `i64`.
    #[must_use]
    pub fn from_exchange(
        peer: impl Into<String>,
        start: i64,
        end: i64,
        remote: f64,
    ) -> Option<Self> {
        if !remote.is_finite() {
            return None;
        }
        let round_trip_ms = end.checked_sub(start)?;
        #[allow(clippy::cast_precision_loss)]
        let offset = (remote - end as f64 + round_trip_ms as f64 / 2.0).trunc();
        // i64::MIN is exactly -2^63 as f64, so the valid range is [-2^63, 2^63).
        #[allow(clippy::cast_precision_loss)]
        let lower = i64::MIN as f64;
        if !offset.is_finite() || offset < lower || offset >= -lower {
            return None;
        }
        #[allow(clippy::cast_possible_truncation)]
        let offset_ms = offset as i64;
        Some(Self {
            peer: peer.into(),
            round_trip_ms,
            offset_ms,
        })
    }
}

/// Outcome of one round trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sample {
    /// The exchange completed
    Measured(Measurement),
    /// The request could not be sent or no usable reply arrived
    Failed,
}

impl Sample {
    /// The measurement, if the exchange succeeded.
    #[must_use]
    pub fn measurement(&self) -> Option<&Measurement> {
        match self {
            Self::Measured(measurement) => Some(measurement),
            Self::Failed => None,
        }
    }
}

/// Reduced offset for a single peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerEstimate {
    /// Remote peer
    pub peer: String,
    /// Mean offset of the accepted samples, `None` if nothing survived
    pub offset_ms: Option<f64>,
}

/// Reduce one peer's samples to an offset estimate.
///
/// Failed samples are dropped. Of the rest, any sample whose round trip
/// exceeds `median + std_dev` of all surviving round trips is rejected,
/// and the offsets of the accepted samples are averaged.
#[must_use]
pub fn estimate_peer(peer: impl Into<String>, samples: &[Sample]) -> PeerEstimate {
    let measured: Vec<&Measurement> = samples.iter().filter_map(Sample::measurement).collect();

    #[allow(clippy::cast_precision_loss)]
    let round_trips: Vec<f64> = measured.iter().map(|m| m.round_trip_ms as f64).collect();

    let offset_ms = stats::median(&round_trips).and_then(|median| {
        let limit = median + stats::std_dev(&round_trips);
        #[allow(clippy::cast_precision_loss)]
        let accepted: Vec<f64> = measured
            .iter()
            .filter(|m| m.round_trip_ms as f64 <= limit)
            .map(|m| m.offset_ms as f64)
            .collect();
        stats::mean(&accepted)
    });

    PeerEstimate {
        peer: peer.into(),
        offset_ms,
    }
}

/// Combine per-peer estimates into one global offset.
///
/// Peers without an estimate and non-finite estimates are ignored. Returns
/// `None` when no peer contributed, in which case the stored offset should
/// be left untouched.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn aggregate(estimates: &[PeerEstimate]) -> Option<i64> {
    let offsets: Vec<f64> = estimates
        .iter()
        .filter_map(|estimate| estimate.offset_ms)
        .filter(|offset| offset.is_finite())
        .collect();

    stats::mean(&offsets).map(|mean| mean.trunc() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn measured(round_trip_ms: i64, offset_ms: i64) -> Sample {
        Sample::Measured(Measurement {
            peer: "peer".to_string(),
            round_trip_ms,
            offset_ms,
        })
    }

    #[test]
    fn offset_from_symmetric_exchange() {
        let m = Measurement::from_exchange("a", 42, 42, 7.0).unwrap();
        assert_eq!(m.round_trip_ms, 0);
        assert_eq!(m.offset_ms, -35);

        // remote 1000 observed halfway through a 10ms round trip ending at 110
        let m = Measurement::from_exchange("a", 100, 110, 1000.0).unwrap();
        assert_eq!(m.round_trip_ms, 10);
        assert_eq!(m.offset_ms, 1000 - 110 + 5);
    }

    #[test]
    fn offset_truncates_toward_zero() {
        // -35 + 1.5 = -33.5 truncates to -33
        let m = Measurement::from_exchange("a", 39, 42, 7.0).unwrap();
        assert_eq!(m.offset_ms, -33);

        // 0.5 truncates to 0
        let m = Measurement::from_exchange("a", 0, 1, 1.0).unwrap();
        assert_eq!(m.offset_ms, 0);
    }

    #[test]
    fn non_finite_remote_time_is_rejected() {
        assert!(Measurement::from_exchange("a", 0, 0, f64::NAN).is_none());
        assert!(Measurement::from_exchange("a", 0, 0, f64::INFINITY).is_none());
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        assert!(Measurement::from_exchange("a", 0, 0, 1.0e19).is_none());
        assert!(Measurement::from_exchange("a", 0, 0, -1.0e19).is_none());
        assert!(Measurement::from_exchange("a", 0, 0, 9.3e18).is_none());

        let m = Measurement::from_exchange("a", 0, 0, 1.0e18).unwrap();
        assert_eq!(m.offset_ms, 1_000_000_000_000_000_000);
    }

    #[test]
    fn overflowing_round_trip_is_rejected() {
        assert!(Measurement::from_exchange("a", i64::MIN, i64::MAX, 0.0).is_none());
        assert!(Measurement::from_exchange("a", i64::MAX, -1, 0.0).is_none());
    }

    #[test]
    fn latency_outlier_is_excluded() {
        let samples = [
            measured(10, 5),
            measured(10, 5),
            measured(10, 5),
            measured(10, 5),
            measured(1000, 500),
        ];

        let estimate = estimate_peer("peer", &samples);
        assert_eq!(estimate.offset_ms, Some(5.0));
    }

    #[test]
    fn failed_samples_are_ignored() {
        let samples = [Sample::Failed, measured(4, -12), Sample::Failed, measured(4, -8)];

        let estimate = estimate_peer("peer", &samples);
        assert_eq!(estimate.offset_ms, Some(-10.0));
    }

    #[test]
    fn all_failed_yields_no_estimate() {
        let estimate = estimate_peer("peer", &[Sample::Failed, Sample::Failed]);
        assert_eq!(estimate.offset_ms, None);
        assert_eq!(estimate_peer("peer", &[]).offset_ms, None);
    }

    #[test]
    fn single_sample_is_kept() {
        let estimate = estimate_peer("peer", &[measured(250, 17)]);
        assert_eq!(estimate.offset_ms, Some(17.0));
    }

    #[test]
    fn aggregate_averages_and_truncates() {
        let estimates = [
            PeerEstimate {
                peer: "a".to_string(),
                offset_ms: Some(-10.0),
            },
            PeerEstimate {
                peer: "b".to_string(),
                offset_ms: Some(-5.0),
            },
        ];
        assert_eq!(aggregate(&estimates), Some(-7));
    }

    #[test]
    fn aggregate_skips_missing_and_non_finite() {
        let estimates = [
            PeerEstimate {
                peer: "a".to_string(),
                offset_ms: None,
            },
            PeerEstimate {
                peer: "b".to_string(),
                offset_ms: Some(f64::NAN),
            },
            PeerEstimate {
                peer: "c".to_string(),
                offset_ms: Some(f64::INFINITY),
            },
            PeerEstimate {
                peer: "d".to_string(),
                offset_ms: Some(12.9),
            },
        ];
        assert_eq!(aggregate(&estimates), Some(12));
    }

    #[test]
    fn aggregate_without_estimates() {
        assert_eq!(aggregate(&[]), None);
        let estimates = [PeerEstimate {
            peer: "a".to_string(),
            offset_ms: None,
        }];
        assert_eq!(aggregate(&estimates), None);
    }
}

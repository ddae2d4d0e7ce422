//! Descriptive statistics over sample sets.
//!
//! `mean` and `median` are undefined for an empty input and return `None`
//! there. `variance` is the sample variance (Bessel-corrected) and is zero
//! for fewer than two values.

/// Arithmetic mean.
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let len = values.len() as f64;
    Some(values.iter().sum::<f64>() / len)
}

/// Sample variance (squared deviation from the mean, divided by `n - 1`).
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let Some(mean) = mean(values) else {
        return 0.0;
    };
    let squares: f64 = values.iter().map(|x| (x - mean).powi(2)).sum();
    #[allow(clippy::cast_precision_loss)]
    let denominator = (values.len() - 1) as f64;
    squares / denominator
}

/// Standard deviation (square root of the sample variance).
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// Median: the middle value of the sorted input, or the average of the two
/// middle values for an even count.
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    match values.len() {
        0 => None,
        1 => Some(values[0]),
        len => {
            let mut sorted = values.to_vec();
            sorted.sort_by(f64::total_cmp);
            if len % 2 == 0 {
                Some((sorted[len / 2 - 1] + sorted[len / 2]) / 2.0)
            } else {
                Some(sorted[(len - 1) / 2])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(values: &[f64]) -> (f64, f64) {
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        (min, max)
    }

    #[test]
    fn empty_input() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert!(variance(&[]).abs() < f64::EPSILON);
        assert!(std_dev(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn mean_and_median_within_bounds() {
        let inputs: [&[f64]; 5] = [
            &[3.0],
            &[1.0, 2.0],
            &[-5.0, 10.0, 7.5, 0.0],
            &[1000.0, 10.0, 10.0, 10.0, 10.0],
            &[-1.25, -1.5, -100.0],
        ];

        for values in inputs {
            let (min, max) = bounds(values);
            let m = mean(values).unwrap();
            let md = median(values).unwrap();
            assert!(m >= min && m <= max, "mean {m} outside [{min}, {max}]");
            assert!(md >= min && md <= max, "median {md} outside [{min}, {max}]");
        }
    }

    #[test]
    fn median_odd_and_even() {
        assert_eq!(median(&[42.0]), Some(42.0));
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
        assert_eq!(median(&[10.0, 10.0, 10.0, 10.0, 1000.0]), Some(10.0));
    }

    #[test]
    fn variance_of_constant_sequence_is_zero() {
        for len in 0..8 {
            let values = vec![17.5; len];
            assert!(variance(&values).abs() < f64::EPSILON, "len {len}");
        }
    }

    #[test]
    fn variance_is_bessel_corrected() {
        // mean 5, squared deviations 9 + 1 + 1 + 9 = 20, divided by n - 1 = 3
        let values = [2.0, 4.0, 6.0, 8.0];
        assert!((variance(&values) - 20.0 / 3.0).abs() < 1e-12);
        assert!((std_dev(&values) - (20.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn single_value_has_zero_variance() {
        assert!(variance(&[99.0]).abs() < f64::EPSILON);
    }
}

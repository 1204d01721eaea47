//! Property-based tests for the indicator math.

use proptest::prelude::*;
use ultron_tools::indicators::{
    IndicatorError, PricePoint, bollinger_bands, linear_regression, moving_average,
};

fn closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(1.0f64..1000.0, 1..60)
}

fn to_series(closes: &[f64]) -> Vec<PricePoint> {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| PricePoint::close(format!("t{i}"), *c))
        .collect()
}

proptest! {
    #[test]
    fn moving_average_has_one_point_per_full_window(data in closes(), period in 1usize..70) {
        let series = to_series(&data);
        match moving_average(&series, period) {
            Ok(points) => {
                prop_assert!(period <= series.len());
                prop_assert_eq!(points.len(), series.len() - period + 1);
                prop_assert_eq!(&points[0].date, &series[period - 1].date);
                prop_assert_eq!(&points[points.len() - 1].date, &series[series.len() - 1].date);
            }
            Err(e) => {
                prop_assert!(period > series.len());
                prop_assert!(matches!(e, IndicatorError::NotEnoughData(_)));
            }
        }
    }

    #[test]
    fn moving_average_stays_within_window_bounds(data in closes(), period in 1usize..10) {
        let series = to_series(&data);
        if let Ok(points) = moving_average(&series, period) {
            for (point, window) in points.iter().zip(series.windows(period)) {
                let min = window.iter().map(|p| p.close).fold(f64::INFINITY, f64::min);
                let max = window.iter().map(|p| p.close).fold(f64::NEG_INFINITY, f64::max);
                prop_assert!(point.average >= min - 1e-9 && point.average <= max + 1e-9);
            }
        }
    }

    #[test]
    fn bollinger_bands_are_symmetric_around_middle(data in closes(), period in 1usize..10) {
        let series = to_series(&data);
        if let Ok(bands) = bollinger_bands(&series, period) {
            for band in bands {
                prop_assert!(band.lower <= band.middle && band.middle <= band.upper);
                prop_assert!(((band.upper - band.middle) - (band.middle - band.lower)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn regression_recovers_exact_lines(
        slope in -50.0f64..50.0,
        intercept in -100.0f64..100.0,
        len in 2usize..40,
    ) {
        let data: Vec<f64> = (0..len).map(|x| intercept + slope * x as f64).collect();
        let line = linear_regression(&to_series(&data)).unwrap();
        prop_assert!((line.slope - slope).abs() < 1e-6);
        prop_assert!((line.intercept - intercept).abs() < 1e-6);
    }
}

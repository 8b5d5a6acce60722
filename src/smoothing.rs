//! Causal moving-average trend line.

use std::fmt::Display;

use chrono::{Local, TimeZone};

use crate::models::{Reading, TrendPoint};

// ---

/// Default number of samples in the trailing window.
pub const DEFAULT_WINDOW: usize = 5;

/// Smooth chronologically ordered readings, labelling points in local time.
pub fn smooth(readings: &[Reading], window: usize) -> Vec<TrendPoint> {
    smooth_in(readings, window, &Local)
}

/// Smooth readings with a trailing (left-only) moving average.
///
/// Each point averages itself and up to `window - 1` predecessors; early
/// points average over fewer samples rather than padding. Labels are
/// `HH:MM` in `tz`. A zero window behaves like a window of one.
pub fn smooth_in<Tz>(readings: &[Reading], window: usize, tz: &Tz) -> Vec<TrendPoint>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    // ---
    let window = window.max(1);
    let mut points = Vec::with_capacity(readings.len());

    for (i, reading) in readings.iter().enumerate() {
        let trailing = &readings[(i + 1).saturating_sub(window)..=i];
        let sum: f64 = trailing.iter().map(|r| r.tds).sum();

        points.push(TrendPoint {
            timestamp: reading.timestamp,
            tds: reading.tds,
            smoothed_tds: (sum / trailing.len() as f64).round() as i64,
            time_label: reading
                .timestamp
                .with_timezone(tz)
                .format("%H:%M")
                .to_string(),
        });
    }
    points
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, Utc};

    fn series(values: &[f64]) -> Vec<Reading> {
        // ---
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, &tds)| Reading {
                id: i as i64 + 1,
                location_label: "Delhi".to_string(),
                tds,
                turbidity: None,
                temperature: None,
                lat: 28.6,
                lng: 77.2,
                timestamp: start + Duration::minutes(10 * i as i64),
            })
            .collect()
    }

    #[test]
    fn test_window_average() {
        // ---
        let points = smooth_in(&series(&[100.0, 200.0, 300.0, 400.0, 500.0]), 5, &Utc);
        let smoothed: Vec<i64> = points.iter().map(|p| p.smoothed_tds).collect();
        assert_eq!(smoothed, vec![100, 150, 200, 250, 300]);
    }

    #[test]
    fn test_window_slides() {
        // ---
        let points = smooth_in(&series(&[10.0, 20.0, 30.0, 40.0]), 2, &Utc);
        let smoothed: Vec<i64> = points.iter().map(|p| p.smoothed_tds).collect();
        assert_eq!(smoothed, vec![10, 15, 25, 35]);
        assert_eq!(points[3].tds, 40.0);
    }

    #[test]
    fn test_rounds_to_nearest() {
        // ---
        let points = smooth_in(&series(&[100.0, 101.0, 101.0]), 5, &Utc);
        // (100 + 101) / 2 = 100.5 rounds up; 302 / 3 = 100.67 rounds up.
        assert_eq!(points[1].smoothed_tds, 101);
        assert_eq!(points[2].smoothed_tds, 101);
    }

    #[test]
    fn test_time_labels() {
        // ---
        let points = smooth_in(&series(&[1.0, 2.0]), 5, &Utc);
        assert_eq!(points[0].time_label, "08:00");
        assert_eq!(points[1].time_label, "08:10");

        let ist = chrono::FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let points = smooth_in(&series(&[1.0]), 5, &ist);
        assert_eq!(points[0].time_label, "13:30");
    }

    #[test]
    fn test_non_negative_and_empty() {
        // ---
        assert!(smooth(&[], DEFAULT_WINDOW).is_empty());
        let points = smooth_in(&series(&[0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 0.0]), 0, &Utc);
        assert!(points.iter().all(|p| p.smoothed_tds >= 0));
        assert_eq!(points[2].smoothed_tds, 3);
    }
}

//! Nearest-N selection of readings around a user's location.
//!
//! Selection is two-phase: distance is only a filter, the returned window
//! is always in chronological order.

use crate::models::{Coordinate, Reading};

// ---

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points, in kilometers.
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    // ---
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Select the `n` readings nearest to `origin`, in chronological order.
///
/// Without an origin the first `n` readings of the corpus are used as a
/// fixed fallback region and no distances are computed.
pub fn select_nearest(origin: Option<Coordinate>, corpus: &[Reading], n: usize) -> Vec<Reading> {
    // ---
    let mut selected: Vec<Reading> = match origin {
        None => corpus.iter().take(n).cloned().collect(),
        Some(origin) => {
            let mut ranked: Vec<(f64, &Reading)> = corpus
                .iter()
                .map(|r| (haversine_km(origin, r.coordinate()), r))
                .collect();
            ranked.sort_by(|a, b| a.0.total_cmp(&b.0));
            ranked.into_iter().take(n).map(|(_, r)| r.clone()).collect()
        }
    };

    selected.sort_by_key(|r| r.timestamp);
    selected
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading(id: i64, lat: f64, lng: f64, minutes: i64) -> Reading {
        // ---
        Reading {
            id,
            location_label: format!("point-{id}"),
            tds: 200.0,
            turbidity: None,
            temperature: None,
            lat,
            lng,
            timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap()
                + Duration::minutes(minutes),
        }
    }

    #[test]
    fn test_haversine_known_distance() {
        // ---
        // Delhi to Mumbai is roughly 1148 km.
        let delhi = Coordinate::new(28.6139, 77.2090);
        let mumbai = Coordinate::new(19.0760, 72.8777);
        let d = haversine_km(delhi, mumbai);
        assert!((d - 1148.1).abs() < 1.0, "got {d}");
        assert_eq!(haversine_km(delhi, delhi), 0.0);
    }

    #[test]
    fn test_no_origin_takes_first_n_chronologically() {
        // ---
        // Timestamps deliberately descending so the final re-sort is visible.
        let corpus: Vec<Reading> = (1..=10)
            .map(|i| reading(i, 0.0, 0.0, 100 - i * 10))
            .collect();

        let selected = select_nearest(None, &corpus, 5);
        let ids: Vec<i64> = selected.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn test_origin_selects_nearest() {
        // ---
        // One degree of latitude is ~111.2 km.
        let origin = Coordinate::new(0.0, 0.0);
        let ten_km = reading(1, 10.0 / 111.2, 0.0, 30);
        let one_km = reading(2, 1.0 / 111.2, 0.0, 60);
        let hundred_km = reading(3, 100.0 / 111.2, 0.0, 0);
        let corpus = vec![ten_km, one_km, hundred_km];

        let selected = select_nearest(Some(origin), &corpus, 2);
        let ids: Vec<i64> = selected.iter().map(|r| r.id).collect();
        // Chronological: the 10 km point (t+30) precedes the 1 km point (t+60).
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_output_is_chronological() {
        // ---
        let origin = Coordinate::new(28.6, 77.2);
        let corpus = vec![
            reading(1, 28.6, 77.2, 50),
            reading(2, 28.7, 77.2, 10),
            reading(3, 28.8, 77.2, 30),
        ];
        let selected = select_nearest(Some(origin), &corpus, 3);
        assert!(selected.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_empty_inputs() {
        // ---
        assert!(select_nearest(Some(Coordinate::new(0.0, 0.0)), &[], 5).is_empty());
        assert!(select_nearest(None, &[], 5).is_empty());
        let corpus = vec![reading(1, 0.0, 0.0, 0)];
        assert!(select_nearest(None, &corpus, 0).is_empty());
        assert_eq!(select_nearest(None, &corpus, 50).len(), 1);
    }
}

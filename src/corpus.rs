//! Synthetic reading corpus and live sensor drift.
//!
//! Readings are scattered around major Indian cities at ten-minute
//! intervals. Drift never mutates its input; each tick yields a new set of
//! readings with `tds` clamped at zero.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::Rng;

use crate::models::Reading;

// ---

/// City name, latitude, longitude.
const CITIES: [(&str, f64, f64); 20] = [
    ("Delhi", 28.6139, 77.2090),
    ("Mumbai", 19.0760, 72.8777),
    ("Kolkata", 22.5726, 88.3639),
    ("Chennai", 13.0827, 80.2707),
    ("Bengaluru", 12.9716, 77.5946),
    ("Hyderabad", 17.3850, 78.4867),
    ("Jaipur", 26.9124, 75.7873),
    ("Lucknow", 26.8467, 80.9462),
    ("Ahmedabad", 23.0225, 72.5714),
    ("Pune", 18.5204, 73.8567),
    ("Bhopal", 23.2599, 77.4126),
    ("Patna", 25.5941, 85.1376),
    ("Chandigarh", 30.7333, 76.7794),
    ("Guwahati", 26.1445, 91.7362),
    ("Thiruvananthapuram", 8.5241, 76.9366),
    ("Ranchi", 23.3441, 85.3096),
    ("Bhubaneswar", 20.2961, 85.8245),
    ("Shimla", 31.1048, 77.1734),
    ("Srinagar", 34.0837, 74.7973),
    ("Indore", 22.7196, 75.8577),
];

/// Maximum coordinate jitter around a city, in degrees.
const JITTER_DEG: f64 = 0.25;

/// Spacing between consecutive synthetic readings.
const SAMPLE_INTERVAL_MINUTES: i64 = 10;

/// Largest per-tick TDS change applied by [`drift`], in ppm.
pub const DRIFT_STEP_PPM: i32 = 25;

/// Timestamp of the first synthetic reading.
pub fn corpus_start() -> DateTime<Utc> {
    // ---
    Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Generate `n` synthetic readings with ids `1..=n` in chronological order.
pub fn generate<R: Rng + ?Sized>(n: usize, rng: &mut R) -> Vec<Reading> {
    // ---
    let start = corpus_start();

    (0..n)
        .map(|i| {
            let (city, lat, lng) = CITIES[rng.gen_range(0..CITIES.len())];
            Reading {
                id: i as i64 + 1,
                location_label: city.to_string(),
                tds: f64::from(rng.gen_range(150..=900)),
                turbidity: Some(round_to(rng.gen_range(0.5..10.0), 2)),
                temperature: Some(f64::from(rng.gen_range(15..=38))),
                lat: round_to(lat + rng.gen_range(-JITTER_DEG..JITTER_DEG), 6),
                lng: round_to(lng + rng.gen_range(-JITTER_DEG..JITTER_DEG), 6),
                timestamp: start + Duration::minutes(SAMPLE_INTERVAL_MINUTES * i as i64),
            }
        })
        .collect()
}

/// Perturb every reading by up to ±[`DRIFT_STEP_PPM`], never below zero.
pub fn drift<R: Rng + ?Sized>(readings: &[Reading], rng: &mut R) -> Vec<Reading> {
    // ---
    readings
        .iter()
        .map(|r| Reading {
            tds: (r.tds + f64::from(rng.gen_range(-DRIFT_STEP_PPM..DRIFT_STEP_PPM))).max(0.0),
            ..r.clone()
        })
        .collect()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    // ---
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

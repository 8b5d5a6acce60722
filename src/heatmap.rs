//! Heat layer parameters as a function of map zoom.

use crate::models::{GradientStop, HeatPoint, HeatmapRenderParams, Reading};

// ---

pub const MIN_ZOOM: u8 = 1;
pub const MAX_ZOOM: u8 = 19;

/// Intensity at which the top color stop is reached. Kept high so stacked
/// clusters do not saturate to red.
pub const MAX_INTENSITY: f64 = 800.0;

/// Keeps sparse areas visible instead of fully transparent.
pub const MIN_OPACITY: f64 = 0.15;

const MIN_RADIUS: f64 = 12.0;
const MIN_BLUR: f64 = 15.0;

const GRADIENT: [(f64, &str); 4] = [(0.3, "green"), (0.5, "yellow"), (0.7, "orange"), (0.9, "red")];

/// Rendering parameters for `zoom`, clamped to the supported zoom range.
///
/// Radius and blur grow linearly with zoom but never drop below their
/// visual minimums at low zoom.
pub fn map_params(zoom: u8) -> HeatmapRenderParams {
    // ---
    let zoom = f64::from(zoom.clamp(MIN_ZOOM, MAX_ZOOM));

    HeatmapRenderParams {
        radius: MIN_RADIUS.max(zoom * 2.0),
        blur: MIN_BLUR.max(zoom * 2.5),
        max_intensity: MAX_INTENSITY,
        min_opacity: MIN_OPACITY,
        gradient_stops: GRADIENT
            .iter()
            .map(|&(threshold, color)| GradientStop { threshold, color })
            .collect(),
    }
}

/// Weighted point cloud for the heat layer; each reading contributes its TDS.
pub fn heat_points(corpus: &[Reading]) -> Vec<HeatPoint> {
    // ---
    corpus
        .iter()
        .map(|r| HeatPoint {
            lat: r.lat,
            lng: r.lng,
            intensity: r.tds,
        })
        .collect()
}

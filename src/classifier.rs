//! Deterministic TDS tiering.
//!
//! Tiers are finer-grained than the three displayed safety labels so the
//! advisory copy can vary by severity while the badge collapses to
//! Safe/Risk/Unsafe. Very low TDS is its own Risk tier (remineralization),
//! distinct from the high-TDS contamination tiers.

use crate::models::{SafetyAssessment, SafetyScore};

// ---

/// One TDS range and its fixed advisory template.
#[derive(Debug)]
pub struct Tier {
    // ---
    /// Inclusive upper bound in ppm; `None` means unbounded.
    pub upper_ppm: Option<f64>,
    pub score: SafetyScore,
    pub recommendation: &'static str,
    summary: &'static str,
    side_effects: &'static [&'static str],
    improvement_tips: &'static [&'static str],
}

/// Tier table in ascending order; the first tier whose bound holds wins.
pub static TIERS: [Tier; 7] = [
    Tier {
        upper_ppm: Some(50.0),
        score: SafetyScore::Risk,
        recommendation: "Remineralize",
        summary: "is too low in minerals for regular drinking",
        side_effects: &[
            "Flat taste that discourages adequate hydration",
            "Low calcium and magnesium intake over time",
            "Can leach metals from pipes and storage tanks",
        ],
        improvement_tips: &[
            "Add a mineral cartridge or remineralization stage after RO",
            "Blend with a trusted higher-mineral source",
            "Check that your RO system's TDS controller is set correctly",
        ],
    },
    Tier {
        upper_ppm: Some(150.0),
        score: SafetyScore::Safe,
        recommendation: "Drink Directly",
        summary: "is within the ideal range for drinking water",
        side_effects: &["None expected at this level"],
        improvement_tips: &[
            "Keep storage containers clean and covered",
            "Clean overhead tanks every six months",
        ],
    },
    Tier {
        upper_ppm: Some(250.0),
        score: SafetyScore::Safe,
        recommendation: "Drink Directly",
        summary: "is good quality with a healthy mineral balance",
        side_effects: &["None expected at this level"],
        improvement_tips: &[
            "Keep storage containers clean and covered",
            "Re-test after heavy rain or supply changes",
        ],
    },
    Tier {
        upper_ppm: Some(300.0),
        score: SafetyScore::Safe,
        recommendation: "Acceptable",
        summary: "is acceptable but nearing the upper limit for taste",
        side_effects: &[
            "Slightly salty or bitter taste",
            "Minor scaling in kettles and geysers",
        ],
        improvement_tips: &[
            "A carbon filter can improve taste",
            "Monitor readings weekly for upward trends",
        ],
    },
    Tier {
        upper_ppm: Some(500.0),
        score: SafetyScore::Risk,
        recommendation: "Filter",
        summary: "exceeds the recommended limit and should be filtered",
        side_effects: &[
            "Stomach discomfort for sensitive individuals",
            "Noticeable scaling on utensils and fixtures",
            "Possible presence of dissolved contaminants",
        ],
        improvement_tips: &[
            "Use an RO or UV+UF purifier before drinking",
            "Boil water if no filter is available",
            "Replace purifier cartridges on schedule",
        ],
    },
    Tier {
        upper_ppm: Some(1200.0),
        score: SafetyScore::Unsafe,
        recommendation: "Avoid / Treat Heavily",
        summary: "is unsafe without heavy treatment",
        side_effects: &[
            "Stomach upset and digestive problems",
            "Mineral buildup that can contribute to kidney stones",
            "High risk of heavy metal or nitrate contamination",
        ],
        improvement_tips: &[
            "Use a multi-stage RO purifier only",
            "Switch to packaged or tanker water for drinking",
            "Report the source to your local water authority",
        ],
    },
    Tier {
        upper_ppm: None,
        score: SafetyScore::Unsafe,
        recommendation: "Do Not Drink",
        summary: "is far above safe limits and must not be consumed",
        side_effects: &[
            "Severe gastrointestinal illness",
            "Long-term kidney and cardiovascular strain",
            "Likely industrial or sewage contamination",
        ],
        improvement_tips: &[
            "Do not drink or cook with this water",
            "Use certified bottled water until the source is cleared",
            "Alert neighbours and the municipal water board",
        ],
    },
];

/// Find the tier for a TDS value.
///
/// Negative and NaN inputs are treated as 0 so the lookup is total.
pub fn tier_for(tds: f64) -> &'static Tier {
    // ---
    let tds = sanitize(tds);
    TIERS
        .iter()
        .find(|tier| tier.upper_ppm.map_or(true, |upper| tds <= upper))
        .unwrap_or(&TIERS[TIERS.len() - 1])
}

/// Classify a TDS reading into its deterministic baseline assessment.
///
/// This is the system of record for water safety; the external advisor can
/// only enrich the prose around it.
pub fn classify(tds: f64) -> SafetyAssessment {
    // ---
    let tds = sanitize(tds);
    let tier = tier_for(tds);

    SafetyAssessment {
        score: tier.score,
        tds_level: tds,
        recommendation: tier.recommendation.to_string(),
        explanation: format!("A TDS reading of {tds} ppm {}.", tier.summary),
        side_effects: tier.side_effects.iter().map(|s| s.to_string()).collect(),
        improvement_tips: tier
            .improvement_tips
            .iter()
            .map(|s| s.to_string())
            .collect(),
    }
}

fn sanitize(tds: f64) -> f64 {
    // ---
    if tds.is_nan() || tds < 0.0 {
        0.0
    } else {
        tds
    }
}

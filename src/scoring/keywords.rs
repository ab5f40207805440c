//! Keyword heuristic for meal health scores.
//!
//! A description starts at the neutral 0.5 and moves 0.1 per matched keyword,
//! then gets personalized: the deviation from neutral is scaled by the
//! profile's sensitivity multiplier and nudged by risk-gated contextual
//! adjustments, and the result is clamped to [0, 1].

use lazy_static::lazy_static;

use crate::profile::{RiskLevel, UserHealthProfile};
use crate::scoring::Scorer;

lazy_static! {
    static ref HEALTHY_KEYWORDS: Vec<&'static str> = vec![
        "salad", "avocado", "vegetable", "veggie", "fruit", "grilled", "steamed",
        "baked", "salmon", "quinoa", "broccoli", "spinach", "kale", "lentil",
        "tofu", "yogurt", "oatmeal", "smoothie", "beans", "apple", "berries",
        // specific nut names: "nuts" would substring-match "donuts"
        "whole grain", "almond", "walnut",
    ];
    static ref UNHEALTHY_KEYWORDS: Vec<&'static str> = vec![
        "fried", "pizza", "burger", "soda", "candy", "cake", "chips", "fries",
        "donut", "cookie", "ice cream", "bacon", "hot dog", "milkshake",
        "chocolate", "pastry", "sausage", "nuggets",
    ];
    static ref FRIED_FOOD_KEYWORDS: Vec<&'static str> =
        vec!["fried", "fries", "tempura", "battered", "crispy", "nuggets"];
}

fn contains_any(description: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| description.contains(k))
}

/// Unclamped keyword score: 0.5 plus 0.1 per healthy keyword found, minus 0.1
/// per unhealthy keyword. Each keyword counts once, matched case-insensitively
/// as a substring.
pub fn base_score(description: &str) -> f64 {
    let lowered = description.to_lowercase();
    let mut score = 0.5;
    for keyword in HEALTHY_KEYWORDS.iter() {
        if lowered.contains(keyword) {
            score += 0.1;
        }
    }
    for keyword in UNHEALTHY_KEYWORDS.iter() {
        if lowered.contains(keyword) {
            score -= 0.1;
        }
    }
    score
}

/// Personalized score in [0, 1]. Without a profile the base score is simply
/// clamped; with one, the deviation from neutral is scaled by the sensitivity
/// multiplier and contextual fried-food/healthy adjustments are applied,
/// gated by risk level.
pub fn personalized_score(description: &str, profile: Option<&UserHealthProfile>) -> f64 {
    let base = base_score(description);
    let Some(profile) = profile else {
        return base.clamp(0.0, 1.0);
    };

    let deviation = base - 0.5;
    let mut adjusted = 0.5 + deviation * profile.sensitivity_multiplier;

    let lowered = description.to_lowercase();
    if contains_any(&lowered, &FRIED_FOOD_KEYWORDS) {
        adjusted -= match profile.risk_level {
            RiskLevel::High => 0.15,
            RiskLevel::Medium => 0.08,
            RiskLevel::Low => 0.0,
        };
    }
    if contains_any(&lowered, &HEALTHY_KEYWORDS) {
        adjusted += match profile.risk_level {
            RiskLevel::High => 0.1,
            RiskLevel::Medium => 0.05,
            RiskLevel::Low => 0.0,
        };
    }

    adjusted.clamp(0.0, 1.0)
}

/// Mean of `personalized_score` over the items; 0.5 for an empty list.
pub fn aggregate_score(items: &[String], profile: Option<&UserHealthProfile>) -> f64 {
    if items.is_empty() {
        return 0.5;
    }
    let sum: f64 = items
        .iter()
        .map(|item| personalized_score(item, profile))
        .sum();
    sum / items.len() as f64
}

/// Local keyword scorer. `personalization` is the external toggle from
/// config; when off, profiles are ignored entirely.
#[derive(Debug, Clone)]
pub struct HeuristicScorer {
    personalization: bool,
}

impl HeuristicScorer {
    pub fn new(personalization: bool) -> Self {
        Self { personalization }
    }
}

impl Default for HeuristicScorer {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Scorer for HeuristicScorer {
    fn score(&self, description: &str, profile: Option<&UserHealthProfile>) -> f64 {
        let profile = if self.personalization { profile } else { None };
        personalized_score(description, profile)
    }
}

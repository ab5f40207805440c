//! Derived physiological profile: BMI, BMR (Mifflin-St Jeor), TDEE, a coarse
//! risk level and a scoring sensitivity multiplier.
//!
//! The profile is never persisted; it is recomputed on demand from raw stored
//! metrics. Missing or invalid metrics degrade to "no profile" rather than an
//! error, and everything downstream skips personalization.

use serde::{Deserialize, Serialize};

const LBS_PER_KG: f64 = 0.453592;
const CM_PER_INCH: f64 = 2.54;

/// Default sedentary activity factor for TDEE.
pub const DEFAULT_ACTIVITY_LEVEL: f64 = 1.2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitSystem {
    Metric,
    Imperial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
    Unspecified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BmiCategory {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserHealthProfile {
    pub age: u32,
    pub bmi: f64,
    pub bmi_category: BmiCategory,
    pub bmr: f64,
    pub tdee: f64,
    pub risk_level: RiskLevel,
    pub sensitivity_multiplier: f64,
}

/// Opaque key-value source of raw user metrics.
///
/// Keys: `height`, `weight`, `age` (numeric strings), `gender` and
/// `unit_system` (int enums).
pub trait MetricsSource {
    fn get(&self, key: &str) -> Option<String>;
}

impl MetricsSource for std::collections::HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        std::collections::HashMap::get(self, key).cloned()
    }
}

/// Returns 0.0 for non-positive height or weight (invalid-input sentinel).
pub fn calculate_bmi(height: f64, weight: f64, unit_system: UnitSystem) -> f64 {
    if height <= 0.0 || weight <= 0.0 {
        return 0.0;
    }
    match unit_system {
        UnitSystem::Metric => {
            let meters = height / 100.0;
            weight / (meters * meters)
        }
        UnitSystem::Imperial => (weight / (height * height)) * 703.0,
    }
}

pub fn bmi_category(bmi: f64) -> BmiCategory {
    if bmi < 18.5 {
        BmiCategory::Underweight
    } else if bmi < 25.0 {
        BmiCategory::Normal
    } else if bmi < 30.0 {
        BmiCategory::Overweight
    } else {
        BmiCategory::Obese
    }
}

/// Mifflin-St Jeor. Imperial inputs are converted to kg/cm first.
pub fn calculate_bmr(
    weight: f64,
    height: f64,
    age: u32,
    gender: Gender,
    unit_system: UnitSystem,
) -> f64 {
    let (kg, cm) = match unit_system {
        UnitSystem::Metric => (weight, height),
        UnitSystem::Imperial => (weight * LBS_PER_KG, height * CM_PER_INCH),
    };
    let gender_term = match gender {
        Gender::Male => 5.0,
        Gender::Female => -161.0,
        Gender::Unspecified => -78.0,
    };
    10.0 * kg + 6.25 * cm - 5.0 * f64::from(age) + gender_term
}

pub fn calculate_tdee(bmr: f64, activity_level: f64) -> f64 {
    bmr * activity_level
}

/// Scalar in [0.5, 1.5] that amplifies how strongly a score deviates from
/// neutral. BMI and age each contribute at most one bracket, highest first.
pub fn sensitivity_multiplier(bmi: f64, age: u32) -> f64 {
    let mut multiplier: f64 = 1.0;

    if bmi >= 30.0 {
        multiplier += 0.3;
    } else if bmi >= 25.0 {
        multiplier += 0.15;
    }

    if age >= 60 {
        multiplier += 0.2;
    } else if age >= 50 {
        multiplier += 0.15;
    } else if age >= 40 {
        multiplier += 0.1;
    }

    multiplier.clamp(0.5, 1.5)
}

pub fn risk_level(bmi: f64, age: u32) -> RiskLevel {
    let category = bmi_category(bmi);
    match category {
        BmiCategory::Obese => RiskLevel::High,
        BmiCategory::Overweight if age >= 50 => RiskLevel::High,
        BmiCategory::Overweight => RiskLevel::Medium,
        BmiCategory::Normal if age >= 65 => RiskLevel::Medium,
        _ => RiskLevel::Low,
    }
}

/// Builds the full derived profile, or None when height/weight/age are
/// missing, non-numeric, or non-positive.
pub fn build_profile(metrics: &dyn MetricsSource) -> Option<UserHealthProfile> {
    let height = parse_positive(metrics.get("height")?)?;
    let weight = parse_positive(metrics.get("weight")?)?;
    let age_raw = metrics.get("age")?.trim().parse::<f64>().ok()?;
    if age_raw <= 0.0 {
        return None;
    }
    let age = age_raw as u32;

    let unit_system = match metrics.get("unit_system").and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(0) | None => UnitSystem::Metric,
        Some(_) => UnitSystem::Imperial,
    };
    let gender = match metrics.get("gender").and_then(|v| v.trim().parse::<i64>().ok()) {
        Some(0) => Gender::Male,
        Some(1) => Gender::Female,
        _ => Gender::Unspecified,
    };

    let bmi = calculate_bmi(height, weight, unit_system);
    let bmr = calculate_bmr(weight, height, age, gender, unit_system);

    Some(UserHealthProfile {
        age,
        bmi,
        bmi_category: bmi_category(bmi),
        bmr,
        tdee: calculate_tdee(bmr, DEFAULT_ACTIVITY_LEVEL),
        risk_level: risk_level(bmi, age),
        sensitivity_multiplier: sensitivity_multiplier(bmi, age),
    })
}

fn parse_positive(raw: String) -> Option<f64> {
    let value = raw.trim().parse::<f64>().ok()?;
    if value > 0.0 {
        Some(value)
    } else {
        None
    }
}

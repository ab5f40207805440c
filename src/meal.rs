use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
    Snacks,
    Drinks,
}

/// One logged meal in the current day's working set.
///
/// `health_score` is recomputed whenever `items` change: synchronously by the
/// keyword heuristic, then possibly overwritten by an async refinement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealEntry {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub meal_type: MealType,
    pub items: Vec<String>,
    pub health_score: f64,
}

impl MealEntry {
    pub fn new(meal_type: MealType, items: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: OffsetDateTime::now_utc(),
            meal_type,
            items,
            health_score: 0.5,
        }
    }

    /// Joined description used as scorer input.
    pub fn description(&self) -> String {
        self.items.join(", ")
    }
}

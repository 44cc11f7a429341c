//! Restaurant documents seeded into the test database.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::DateTime;
use serde::{Deserialize, Deserializer, Serialize};

/// Collection the seeder imports restaurants into.
pub const RESTAURANTS_COLLECTION: &str = "restaurants";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub address: Address,
    pub borough: String,
    pub cuisine: String,
    #[serde(default)]
    pub grades: Vec<Grade>,
    pub name: String,
    /// Business key used for point lookups
    pub restaurant_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub building: String,
    /// Longitude, latitude
    pub coord: Vec<f64>,
    pub street: String,
    pub zipcode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub date: DateTime,
    pub grade: String,
    #[serde(default, deserialize_with = "integral_score")]
    pub score: Option<i32>,
}

/// Scores arrive as int32, int64 or double depending on the import tool.
fn integral_score<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Score {
        Int(i64),
        Float(f64),
    }

    match Option::<Score>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Score::Int(n)) => i32::try_from(n).map(Some).map_err(serde::de::Error::custom),
        Some(Score::Float(f)) if f.fract() == 0.0 && f.abs() <= f64::from(i32::MAX) => {
            Ok(Some(f as i32))
        }
        Some(Score::Float(f)) => Err(serde::de::Error::custom(format!(
            "score {} is not an integer",
            f
        ))),
    }
}

#[cfg(test)]
#[path = "restaurant_tests.rs"]
mod tests;

#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Difficulty tier of a problem. Drives the experience award on acceptance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::None)")
)]
pub enum Difficulty {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Easy"))]
    Easy,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Medium"))]
    Medium,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "Hard"))]
    Hard,
}

impl Difficulty {
    /// Base experience points awarded for an accepted solution at this tier.
    pub fn experience_points(&self) -> i32 {
        match self {
            Self::Easy => 10,
            Self::Medium => 20,
            Self::Hard => 30,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDifficultyError(String);

impl fmt::Display for ParseDifficultyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid difficulty '{}'. Valid values: Easy, Medium, Hard", self.0)
    }
}

impl std::error::Error for ParseDifficultyError {}

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Easy" => Ok(Self::Easy),
            "Medium" => Ok(Self::Medium),
            "Hard" => Ok(Self::Hard),
            other => Err(ParseDifficultyError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_experience_points() {
        assert_eq!(Difficulty::Easy.experience_points(), 10);
        assert_eq!(Difficulty::Medium.experience_points(), 20);
        assert_eq!(Difficulty::Hard.experience_points(), 30);
    }

    #[test]
    fn test_parse() {
        assert_eq!("Hard".parse::<Difficulty>().unwrap(), Difficulty::Hard);
        assert!("hardest".parse::<Difficulty>().is_err());
    }
}

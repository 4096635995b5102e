//! Deployment environment tag carried by every record

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Environment {
    #[default]
    #[serde(rename = "local")]
    Local = 0,
    #[serde(rename = "dev", alias = "development")]
    Development = 1,
    #[serde(rename = "test", alias = "testing")]
    Testing = 2,
    #[serde(rename = "prod", alias = "production")]
    Production = 3,
}

impl Environment {
    pub fn to_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Development => "dev",
            Environment::Testing => "test",
            Environment::Production => "prod",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Environment::Local),
            "dev" | "development" => Ok(Environment::Development),
            "test" | "testing" => Ok(Environment::Testing),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(format!("Invalid environment: '{}'", s)),
        }
    }
}

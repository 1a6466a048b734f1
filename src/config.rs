use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_name() -> String {
    "unnamed-scenario".to_string()
}

fn default_days() -> u32 {
    90
}

fn default_seed() -> u64 {
    42
}

fn default_pollinators() -> f64 {
    120.0
}

fn default_pests() -> f64 {
    80.0
}

fn default_crop_health() -> f64 {
    0.7
}

fn default_soil_moisture() -> f64 {
    0.6
}

fn default_weather_volatility() -> f64 {
    0.35
}

fn default_watering_budget() -> f64 {
    0.4
}

fn default_pesticide_cap() -> f64 {
    0.5
}

fn default_corridor_investment() -> f64 {
    0.3
}

fn default_migration_rate() -> f64 {
    0.05
}

fn default_moisture_retention() -> f64 {
    1.0
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("scenario io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("scenario parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("scenario parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("scenario validation error: {0}")]
    Validation(String),
}

/// The three intervention levers, each a fraction in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterventionPolicy {
    #[serde(default = "default_watering_budget")]
    pub watering_budget: f64,
    #[serde(default = "default_pesticide_cap")]
    pub pesticide_cap: f64,
    #[serde(default = "default_corridor_investment")]
    pub corridor_investment: f64,
}

impl InterventionPolicy {
    pub fn new(watering_budget: f64, pesticide_cap: f64, corridor_investment: f64) -> Self {
        Self {
            watering_budget,
            pesticide_cap,
            corridor_investment,
        }
    }
}

impl Default for InterventionPolicy {
    fn default() -> Self {
        Self::new(
            default_watering_budget(),
            default_pesticide_cap(),
            default_corridor_investment(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NeighborhoodConfig {
    /// Empty names are replaced with `n{index + 1}` during normalization.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub weather_modifier: f64,
    #[serde(default = "default_moisture_retention")]
    pub moisture_retention: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_pollinators: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_pests: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_crop_health: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_soil_moisture: Option<f64>,
}

impl NeighborhoodConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            weather_modifier: 0.0,
            moisture_retention: default_moisture_retention(),
            initial_pollinators: None,
            initial_pests: None,
            initial_crop_health: None,
            initial_soil_moisture: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpatialConfig {
    #[serde(default = "default_migration_rate")]
    pub migration_rate: f64,
    #[serde(default)]
    pub neighborhoods: Vec<NeighborhoodConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_pollinators")]
    pub initial_pollinators: f64,
    #[serde(default = "default_pests")]
    pub initial_pests: f64,
    #[serde(default = "default_crop_health")]
    pub initial_crop_health: f64,
    #[serde(default = "default_soil_moisture")]
    pub initial_soil_moisture: f64,
    #[serde(default = "default_weather_volatility")]
    pub weather_volatility: f64,
    #[serde(default)]
    pub policy: InterventionPolicy,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spatial: Option<SpatialConfig>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            days: default_days(),
            seed: default_seed(),
            initial_pollinators: default_pollinators(),
            initial_pests: default_pests(),
            initial_crop_health: default_crop_health(),
            initial_soil_moisture: default_soil_moisture(),
            weather_volatility: default_weather_volatility(),
            policy: InterventionPolicy::default(),
            spatial: None,
        }
    }
}

impl ScenarioConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: ScenarioConfig = serde_json::from_str(text)?;
        config.normalized()
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: ScenarioConfig = serde_yaml::from_str(text)?;
        config.normalized()
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let config: ScenarioConfig = serde_json::from_value(value)?;
        config.normalized()
    }

    /// Fills positional neighborhood names, then validates.
    pub fn normalized(mut self) -> Result<Self, ConfigError> {
        if let Some(spatial) = self.spatial.as_mut() {
            for (index, neighborhood) in spatial.neighborhoods.iter_mut().enumerate() {
                if neighborhood.name.trim().is_empty() {
                    neighborhood.name = format!("n{}", index + 1);
                }
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days == 0 {
            return Err(ConfigError::Validation("days must be > 0".into()));
        }

        check_ratio("initialCropHealth", self.initial_crop_health)?;
        check_ratio("initialSoilMoisture", self.initial_soil_moisture)?;
        check_ratio("weatherVolatility", self.weather_volatility)?;
        check_ratio("wateringBudget", self.policy.watering_budget)?;
        check_ratio("pesticideCap", self.policy.pesticide_cap)?;
        check_ratio("corridorInvestment", self.policy.corridor_investment)?;
        check_finite("initialPollinators", self.initial_pollinators)?;
        check_finite("initialPests", self.initial_pests)?;

        if let Some(spatial) = &self.spatial {
            check_ratio("migrationRate", spatial.migration_rate)?;
            if spatial.neighborhoods.len() < 2 {
                return Err(ConfigError::Validation(
                    "spatial.neighborhoods must include at least 2 neighborhoods".into(),
                ));
            }
            for neighborhood in &spatial.neighborhoods {
                check_finite("weatherModifier", neighborhood.weather_modifier)?;
                check_finite("moistureRetention", neighborhood.moisture_retention)?;
                if let Some(value) = neighborhood.initial_crop_health {
                    check_ratio("initialCropHealth", value)?;
                }
                if let Some(value) = neighborhood.initial_soil_moisture {
                    check_ratio("initialSoilMoisture", value)?;
                }
                if let Some(value) = neighborhood.initial_pollinators {
                    check_finite("initialPollinators", value)?;
                }
                if let Some(value) = neighborhood.initial_pests {
                    check_finite("initialPests", value)?;
                }
            }
        }

        Ok(())
    }

    /// Copy of this scenario with a different policy, name, and seed.
    pub fn derive(&self, name: String, seed: u64, policy: InterventionPolicy) -> Self {
        Self {
            name,
            seed,
            policy,
            ..self.clone()
        }
    }
}

fn check_ratio(field: &str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{field} must be in [0,1]")))
    }
}

fn check_finite(field: &str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{field} must be a finite number")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let config = ScenarioConfig::from_json_str(r#"{ "name": "bare" }"#).unwrap();
        assert_eq!(config.name, "bare");
        assert_eq!(config.days, 90);
        assert_eq!(config.seed, 42);
        assert_eq!(config.initial_pollinators, 120.0);
        assert_eq!(config.policy, InterventionPolicy::new(0.4, 0.5, 0.3));
        assert!(config.spatial.is_none());
    }

    #[test]
    fn test_rejects_out_of_range_ratio() {
        let err = ScenarioConfig::from_json_str(r#"{ "policy": { "pesticideCap": 1.5 } }"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("pesticideCap")));
    }

    #[test]
    fn test_rejects_zero_days() {
        let err = ScenarioConfig::from_json_str(r#"{ "days": 0 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_rejects_single_neighborhood() {
        let err = ScenarioConfig::from_json_str(
            r#"{ "spatial": { "neighborhoods": [ { "name": "solo" } ] } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref msg) if msg.contains("at least 2")));
    }

    #[test]
    fn test_neighborhood_defaults_and_names() {
        let config = ScenarioConfig::from_json_str(
            r#"{ "spatial": { "neighborhoods": [ {}, { "name": "south", "moistureRetention": 0.9 } ] } }"#,
        )
        .unwrap();
        let spatial = config.spatial.unwrap();
        assert_eq!(spatial.migration_rate, 0.05);
        assert_eq!(spatial.neighborhoods[0].name, "n1");
        assert_eq!(spatial.neighborhoods[0].moisture_retention, 1.0);
        assert_eq!(spatial.neighborhoods[1].name, "south");
        assert_eq!(spatial.neighborhoods[1].moisture_retention, 0.9);
    }

    #[test]
    fn test_yaml_document_parses() {
        let yaml = "name: yaml-run\ndays: 10\npolicy:\n  wateringBudget: 0.8\n";
        let config = ScenarioConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.days, 10);
        assert_eq!(config.policy.watering_budget, 0.8);
        assert_eq!(config.policy.pesticide_cap, 0.5);
    }

    #[test]
    fn test_derive_keeps_everything_else() {
        let base = ScenarioConfig::default();
        let derived = base.derive("x".into(), 7, InterventionPolicy::new(0.1, 0.2, 0.3));
        assert_eq!(derived.days, base.days);
        assert_eq!(derived.weather_volatility, base.weather_volatility);
        assert_eq!(derived.seed, 7);
        assert_eq!(derived.name, "x");
    }
}

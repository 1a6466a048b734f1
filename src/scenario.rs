use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::config::{ConfigError, ScenarioConfig};

/// Resolves scenario files relative to a base directory and picks the
/// document format from the extension (`.yaml`/`.yml`, anything else is JSON).
pub struct ScenarioLoader {
    base_dir: PathBuf,
}

impl ScenarioLoader {
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    pub fn load(&self, file: impl AsRef<Path>) -> Result<ScenarioConfig, ConfigError> {
        let path = self.base_dir.join(file);
        let data = fs::read_to_string(&path)?;
        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        );
        let scenario = if is_yaml {
            ScenarioConfig::from_yaml_str(&data)?
        } else {
            ScenarioConfig::from_json_str(&data)?
        };
        tracing::debug!(path = %path.display(), scenario = %scenario.name, "loaded scenario");
        Ok(scenario)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loads_json_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("plot.json"),
            r#"{ "name": "plot", "days": 12, "seed": 3 }"#,
        )
        .unwrap();
        let scenario = ScenarioLoader::new(dir.path()).load("plot.json").unwrap();
        assert_eq!(scenario.name, "plot");
        assert_eq!(scenario.days, 12);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ScenarioLoader::new(dir.path()).load("nope.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}

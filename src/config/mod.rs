//! Configuration loading and validation

mod schema;

pub use schema::*;

use anyhow::Result;
use std::path::Path;

/// Load configuration from a YAML file
pub fn load_config(path: &Path) -> Result<CoildriveConfig> {
    let contents = std::fs::read_to_string(path)?;
    let config: CoildriveConfig = serde_yaml::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_config() {
        let yaml = r#"
output:
  device: null
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.output.sample_rate, 8000);
        assert_eq!(config.output.chunk_size, 200);
        assert_eq!(config.defaults.zcoeff, 0.653);
    }

    #[test]
    fn test_load_rejects_uneven_chunking() {
        let yaml = r#"
output:
  device: null
  sample_rate: 8000
  chunk_size: 333
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn test_load_named_device() {
        let yaml = r#"
output:
  device: "coil-rig"
  sample_rate: 10000
  chunk_size: 100
defaults:
  frequency: 10
  camber: 0
"#;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.output.device.as_deref(), Some("coil-rig"));
        assert_eq!(config.defaults.frequency, 10.0);
        assert_eq!(config.defaults.camber, 0.0);
    }
}

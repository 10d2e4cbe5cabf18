//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn sections(&self) -> Vec<String> {
        let mut sections = self.config.sections();
        sections.sort();
        sections
    }

    fn keys(&self, section: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .config
            .get_map_ref()
            .get(&section.to_lowercase())
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn from_string_parses_config() {
        let content = r#"
[windows]
premdisc = 126

[universe]
file = universes/core.csv
"#;
        let adapter = FileConfigAdapter::from_string(content).unwrap();
        assert_eq!(
            adapter.get_string("windows", "premdisc"),
            Some("126".to_string())
        );
        assert_eq!(
            adapter.get_string("universe", "file"),
            Some("universes/core.csv".to_string())
        );
    }

    #[test]
    fn get_string_returns_none_for_missing_key() {
        let adapter = FileConfigAdapter::from_string("[risk]\nmax_weight = 0.08\n").unwrap();
        assert_eq!(adapter.get_string("risk", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
    }

    #[test]
    fn sections_and_keys_are_listed() {
        let adapter = FileConfigAdapter::from_string(
            "[weights]\npremdisc = 0.35\nvolume = 0.25\n\n[risk]\nmax_weight = 0.1\n",
        )
        .unwrap();
        assert_eq!(adapter.sections(), vec!["risk", "weights"]);
        assert_eq!(adapter.keys("weights"), vec!["premdisc", "volume"]);
        assert!(adapter.keys("costs").is_empty());
    }

    #[test]
    fn keys_are_case_insensitive() {
        let adapter = FileConfigAdapter::from_string("[Risk]\nMax_Weight = 0.1\n").unwrap();
        assert_eq!(adapter.keys("RISK"), vec!["max_weight"]);
        assert_eq!(adapter.get_string("risk", "max_weight"), Some("0.1".into()));
    }

    #[test]
    fn from_file_reads_config() {
        let file = create_temp_config("[reporting]\nout_dir = /tmp/reports\n");
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("reporting", "out_dir"),
            Some("/tmp/reports".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        let result = FileConfigAdapter::from_file("/nonexistent/path/config.ini");
        assert!(result.is_err());
    }
}

//! Pipeline Configuration Module
//! Enumerates the fetch manifest and the output locations explicitly,
//! so no module carries hardcoded paths or load-time side effects.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Cache file names for the five source datasets.
pub const CONFIRMED_FILE: &str = "time_series_covid19_confirmed_global.csv";
pub const DEATHS_FILE: &str = "time_series_covid19_deaths_global.csv";
pub const RECOVERED_FILE: &str = "time_series_covid19_recovered_global.csv";
pub const PANEL_FILE: &str = "owid-covid-data.csv";
pub const POLICY_FILE: &str = "OxCGRT_latest.csv";

/// One remote dataset and its local cache location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSource {
    pub name: String,
    pub url: String,
    pub path: PathBuf,
}

/// Explicit configuration for a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory holding the downloaded source CSVs.
    pub data_dir: PathBuf,
    /// Directory receiving the rendered chart images.
    pub output_dir: PathBuf,
    /// Path of the merged dataset artifact.
    pub merged_path: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("."),
            output_dir: PathBuf::from("visualization"),
            merged_path: PathBuf::from("merged_covid_dataset.csv"),
        }
    }
}

impl PipelineConfig {
    /// The fixed manifest of the five remote resources.
    pub fn sources(&self) -> Vec<DatasetSource> {
        let entries = [
            (
                "Johns Hopkins Confirmed",
                "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_confirmed_global.csv",
                CONFIRMED_FILE,
            ),
            (
                "Johns Hopkins Deaths",
                "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_deaths_global.csv",
                DEATHS_FILE,
            ),
            (
                "Johns Hopkins Recovered",
                "https://raw.githubusercontent.com/CSSEGISandData/COVID-19/master/csse_covid_19_data/csse_covid_19_time_series/time_series_covid19_recovered_global.csv",
                RECOVERED_FILE,
            ),
            (
                "OWID",
                "https://covid.ourworldindata.org/data/owid-covid-data.csv",
                PANEL_FILE,
            ),
            (
                "Oxford Policy",
                "https://raw.githubusercontent.com/OxCGRT/covid-policy-tracker/master/data/OxCGRT_latest.csv",
                POLICY_FILE,
            ),
        ];

        entries
            .iter()
            .map(|(name, url, file)| DatasetSource {
                name: name.to_string(),
                url: url.to_string(),
                path: self.data_dir.join(file),
            })
            .collect()
    }

    pub fn confirmed_path(&self) -> PathBuf {
        self.data_dir.join(CONFIRMED_FILE)
    }

    pub fn deaths_path(&self) -> PathBuf {
        self.data_dir.join(DEATHS_FILE)
    }

    pub fn recovered_path(&self) -> PathBuf {
        self.data_dir.join(RECOVERED_FILE)
    }

    pub fn panel_path(&self) -> PathBuf {
        self.data_dir.join(PANEL_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn manifest_has_five_distinct_entries() {
        let config = PipelineConfig::default();
        let sources = config.sources();
        assert_eq!(sources.len(), 5, "The manifest should list five datasets");

        let paths: HashSet<_> = sources.iter().map(|s| s.path.clone()).collect();
        assert_eq!(paths.len(), 5, "Cache paths should not collide");

        let urls: HashSet<_> = sources.iter().map(|s| s.url.clone()).collect();
        assert_eq!(urls.len(), 5, "URLs should not collide");
    }

    #[test]
    fn cache_paths_live_under_data_dir() {
        let config = PipelineConfig {
            data_dir: PathBuf::from("/tmp/covid"),
            ..Default::default()
        };
        for source in config.sources() {
            assert!(
                source.path.starts_with("/tmp/covid"),
                "{} should be cached under the data dir",
                source.name
            );
        }
        assert!(config.panel_path().starts_with("/tmp/covid"));
    }
}

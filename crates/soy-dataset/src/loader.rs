//! Dataset loading from the remote endpoint with a local fallback.
//!
//! The remote copy is tried first. Any failure there (connection error,
//! timeout, non-2xx status) falls back to the local file. Only when both fail
//! does loading fail, with [`Error::DataUnavailable`].

use soy_core::{DatasetConfig, Error, LabeledSample, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::preprocess::{parse_records, retain_top_classes, ParseOptions};

/// Where a dataset body came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Remote(String),
    Local(PathBuf),
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Remote(url) => write!(f, "remote {url}"),
            DataSource::Local(path) => write!(f, "local file {}", path.display()),
        }
    }
}

/// Cleaned samples plus provenance
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub samples: Vec<LabeledSample>,
    pub source: DataSource,
    /// Rows dropped during cleaning
    pub dropped_rows: usize,
}

/// Loads the labelled soybean dataset
pub struct DatasetLoader {
    config: DatasetConfig,
    client: reqwest::blocking::Client,
}

impl DatasetLoader {
    /// Creates a loader with an HTTP client bounded by the configured timeout
    pub fn new(config: DatasetConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &DatasetConfig {
        &self.config
    }

    /// Fetches, cleans and filters the dataset.
    pub fn load(&self) -> Result<Vec<LabeledSample>> {
        Ok(self.load_with_source()?.samples)
    }

    /// Like [`DatasetLoader::load`] but also reports where the data came from.
    pub fn load_with_source(&self) -> Result<LoadedDataset> {
        let (body, source) = self.fetch_body()?;

        let options = ParseOptions {
            label_column: self.config.label_column,
            missing_marker: self.config.missing_marker.clone(),
        };
        let parsed = parse_records(&body, &options);
        info!("Rows after cleaning: {}", parsed.samples.len());

        let samples = retain_top_classes(parsed.samples, self.config.top_classes);
        if samples.is_empty() {
            return Err(Error::Dataset(format!(
                "no usable rows in dataset from {source}"
            )));
        }

        Ok(LoadedDataset {
            samples,
            source,
            dropped_rows: parsed.dropped.len(),
        })
    }

    /// Raw body from the first source that answers
    fn fetch_body(&self) -> Result<(String, DataSource)> {
        let remote_error = match &self.config.remote_url {
            Some(url) => match self.fetch_remote(url) {
                Ok(body) => {
                    info!("Dataset loaded from {}", url);
                    if self.config.cache_remote {
                        self.write_cache(&body);
                    }
                    return Ok((body, DataSource::Remote(url.clone())));
                }
                Err(e) => {
                    warn!("Remote dataset unavailable ({}), trying local copy", e);
                    e.to_string()
                }
            },
            None => "no remote source configured".to_string(),
        };

        match read_local(&self.config.local_path) {
            Ok(body) => {
                info!("Dataset loaded from {}", self.config.local_path.display());
                Ok((body, DataSource::Local(self.config.local_path.clone())))
            }
            Err(e) => Err(Error::DataUnavailable {
                remote: remote_error,
                local: e.to_string(),
            }),
        }
    }

    fn fetch_remote(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send()?;
        let status = response.status();

        if !status.is_success() {
            return Err(Error::Http(format!("{url} returned status {status}")));
        }

        Ok(response.text()?)
    }

    fn write_cache(&self, body: &str) {
        let path = &self.config.local_path;
        let result = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(path, body));

        if let Err(e) = result {
            warn!("Failed to cache dataset at {}: {}", path.display(), e);
        }
    }
}

fn read_local(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(Error::Dataset(format!(
            "local dataset not found: {}",
            path.display()
        )));
    }
    Ok(fs::read_to_string(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use soy_core::NUM_SYMPTOM_FIELDS;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::TempDir;

    fn dataset_body() -> String {
        let mut lines = Vec::new();
        for (label, value, count) in [("D1", "0", 3), ("D2", "1", 3), ("D3", "2", 2), ("D4", "3", 2), ("D5", "4", 1)] {
            for _ in 0..count {
                let symptoms = vec![value; NUM_SYMPTOM_FIELDS].join(",");
                lines.push(format!("{symptoms},{label}"));
            }
        }
        lines.join("\n")
    }

    /// Serves exactly one request with the given status line and body.
    fn one_shot_server(status: &'static str, body: String) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        format!("http://{addr}/soybean-small.data")
    }

    fn config_for(url: Option<String>, local_path: PathBuf) -> DatasetConfig {
        DatasetConfig {
            remote_url: url,
            local_path,
            timeout_secs: 5,
            cache_remote: false,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn test_remote_500_falls_back_to_local_file() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("soybean-small.data");
        fs::write(&local, dataset_body()).unwrap();

        let url = one_shot_server("500 Internal Server Error", "boom".to_string());
        let loader = DatasetLoader::new(config_for(Some(url), local.clone())).unwrap();

        let loaded = loader.load_with_source().unwrap();
        assert_eq!(loaded.source, DataSource::Local(local));
        // D5 is outside the four most frequent classes
        assert_eq!(loaded.samples.len(), 10);
        assert!(loaded.samples.iter().all(|s| s.label != "D5"));
    }

    #[test]
    fn test_remote_success_is_used_and_cached() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("cache").join("soybean-small.data");

        let url = one_shot_server("200 OK", dataset_body());
        let mut config = config_for(Some(url.clone()), local.clone());
        config.cache_remote = true;
        let loader = DatasetLoader::new(config).unwrap();

        let loaded = loader.load_with_source().unwrap();
        assert_eq!(loaded.source, DataSource::Remote(url));
        assert_eq!(loaded.samples.len(), 10);
        assert_eq!(fs::read_to_string(&local).unwrap(), dataset_body());
    }

    #[test]
    fn test_unreachable_remote_falls_back() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("soybean-small.data");
        fs::write(&local, dataset_body()).unwrap();

        // Bind then drop so the port is closed
        let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
        let url = format!("http://127.0.0.1:{port}/data");

        let loader = DatasetLoader::new(config_for(Some(url), local)).unwrap();
        assert_eq!(loader.load().unwrap().len(), 10);
    }

    #[test]
    fn test_both_sources_failing_is_data_unavailable() {
        let temp_dir = TempDir::new().unwrap();
        let url = one_shot_server("503 Service Unavailable", String::new());
        let loader =
            DatasetLoader::new(config_for(Some(url), temp_dir.path().join("missing.data"))).unwrap();

        let err = loader.load().unwrap_err();
        assert!(matches!(err, Error::DataUnavailable { .. }));
    }

    #[test]
    fn test_local_only_config() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("soybean-small.data");
        fs::write(&local, dataset_body()).unwrap();

        let loader = DatasetLoader::new(DatasetConfig::local_only(&local)).unwrap();
        let loaded = loader.load_with_source().unwrap();
        assert_eq!(loaded.source, DataSource::Local(local));
        assert_eq!(loaded.dropped_rows, 0);
    }

    #[test]
    fn test_only_dirty_rows_is_dataset_error() {
        let temp_dir = TempDir::new().unwrap();
        let local = temp_dir.path().join("dirty.data");
        fs::write(&local, "?,?,?\n1,2\n").unwrap();

        let loader = DatasetLoader::new(DatasetConfig::local_only(&local)).unwrap();
        assert!(matches!(loader.load(), Err(Error::Dataset(_))));
    }
}

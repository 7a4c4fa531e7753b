//! Output formatting and management

pub mod progress;

use crate::scanner::ScanResults;
use crate::utils::targets::{TargetIndex, NO_NAME_SENTINEL};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Structured output record: one per discovered (ip, host, port) tuple.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRecord {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    pub port: u16,
}

/// Output configuration
#[derive(Debug, Clone, Default)]
pub struct OutputConfig {
    pub json: bool,
    pub file: Option<PathBuf>,
}

/// Writes results to the console stream and, when configured, to a file.
pub struct OutputManager {
    config: OutputConfig,
}

impl OutputManager {
    pub fn new(config: OutputConfig) -> Self {
        Self { config }
    }

    /// Emit all results. File-side failures are logged and never roll back
    /// what already went to the stream.
    pub fn write_results(&self, results: &ScanResults, targets: &TargetIndex) -> io::Result<()> {
        let mut file = match self.open_output_file() {
            Ok(file) => file,
            Err(e) => {
                log::error!("could not create output file: {}", e);
                None
            }
        };

        for (ip, ports) in results.snapshot() {
            let names = targets.fqdn_of(ip);
            if names.is_empty() {
                log::debug!("skipping {}: name lookup returned nothing", ip);
                continue;
            }

            for name in names {
                let host = if name == NO_NAME_SENTINEL {
                    ip.to_string()
                } else {
                    name
                };
                log::info!("Found {} ports on host {} ({})", ports.len(), host, ip);

                for &port in &ports {
                    let line = if self.config.json {
                        let record = JsonRecord {
                            ip: ip.to_string(),
                            host: (host != ip.to_string()).then(|| host.clone()),
                            port,
                        };
                        match serde_json::to_string(&record) {
                            Ok(line) => line,
                            Err(e) => {
                                log::error!("could not serialize record for {}: {}", ip, e);
                                continue;
                            }
                        }
                    } else {
                        format!("{}:{}", host, port)
                    };

                    println!("{}", line);

                    if let Some(file) = file.as_mut() {
                        if let Err(e) = writeln!(file, "{}", line) {
                            log::error!("could not write results for {}: {}", host, e);
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Final output path: `.json` appended in structured mode when missing.
    pub fn effective_path(&self, path: &Path) -> PathBuf {
        let display = path.to_string_lossy();
        if self.config.json && !display.ends_with(".json") {
            PathBuf::from(format!("{}.json", display))
        } else {
            path.to_path_buf()
        }
    }

    fn open_output_file(&self) -> io::Result<Option<File>> {
        let Some(path) = &self.config.file else {
            return Ok(None);
        };
        let path = self.effective_path(path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                create_private_dir(parent)?;
            }
        }

        File::create(&path).map(Some)
    }
}

/// Create missing output directories with owner-only permissions.
#[cfg(unix)]
fn create_private_dir(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(0o700).create(path)
}

#[cfg(not(unix))]
fn create_private_dir(path: &Path) -> io::Result<()> {
    std::fs::create_dir_all(path)
}

//! JSON model configuration I/O.

use crate::sim::energy::ModelConfig;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Writes a model configuration to a JSON file.
///
/// # Example
/// ```no_run
/// use thermozone::io::{read_config, write_config};
/// use std::path::Path;
///
/// let cfg = read_config(Path::new("models/office.json")).unwrap();
/// write_config(Path::new("copy.json"), &cfg).unwrap();
/// ```
pub fn write_config(path: &Path, config: &ModelConfig) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create file: {}", path.display()))?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, config)
        .with_context(|| format!("Failed to serialize model to: {}", path.display()))?;

    Ok(())
}

/// Reads a model configuration from a JSON file.
///
/// Only the document structure is checked here; call
/// [`ModelConfig::build`] to validate values and references.
pub fn read_config(path: &Path) -> Result<ModelConfig> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open file: {}", path.display()))?;
    let reader = BufReader::new(file);

    let config: ModelConfig = serde_json::from_reader(reader)
        .with_context(|| format!("Failed to parse model config: {}", path.display()))?;

    Ok(config)
}

pub fn config_from_str(json: &str) -> Result<ModelConfig> {
    serde_json::from_str(json).context("Failed to parse model config")
}

pub fn config_to_string(config: &ModelConfig) -> Result<String> {
    serde_json::to_string_pretty(config).context("Failed to serialize model config")
}

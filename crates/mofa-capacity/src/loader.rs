//! Request file loading
//!
//! Pipeline requests can be written in YAML, TOML, JSON, JSON5, INI or RON.
//! The format is detected from the file extension, `${VAR}` / `$VAR`
//! references are substituted from the environment before parsing, and
//! `MOFA_CAPACITY_*` environment variables override file values.

use crate::config::PipelineRequest;
use crate::error::{CapacityError, CapacityResult};
use config::{Config as Cfg, Environment, File, FileFormat};
use regex::{Captures, Regex};
use std::path::Path;
use std::sync::OnceLock;

/// Prefix of environment variables that override request fields
pub const ENV_PREFIX: &str = "MOFA_CAPACITY";

/// Detect the request format from a file extension
pub fn detect_format(path: &Path) -> CapacityResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| CapacityError::Config("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "ini" => Ok(FileFormat::Ini),
        "ron" => Ok(FileFormat::Ron),
        "json5" => Ok(FileFormat::Json5),
        _ => Err(CapacityError::Config(format!("Unsupported format: {ext}"))),
    }
}

fn braced_var() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid regex"))
}

fn bare_var() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("valid regex"))
}

/// Substitute `${VAR}` and `$VAR` references. Unset variables are left as-is.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = braced_var().replace_all(content, lookup_var);
    bare_var().replace_all(&braced, lookup_var).into_owned()
}

fn lookup_var(caps: &Captures<'_>) -> String {
    std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
}

/// Parse a request from a string in the given format.
pub fn request_from_str(content: &str, format: FileFormat) -> CapacityResult<PipelineRequest> {
    let substituted = substitute_env_vars(content);
    let request: PipelineRequest = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .build()
        .map_err(|e| CapacityError::Config(e.to_string()))?
        .try_deserialize()
        .map_err(|e| CapacityError::Config(e.to_string()))?;
    request.validate()?;
    Ok(request)
}

/// Load a request file, applying `MOFA_CAPACITY_*` environment overrides.
pub fn load_request(path: impl AsRef<Path>) -> CapacityResult<PipelineRequest> {
    let path = path.as_ref();
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)
        .map_err(|e| CapacityError::Config(format!("{}: {e}", path.display())))?;
    let substituted = substitute_env_vars(&content);

    let request: PipelineRequest = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .map_err(|e| CapacityError::Config(e.to_string()))?
        .try_deserialize()
        .map_err(|e| CapacityError::Config(e.to_string()))?;

    tracing::debug!(path = %path.display(), architecture = %request.architecture, "loaded request");
    request.validate()?;
    Ok(request)
}

// ============================================================================
// Tests
// ============================================================================

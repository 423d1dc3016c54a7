//! Layered runtime settings.
//!
//! Settings are assembled from defaults, then `SITEWATCH_*` environment
//! variables, then CLI flags, each layer overriding the previous. There is
//! no configuration file.
//!
//! Environment variables use double underscores to separate nested levels:
//! - `SITEWATCH_BUILDER__COMMAND=mdbook` sets `builder.command`
//! - `SITEWATCH_HTTP__CACHE_MAX_AGE=0` sets `http.cache_max_age`

use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Root of the source tree to watch and build.
    #[serde(default = "default_source_root")]
    pub source_root: PathBuf,

    /// HTTP listen port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// External builder invocation.
    #[serde(default)]
    pub builder: BuilderConfig,

    /// Watch filtering.
    #[serde(default)]
    pub watch: WatchConfig,

    /// HTTP serving knobs.
    #[serde(default)]
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct BuilderConfig {
    /// External builder command, invoked as `<command> init` and
    /// `<command> build` with the source root as working directory.
    #[serde(default = "default_builder_command")]
    pub command: String,

    /// Table-of-contents file whose change re-scaffolds the project before
    /// the regular build.
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// Relative location of the builder's output tree under the source root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct WatchConfig {
    /// Names that never get watched and never trigger rebuilds, compared
    /// case-insensitively against the final path component.
    #[serde(default = "default_ignore_names")]
    pub ignore_names: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    /// Relative location of the served tree under the source root.
    #[serde(default = "default_served_dir")]
    pub served_dir: String,

    /// Client-side cache lifetime in seconds for served responses.
    #[serde(default = "default_cache_max_age")]
    pub cache_max_age: u64,
}

// Default value functions
fn default_source_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_port() -> u16 {
    4000
}
fn default_builder_command() -> String {
    "gitbook".to_string()
}
fn default_manifest() -> String {
    "SUMMARY.md".to_string()
}
fn default_output_dir() -> String {
    "_book".to_string()
}
fn default_ignore_names() -> Vec<String> {
    vec!["node_modules".to_string(), "_book".to_string()]
}
fn default_served_dir() -> String {
    ".website".to_string()
}
fn default_cache_max_age() -> u64 {
    60
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source_root: default_source_root(),
            port: default_port(),
            builder: BuilderConfig::default(),
            watch: WatchConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            command: default_builder_command(),
            manifest: default_manifest(),
            output_dir: default_output_dir(),
        }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            ignore_names: default_ignore_names(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            served_dir: default_served_dir(),
            cache_max_age: default_cache_max_age(),
        }
    }
}

impl Settings {
    /// Load settings from defaults and environment.
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            // Double underscore becomes a nesting dot, single underscores
            // stay part of the field name.
            .merge(Env::prefixed("SITEWATCH_").map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Apply CLI overrides. Flags take precedence over every other layer.
    pub fn with_cli(mut self, path: PathBuf, port: u16) -> Self {
        self.source_root = path;
        self.port = port;
        self
    }

    /// Directory whose contents the HTTP layer exposes.
    pub fn served_root(&self) -> PathBuf {
        self.source_root.join(&self.http.served_dir)
    }

    /// Directory where the builder leaves its output tree.
    pub fn build_output(&self) -> PathBuf {
        self.source_root.join(&self.builder.output_dir)
    }

    /// Listen address for the HTTP server.
    pub fn bind_addr(&self) -> String {
        format!("0.0.0.0:{}", self.port)
    }
}

impl WatchConfig {
    /// Directory filter: hidden and underscore-prefixed names plus the
    /// configured ignore names never enter the watch set.
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        name.starts_with('.') || name.starts_with('_') || self.matches_ignore(name)
    }

    /// File filter: hidden files and configured ignore names never trigger
    /// rebuilds.
    pub fn is_ignored_file(&self, name: &str) -> bool {
        name.starts_with('.') || self.matches_ignore(name)
    }

    fn matches_ignore(&self, name: &str) -> bool {
        self.ignore_names.iter().any(|n| n.eq_ignore_ascii_case(name))
    }
}

use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub app: AppConfig,
  /// Origin the worker fronts, e.g. "https://study.example.com"
  pub upstream: String,
  /// App-shell paths precached at install time
  #[serde(default = "default_shell_assets")]
  pub shell_assets: Vec<String>,
  #[serde(default)]
  pub runtime_cache: RuntimeCacheConfig,
  /// Document served to offline navigations
  #[serde(default = "default_fallback_path")]
  pub fallback_path: String,
  /// URL schemes the interceptor never touches
  #[serde(default = "default_excluded_schemes")]
  pub excluded_schemes: Vec<String>,
  #[serde(default)]
  pub push: PushConfig,
  /// Background sync tags the worker accepts
  #[serde(default = "default_sync_tags")]
  pub sync_tags: Vec<String>,
  /// Cache database location (defaults to the platform data dir)
  pub store_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Short app identifier used as the cache name prefix
  pub name: String,
  /// Deployed version; bumping it starts a new cache generation
  pub version: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeCacheConfig {
  /// Path patterns (anchored regexes) eligible for runtime caching
  #[serde(default = "default_runtime_patterns")]
  pub patterns: Vec<String>,
  /// Any path containing this segment is also eligible
  #[serde(default = "default_static_marker")]
  pub static_marker: String,
}

impl Default for RuntimeCacheConfig {
  fn default() -> Self {
    Self {
      patterns: default_runtime_patterns(),
      static_marker: default_static_marker(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PushConfig {
  #[serde(default = "default_push_title")]
  pub title: String,
  #[serde(default = "default_push_body")]
  pub body: String,
  #[serde(default = "default_push_icon")]
  pub icon: String,
  #[serde(default = "default_push_badge")]
  pub badge: String,
  #[serde(default = "default_push_tag")]
  pub tag: String,
  #[serde(default)]
  pub require_interaction: bool,
  /// Where a notification click takes the user
  #[serde(default = "default_fallback_path")]
  pub url: String,
}

impl Default for PushConfig {
  fn default() -> Self {
    Self {
      title: default_push_title(),
      body: default_push_body(),
      icon: default_push_icon(),
      badge: default_push_badge(),
      tag: default_push_tag(),
      require_interaction: false,
      url: default_fallback_path(),
    }
  }
}

fn default_shell_assets() -> Vec<String> {
  ["/", "/manifest.json", "/favicon.ico"]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_runtime_patterns() -> Vec<String> {
  [
    r"^/static/js/.+\.js$",
    r"^/static/css/.+\.css$",
    r"^/static/media/.+\.(png|jpg|jpeg|svg|gif|webp)$",
  ]
  .into_iter()
  .map(String::from)
  .collect()
}

fn default_static_marker() -> String {
  "/static/".to_string()
}

fn default_fallback_path() -> String {
  "/".to_string()
}

fn default_excluded_schemes() -> Vec<String> {
  vec!["chrome-extension".to_string()]
}

fn default_sync_tags() -> Vec<String> {
  vec!["sync-study-progress".to_string()]
}

fn default_push_title() -> String {
  "Study reminder".to_string()
}

fn default_push_body() -> String {
  "Time for your study session!".to_string()
}

fn default_push_icon() -> String {
  "/icons/icon-192x192.png".to_string()
}

fn default_push_badge() -> String {
  "/icons/icon-72x72.png".to_string()
}

fn default_push_tag() -> String {
  "study-reminder".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shellcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shellcache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/shellcache/config.yaml\n\
                 See config.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shellcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shellcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    config.validate()?;
    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    Url::parse(&self.upstream)
      .map_err(|e| eyre!("Invalid upstream origin '{}': {}", self.upstream, e))?;
    if self.app.name.is_empty() || self.app.version.is_empty() {
      return Err(eyre!("app.name and app.version must not be empty"));
    }
    Ok(())
  }

  /// Resolve a path or absolute URL against the upstream origin.
  pub fn resolve(&self, path_or_url: &str) -> Result<String> {
    if Url::parse(path_or_url).is_ok() {
      return Ok(path_or_url.to_string());
    }
    let base = Url::parse(&self.upstream)
      .map_err(|e| eyre!("Invalid upstream origin '{}': {}", self.upstream, e))?;
    let joined = base
      .join(path_or_url)
      .map_err(|e| eyre!("Cannot resolve '{}' against upstream: {}", path_or_url, e))?;
    Ok(joined.to_string())
  }
}

/// The two current cache-generation identifiers.
///
/// Built once at startup from the configured app name and version; every
/// other generation found in storage is stale and gets purged on activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
  pub static_cache: String,
  pub runtime_cache: String,
}

impl CacheNames {
  pub fn new(app: &AppConfig) -> Self {
    Self {
      static_cache: format!("{}-v{}", app.name, app.version),
      runtime_cache: format!("{}-runtime-v{}", app.name, app.version),
    }
  }

  /// Whether `name` is one of the two current generations.
  pub fn is_current(&self, name: &str) -> bool {
    name == self.static_cache || name == self.runtime_cache
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn test_config() -> Config {
    serde_yaml::from_str(
      r#"
app:
  name: lsat-study-tool
  version: 1.0.0
upstream: https://study.example.com
"#,
    )
    .unwrap()
  }

  #[test]
  fn test_cache_names() {
    let names = CacheNames::new(&AppConfig {
      name: "lsat-study-tool".to_string(),
      version: "1.0.0".to_string(),
    });
    assert_eq!(names.static_cache, "lsat-study-tool-v1.0.0");
    assert_eq!(names.runtime_cache, "lsat-study-tool-runtime-v1.0.0");
    assert!(names.is_current("lsat-study-tool-v1.0.0"));
    assert!(names.is_current("lsat-study-tool-runtime-v1.0.0"));
    assert!(!names.is_current("lsat-study-tool-v0.9.0"));
  }

  #[test]
  fn test_defaults_applied() {
    let config = test_config();
    assert_eq!(config.fallback_path, "/");
    assert_eq!(config.excluded_schemes, vec!["chrome-extension"]);
    assert_eq!(config.sync_tags, vec!["sync-study-progress"]);
    assert_eq!(config.runtime_cache.static_marker, "/static/");
    assert_eq!(config.runtime_cache.patterns.len(), 3);
    assert!(config.shell_assets.contains(&"/".to_string()));
  }

  #[test]
  fn test_resolve_path_against_upstream() {
    let config = test_config();
    assert_eq!(
      config.resolve("/manifest.json").unwrap(),
      "https://study.example.com/manifest.json"
    );
    // Absolute URLs pass through untouched
    assert_eq!(
      config.resolve("https://cdn.example.com/lib.js").unwrap(),
      "https://cdn.example.com/lib.js"
    );
  }

  #[test]
  fn test_invalid_upstream_rejected() {
    let config: Config = serde_yaml::from_str(
      r#"
app:
  name: x
  version: "1"
upstream: "not a url"
"#,
    )
    .unwrap();
    assert!(config.validate().is_err());
  }
}

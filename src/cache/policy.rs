//! Runtime cache admission rules.
//!
//! A response found on the network is only worth keeping if its URL looks
//! like a build artifact (bundled script, stylesheet, media) or lives under
//! the static asset tree. The rules are plain data and the decision is a
//! pure function of the URL.

use color_eyre::{eyre::eyre, Result};
use regex::Regex;
use url::Url;

use crate::config::RuntimeCacheConfig;

/// A single admission rule, evaluated against the URL path.
#[derive(Debug)]
pub enum MatchRule {
  /// Anchored regex over the path
  Pattern(Regex),
  /// Path contains this segment
  PathMarker(String),
}

impl MatchRule {
  fn matches(&self, path: &str) -> bool {
    match self {
      MatchRule::Pattern(re) => re.is_match(path),
      MatchRule::PathMarker(marker) => path.contains(marker),
    }
  }
}

/// Ordered rule set deciding which URLs are runtime-cacheable.
#[derive(Debug)]
pub struct RuntimePolicy {
  rules: Vec<MatchRule>,
}

impl RuntimePolicy {
  /// Compile the configured pattern list. Pattern order is preserved; the
  /// static-path marker is appended as the final rule.
  pub fn from_config(config: &RuntimeCacheConfig) -> Result<Self> {
    let mut rules = Vec::with_capacity(config.patterns.len() + 1);
    for pattern in &config.patterns {
      let re = Regex::new(pattern)
        .map_err(|e| eyre!("Invalid runtime cache pattern '{}': {}", pattern, e))?;
      rules.push(MatchRule::Pattern(re));
    }
    if !config.static_marker.is_empty() {
      rules.push(MatchRule::PathMarker(config.static_marker.clone()));
    }
    Ok(Self { rules })
  }

  /// Whether a successful response for `url` should enter the runtime cache.
  pub fn cacheable(&self, url: &str) -> bool {
    let parsed = Url::parse(url);
    let path = match &parsed {
      Ok(u) => u.path(),
      // Unparseable URLs are matched as-is
      Err(_) => url,
    };
    self.rules.iter().any(|rule| rule.matches(path))
  }
}

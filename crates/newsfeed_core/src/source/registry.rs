//! Immutable, ordered registry of feed sources.

use crate::config::SourceConfig;
use reqwest::Url;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One syndication source polled by every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    name: String,
    endpoint: Url,
}

impl FeedSource {
    /// Display label, unique inside one registry.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

/// Source registration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    InvalidName(String),
    DuplicateName(String),
    InvalidEndpoint { name: String, endpoint: String },
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidName(value) => write!(f, "feed source name is invalid: `{value}`"),
            Self::DuplicateName(value) => write!(f, "feed source already registered: {value}"),
            Self::InvalidEndpoint { name, endpoint } => write!(
                f,
                "feed source `{name}` has an invalid endpoint `{endpoint}`; expected an absolute http(s) URL"
            ),
        }
    }
}

impl Error for RegistryError {}

/// Ordered set of feed sources fixed for the process lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRegistry {
    sources: Vec<FeedSource>,
}

impl SourceRegistry {
    /// Builds a registry, keeping input order.
    pub fn from_sources<'a>(
        configs: impl IntoIterator<Item = &'a SourceConfig>,
    ) -> Result<Self, RegistryError> {
        let mut seen = BTreeSet::new();
        let mut sources = Vec::new();

        for config in configs {
            let name = config.name.trim();
            if name.is_empty() {
                return Err(RegistryError::InvalidName(config.name.clone()));
            }
            if !seen.insert(name.to_string()) {
                return Err(RegistryError::DuplicateName(name.to_string()));
            }

            let endpoint = parse_endpoint(config.endpoint.trim()).ok_or_else(|| {
                RegistryError::InvalidEndpoint {
                    name: name.to_string(),
                    endpoint: config.endpoint.clone(),
                }
            })?;

            sources.push(FeedSource {
                name: name.to_string(),
                endpoint,
            });
        }

        Ok(Self { sources })
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeedSource> {
        self.sources.iter()
    }

    /// Returns one source by exact name.
    pub fn get(&self, name: &str) -> Option<&FeedSource> {
        self.sources.iter().find(|source| source.name == name)
    }

    /// Returns source names in registry order.
    pub fn names(&self) -> Vec<String> {
        self.sources
            .iter()
            .map(|source| source.name.clone())
            .collect()
    }
}

fn parse_endpoint(raw: &str) -> Option<Url> {
    let url = Url::parse(raw).ok()?;
    match url.scheme() {
        "http" | "https" if url.has_host() => Some(url),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{RegistryError, SourceRegistry};
    use crate::config::{EngineConfig, SourceConfig};

    #[test]
    fn default_sources_build_in_order() {
        let config = EngineConfig::default();
        let registry = SourceRegistry::from_sources(&config.sources).unwrap();
        assert_eq!(registry.len(), 7);
        assert_eq!(registry.names()[0], "Genbeta");
        assert_eq!(registry.names()[6], "MuyLinux");
        assert!(registry.get("DesdeLinux").is_some());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let sources = vec![
            SourceConfig::new("A", "https://a.example/feed"),
            SourceConfig::new(" A ", "https://b.example/feed"),
        ];
        let err = SourceRegistry::from_sources(&sources).unwrap_err();
        assert_eq!(err, RegistryError::DuplicateName("A".to_string()));
    }

    #[test]
    fn non_http_endpoints_are_rejected() {
        let sources = vec![SourceConfig::new("Files", "file:///tmp/feed.xml")];
        let err = SourceRegistry::from_sources(&sources).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidEndpoint { .. }));

        let sources = vec![SourceConfig::new("Relative", "/feed")];
        assert!(SourceRegistry::from_sources(&sources).is_err());
    }

    #[test]
    fn blank_name_is_rejected() {
        let sources = vec![SourceConfig::new("   ", "https://a.example/feed")];
        let err = SourceRegistry::from_sources(&sources).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidName(_)));
    }

    #[test]
    fn empty_registry_is_valid() {
        let registry = SourceRegistry::from_sources(Vec::<SourceConfig>::new().iter()).unwrap();
        assert!(registry.is_empty());
    }
}

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Per-host crawl overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    /// CSS selector tried before any built-in selector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_selector: Option<String>,
    /// Extra URL patterns appended to the default skip list.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_patterns: Vec<String>,
    /// Replaces the global depth bound for this host.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    /// Only persist pages that have a native markdown counterpart.
    #[serde(default)]
    pub prefer_markdown: bool,
}

/// Site configs keyed by hostname.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SiteConfigs {
    sites: HashMap<String, SiteConfig>,
}

impl SiteConfigs {
    /// Reads a JSON config file, or YAML when the extension says so.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("read site config: {}", path.display()))?;

        let is_yaml = matches!(
            path.extension().and_then(|ext| ext.to_str()),
            Some("yaml" | "yml")
        );
        let configs = if is_yaml {
            serde_yaml::from_str(&contents)
                .with_context(|| format!("parse site config yaml: {}", path.display()))?
        } else {
            serde_json::from_str(&contents)
                .with_context(|| format!("parse site config json: {}", path.display()))?
        };

        Ok(configs)
    }

    pub fn get(&self, host: &str) -> SiteConfig {
        self.sites.get(host).cloned().unwrap_or_default()
    }

    pub fn insert(&mut self, host: impl Into<String>, config: SiteConfig) {
        self.sites.insert(host.into(), config);
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_json() -> anyhow::Result<()> {
        let json = r#"{
            "docs.foo.com": {
                "contentSelector": ".doc-body",
                "skipPatterns": ["/changelog/"],
                "maxDepth": 1,
                "preferMarkdown": true
            },
            "bar.dev": {}
        }"#;
        let configs: SiteConfigs = serde_json::from_str(json)?;

        assert_eq!(configs.len(), 2);
        let foo = configs.get("docs.foo.com");
        assert_eq!(foo.content_selector.as_deref(), Some(".doc-body"));
        assert_eq!(foo.skip_patterns, vec!["/changelog/".to_owned()]);
        assert_eq!(foo.max_depth, Some(1));
        assert!(foo.prefer_markdown);

        assert_eq!(configs.get("bar.dev"), SiteConfig::default());
        Ok(())
    }

    #[test]
    fn unknown_host_yields_default_record() {
        let configs = SiteConfigs::default();
        assert_eq!(configs.get("nowhere.example"), SiteConfig::default());
    }

    #[test]
    fn load_reads_yaml_by_extension() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("sites.yaml");
        std::fs::write(&path, "docs.foo.com:\n  preferMarkdown: true\n  maxDepth: 4\n")?;

        let configs = SiteConfigs::load(&path)?;
        let foo = configs.get("docs.foo.com");
        assert!(foo.prefer_markdown);
        assert_eq!(foo.max_depth, Some(4));
        Ok(())
    }

    #[test]
    fn load_reports_malformed_json() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("sites.json");
        std::fs::write(&path, "{ not json")?;

        let err = SiteConfigs::load(&path).expect_err("malformed config must fail");
        assert!(format!("{err:#}").contains("parse site config json"));
        Ok(())
    }
}

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context as _;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub position: String,
    /// Path or URL of the avatar picture
    pub avatar: String,
}

/// Read-only lookup of the author profiles case studies refer to by key
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AuthorDirectory(BTreeMap<String, Author>);

pub const DEFAULT_AUTHOR: &str = "rapidxai";

impl Default for AuthorDirectory {
    fn default() -> Self {
        Self(BTreeMap::from([(
            DEFAULT_AUTHOR.to_owned(),
            Author {
                name: "RapidXAI Team".to_owned(),
                position: "AI Automation Agency".to_owned(),
                avatar: "/authors/rapidxai.png".to_owned(),
            },
        )]))
    }
}

impl AuthorDirectory {
    /// Loads a YAML mapping of author keys to profiles
    pub fn from_yaml_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read the authors file '{}'", path.display()))?;
        let directory: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("invalid authors file '{}'", path.display()))?;
        Ok(directory)
    }

    pub fn get(&self, key: &str) -> Option<&Author> {
        self.0.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

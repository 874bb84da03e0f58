use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Collection definition as declared in a `collections/*.md` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionDef {
    /// File stem; also the value matched by `#collection:<name>` tags.
    #[serde(skip_deserializing)]
    pub name: String,
    pub title: Option<String>,
    #[serde(skip_deserializing)]
    pub description: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub sort: Option<String>,
    pub group: Option<String>,
}

/// Split `---` fenced YAML from the body. Files without frontmatter yield `None`.
pub fn split_frontmatter(source: &str) -> Option<(&str, &str)> {
    let rest = source
        .strip_prefix("---\r\n")
        .or_else(|| source.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let yaml = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((yaml, body));
        }
        offset += line.len();
    }
    None
}

pub fn parse_collection(name: &str, source: &str) -> Result<CollectionDef> {
    let (yaml, body) = split_frontmatter(source).unwrap_or(("", source));

    let mut def: CollectionDef = if yaml.trim().is_empty() {
        CollectionDef::default()
    } else {
        serde_yaml::from_str(yaml)
            .with_context(|| format!("Invalid frontmatter in collection '{}'", name))?
    };
    def.name = name.to_string();
    def.description = body.trim().to_string();
    Ok(def)
}

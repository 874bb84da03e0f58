use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::assemble::Pin;
use crate::parser::frontmatter::CollectionDef;

/// Collection with its membership computed against the current pins.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCollection {
    pub name: String,
    pub title: String,
    pub description: String,
    /// Member pin ids, sorted by the collection's sort key.
    pub pins: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub groups: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PinKey {
    Title,
    Url,
    Section,
    ContentType,
    Slug,
}

impl PinKey {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "title" => Some(PinKey::Title),
            "url" => Some(PinKey::Url),
            "section" => Some(PinKey::Section),
            "contentType" | "content_type" | "type" => Some(PinKey::ContentType),
            "slug" => Some(PinKey::Slug),
            _ => None,
        }
    }

    fn value<'p>(&self, pin: &'p Pin) -> &'p str {
        match self {
            PinKey::Title => &pin.title,
            PinKey::Url => &pin.url,
            PinKey::Section => &pin.section,
            PinKey::ContentType => &pin.content_type,
            PinKey::Slug => &pin.slug,
        }
    }
}

pub fn resolve_all(defs: &[CollectionDef], pins: &[Pin]) -> Vec<ResolvedCollection> {
    defs.iter().map(|d| resolve(d, pins)).collect()
}

/// Explicit `#collection:<name>` members plus `include` matches, minus `exclude`.
pub fn resolve(def: &CollectionDef, pins: &[Pin]) -> ResolvedCollection {
    let mut members: Vec<&Pin> = pins
        .iter()
        .filter(|p| is_member(def, p))
        .collect();

    if let Some(sort) = def.sort.as_deref() {
        let (descending, name) = match sort.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, sort),
        };
        match PinKey::parse(name) {
            Some(key) => members.sort_by(|a, b| {
                let ord = compare(key.value(a), key.value(b));
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            }),
            None => warn!("Collection '{}': unknown sort key '{}'", def.name, sort),
        }
    }

    let groups = def.group.as_deref().and_then(|g| match PinKey::parse(g) {
        Some(key) => {
            let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
            for pin in &members {
                groups
                    .entry(key.value(pin).to_string())
                    .or_default()
                    .push(pin.id.clone());
            }
            Some(groups)
        }
        None => {
            warn!("Collection '{}': unknown group key '{}'", def.name, g);
            None
        }
    });

    ResolvedCollection {
        name: def.name.clone(),
        title: def.title.clone().unwrap_or_else(|| def.name.clone()),
        description: def.description.clone(),
        pins: members.iter().map(|p| p.id.clone()).collect(),
        groups,
    }
}

fn is_member(def: &CollectionDef, pin: &Pin) -> bool {
    let tags = pin.tag_set();
    if def.exclude.iter().any(|t| tags.contains(t)) {
        return false;
    }
    pin.collections.contains(&def.name) || def.include.iter().any(|t| tags.contains(t))
}

/// Case-insensitive, then exact, so the order is total and stable.
fn compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b))
}

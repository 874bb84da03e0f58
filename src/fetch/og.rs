use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use url::Url;

use crate::cache::{hostname, CachedMetadata};

static META_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<meta\b[^>]*>").unwrap());
static LINK_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<link\b[^>]*>").unwrap());
static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:-]+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>]+))"#).unwrap()
});
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());
static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

const TITLE_KEYS: &[&str] = &["og:title", "twitter:title"];
const DESCRIPTION_KEYS: &[&str] = &["og:description", "twitter:description", "description"];
const IMAGE_KEYS: &[&str] = &[
    "og:image",
    "og:image:url",
    "og:image:secure_url",
    "twitter:image",
    "twitter:image:src",
];
const SITE_KEYS: &[&str] = &["og:site_name", "application-name", "twitter:site"];
const ICON_RELS: &[&str] = &["icon", "shortcut icon", "apple-touch-icon"];

/// Pull Open Graph / Twitter / generic meta from a page.
///
/// Each field walks its fallback chain: og tag, twitter tag, generic tag.
/// Only the title falls back further, to `<title>` and then the hostname;
/// other fields stay empty when the page does not declare them.
pub fn extract(html: &str, page: &Url) -> CachedMetadata {
    let meta = meta_tags(html);
    let first = |keys: &[&str]| -> Option<String> {
        keys.iter()
            .filter_map(|k| meta.get(*k))
            .map(|v| clean_text(v))
            .find(|v| !v.is_empty())
    };

    let host = hostname(page.as_str()).unwrap_or_else(|| page.to_string());

    let title = first(TITLE_KEYS)
        .or_else(|| {
            TITLE_RE
                .captures(html)
                .map(|c| clean_text(&c[1]))
                .filter(|t| !t.is_empty())
        })
        .unwrap_or(host);

    let image_url = first(IMAGE_KEYS)
        .and_then(|img| resolve(page, &img))
        .unwrap_or_default();

    CachedMetadata {
        title,
        description: first(DESCRIPTION_KEYS).unwrap_or_default(),
        image_url,
        site_name: first(SITE_KEYS).unwrap_or_default(),
        favicon: favicon(html, page),
        fetched_at: Utc::now(),
        error: None,
    }
}

/// `property`/`name` (lowercased) → `content`, first occurrence wins.
fn meta_tags(html: &str) -> HashMap<String, String> {
    let mut tags = HashMap::new();
    for tag in META_RE.find_iter(html) {
        let attrs = attributes(tag.as_str());
        let key = attrs.get("property").or_else(|| attrs.get("name"));
        if let (Some(key), Some(content)) = (key, attrs.get("content")) {
            tags.entry(key.to_ascii_lowercase())
                .or_insert_with(|| content.clone());
        }
    }
    tags
}

fn attributes(tag: &str) -> HashMap<String, String> {
    ATTR_RE
        .captures_iter(tag)
        .map(|c| {
            let value = c
                .get(2)
                .or_else(|| c.get(3))
                .or_else(|| c.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            (c[1].to_ascii_lowercase(), value.to_string())
        })
        .collect()
}

fn favicon(html: &str, page: &Url) -> String {
    let declared = LINK_RE.find_iter(html).find_map(|tag| {
        let attrs = attributes(tag.as_str());
        let rel = attrs.get("rel")?.to_ascii_lowercase();
        if !ICON_RELS.contains(&rel.trim()) {
            return None;
        }
        resolve(page, attrs.get("href")?)
    });
    declared
        .or_else(|| page.join("/favicon.ico").ok().map(String::from))
        .unwrap_or_default()
}

fn resolve(page: &Url, href: &str) -> Option<String> {
    let href = decode_entities(href.trim());
    if href.is_empty() {
        return None;
    }
    page.join(&href).ok().map(String::from)
}

fn clean_text(s: &str) -> String {
    WS_RE.replace_all(&decode_entities(s), " ").trim().to_string()
}

/// Decode named and numeric HTML entities. Unknown names are left as written.
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY_RE
        .replace_all(s, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse().ok().and_then(char::from_u32)
            } else {
                named_entity(body)
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "ndash" => '–',
        "mdash" => '—',
        "hellip" => '…',
        "lsquo" => '‘',
        "rsquo" => '’',
        "ldquo" => '“',
        "rdquo" => '”',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "middot" => '·',
        "bull" => '•',
        _ => return None,
    })
}

// ── Tests ──

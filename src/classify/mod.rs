pub mod domains;
pub mod video;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CachedMetadata;

const COLLECTION_KEY: &str = "collection";
pub const DEFAULT_TYPE: &str = "link";
const VIDEO_CONTENT_TYPE: &str = "video";

/// Where a metadata key's values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Manual,
    Inferred,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub plain_tags: Vec<String>,
    pub collections: Vec<String>,
    pub metadata: BTreeMap<String, Vec<String>>,
    pub metadata_source: BTreeMap<String, Origin>,
}

impl Classification {
    /// First `type` value, or `link`.
    pub fn content_type(&self) -> &str {
        self.metadata
            .get("type")
            .and_then(|v| v.first())
            .map(String::as_str)
            .unwrap_or(DEFAULT_TYPE)
    }

    fn add_manual(&mut self, key: &str, value: &str) {
        push_unique(self.metadata.entry(key.to_string()).or_default(), value);
        self.metadata_source.insert(key.to_string(), Origin::Manual);
    }

    /// Inferred values never touch a key set by hand.
    fn add_inferred(&mut self, key: &str, value: &str) {
        if self.metadata_source.get(key) == Some(&Origin::Manual) {
            return;
        }
        push_unique(self.metadata.entry(key.to_string()).or_default(), value);
        self.metadata_source.insert(key.to_string(), Origin::Inferred);
    }
}

/// Split tags and infer source/type/contentType from the URL.
pub fn classify(raw_tags: &[String], url: &str, cached: Option<&CachedMetadata>) -> Classification {
    let mut c = Classification::default();

    for tag in raw_tags {
        match tag.split_once(':') {
            Some((key, value)) if !key.is_empty() && !value.is_empty() => {
                if key == COLLECTION_KEY {
                    push_unique(&mut c.collections, value);
                } else {
                    c.add_manual(key, value);
                }
            }
            _ => push_unique(&mut c.plain_tags, tag),
        }
    }

    let parsed = Url::parse(url).ok();
    let host = parsed
        .as_ref()
        .and_then(|u| u.host_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let path = parsed.as_ref().map(|u| u.path()).unwrap_or_default();
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(known) = domains::lookup(&host) {
        c.add_inferred("source", known.source);
        c.add_inferred("type", known.kind);
        // Video pages count as videos only when an id can be extracted
        let refined = domains::content_type(known.source, &host, &segments)
            .or_else(|| video::video_ref(url).map(|_| VIDEO_CONTENT_TYPE));
        if let Some(ct) = refined {
            c.add_inferred("contentType", ct);
        }
    } else if let Some(site) = cached.map(|m| m.site_name.trim()).filter(|s| !s.is_empty()) {
        c.add_inferred("source", &site_source(site));
    }

    if !c.metadata.contains_key("type") {
        if let Some(kind) = domains::extension_type(path) {
            c.add_inferred("type", kind);
        }
    }

    if !c.metadata.contains_key("type") {
        c.add_inferred("type", DEFAULT_TYPE);
    }

    c
}

/// `The Verge` → `the-verge`
fn site_source(site: &str) -> String {
    site.split_whitespace()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("-")
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn vimeo_example() {
        let c = classify(&tags(&["video", "collection:favs"]), "https://vimeo.com/123", None);
        assert_eq!(c.plain_tags, vec!["video"]);
        assert_eq!(c.collections, vec!["favs"]);
        assert!(c.metadata["type"].contains(&"video".to_string()));
        assert!(c.metadata["source"].contains(&"vimeo".to_string()));
        assert_eq!(c.metadata["contentType"], vec!["video"]);
        assert_eq!(c.content_type(), "video");
    }

    #[test]
    fn collection_never_in_tags() {
        let c = classify(&tags(&["a", "collection:x", "collection:y"]), "https://e.test", None);
        assert_eq!(c.collections, vec!["x", "y"]);
        assert!(!c.plain_tags.iter().any(|t| t.contains("collection")));
        assert!(!c.metadata.contains_key("collection"));
    }

    #[test]
    fn manual_type_wins() {
        let c = classify(&tags(&["type:podcast"]), "https://open.spotify.com/album/abc", None);
        assert_eq!(c.metadata["type"], vec!["podcast"]);
        assert_eq!(c.metadata_source["type"], Origin::Manual);
        assert_eq!(c.metadata["source"], vec!["spotify"]);
        assert_eq!(c.metadata_source["source"], Origin::Inferred);
        assert_eq!(c.metadata["contentType"], vec!["album"]);
    }

    #[test]
    fn extension_then_default() {
        let c = classify(&[], "https://files.test/talk.mp4", None);
        assert_eq!(c.metadata["type"], vec!["video"]);

        let c = classify(&[], "https://blog.test/post", None);
        assert_eq!(c.metadata["type"], vec!["link"]);
        assert_eq!(c.content_type(), "link");
        assert!(!c.metadata.contains_key("source"));
    }

    #[test]
    fn domain_type_beats_extension() {
        let c = classify(&[], "https://github.com/u/repo/archive/v1.pdf", None);
        assert_eq!(c.metadata["type"], vec!["code"]);
    }

    #[test]
    fn site_name_as_source() {
        let meta = CachedMetadata {
            site_name: "The Verge".into(),
            ..CachedMetadata::default()
        };
        let c = classify(&[], "https://www.theverge.com/a", Some(&meta));
        assert_eq!(c.metadata["source"], vec!["the-verge"]);
    }

    #[test]
    fn malformed_url_still_classified() {
        let c = classify(&tags(&["misc"]), "not a url", None);
        assert_eq!(c.plain_tags, vec!["misc"]);
        assert_eq!(c.content_type(), "link");
    }

    #[test]
    fn video_content_type_needs_an_id() {
        let url = "https://youtu.be/dQw4w9WgXcQ";
        let c = classify(&[], url, None);
        assert_eq!(c.metadata["source"], vec!["youtube"]);
        assert_eq!(c.metadata["contentType"], vec!["video"]);

        let c = classify(&[], "https://www.youtube.com/watch?v=tooshort", None);
        assert_eq!(c.metadata["type"], vec!["video"]);
        assert!(!c.metadata.contains_key("contentType"));

        let c = classify(&[], "https://www.youtube.com/shorts/dQw4w9WgXcQ", None);
        assert_eq!(c.metadata["contentType"], vec!["short"]);
    }

    #[test]
    fn classifier_and_fetcher_agree_on_ids() {
        let url = "https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=42";
        let c = classify(&[], url, None);
        assert_eq!(c.metadata["contentType"], vec!["video"]);

        let v = video::video_ref(url).unwrap();
        assert_eq!(v.id, "dQw4w9WgXcQ");
        assert_eq!(
            crate::fetch::video::thumbnail_candidates("https://i.ytimg.com/vi", &v.id)[0],
            "https://i.ytimg.com/vi/dQw4w9WgXcQ/maxresdefault.jpg"
        );
    }

    #[test]
    fn fetched_page_without_site_name_has_no_source() {
        let url = "https://blog.example.net/post";
        let page = Url::parse(url).unwrap();
        let meta = crate::fetch::og::extract("<title>A post</title>", &page);
        assert!(meta.site_name.is_empty());

        let fetched = classify(&tags(&["misc"]), url, Some(&meta));
        let offline = classify(&tags(&["misc"]), url, None);
        assert!(!fetched.metadata.contains_key("source"));
        assert_eq!(fetched, offline);
    }
}

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static MD_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\((https?://[^)\s]+)\)").unwrap());
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>()\[\]]+").unwrap());
static HASHTAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(^|\s)#([\p{L}\p{N}_][\p{L}\p{N}_\-:/.]*)").unwrap()
});
static SPACES_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").unwrap());

/// One bookmarked link as written in a pins file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawPinEntry {
    pub url: String,
    pub title: Option<String>,
    pub raw_tags: Vec<String>,
    pub notes: String,
    pub section: String,
}

/// Parse pins markdown into entries, in document order.
///
/// `default_section` labels entries that appear before the first `## ` heading.
pub fn parse_pins(markdown: &str, default_section: &str) -> Vec<RawPinEntry> {
    let lines: Vec<&str> = markdown.lines().collect();
    let mut entries = Vec::new();
    let mut section = default_section.to_string();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();

        if let Some(heading) = line.strip_prefix("## ") {
            let heading = heading.trim();
            if !heading.is_empty() {
                section = heading.to_string();
            }
            i += 1;
            continue;
        }

        if !is_list_item(line) {
            i += 1;
            continue;
        }

        let Some(mut entry) = parse_item(line, &section) else {
            i += 1;
            continue;
        };

        // Optional note line directly under the item
        if let Some(next) = lines.get(i + 1) {
            let next = next.trim();
            if is_note_line(next) {
                let (text, tags) = split_hashtags(next);
                for tag in tags {
                    push_unique(&mut entry.raw_tags, tag);
                }
                entry.notes = text;
                i += 1;
            }
        }

        entries.push(entry);
        i += 1;
    }

    entries
}

/// Label for entries above the first heading: `reading-list.md` → `Reading List`.
pub fn section_from_filename(stem: &str) -> String {
    stem.split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_list_item(line: &str) -> bool {
    line.starts_with("- ") || line.starts_with("* ")
}

fn is_note_line(line: &str) -> bool {
    (!line.is_empty() && !is_list_item(line) && !line.starts_with('#'))
        || is_note_hashtag_line(line)
}

/// `#tag #other` directly under an item is a tag-only note, not a heading.
fn is_note_hashtag_line(line: &str) -> bool {
    line.starts_with('#') && !line.starts_with("# ") && !line.starts_with("##")
}

fn parse_item(line: &str, section: &str) -> Option<RawPinEntry> {
    if !line.contains("http://") && !line.contains("https://") {
        return None;
    }

    let (url, title) = match MD_LINK_RE.captures(line) {
        Some(caps) => {
            let text = caps[1].trim();
            let title = (!text.is_empty()).then(|| text.to_string());
            (caps[2].to_string(), title)
        }
        None => {
            let url = URL_RE.find(line)?.as_str();
            (trim_url(url).to_string(), None)
        }
    };

    let (_, raw_tags) = split_hashtags(line);

    Some(RawPinEntry {
        url,
        title,
        raw_tags,
        notes: String::new(),
        section: section.to_string(),
    })
}

/// Separate `#tags` from text. Returns the remaining text and the tags in order.
fn split_hashtags(text: &str) -> (String, Vec<String>) {
    let mut tags = Vec::new();
    for caps in HASHTAG_RE.captures_iter(text) {
        let tag = caps[2].trim_end_matches(['.', ':', '/', '-']);
        if !tag.is_empty() {
            push_unique(&mut tags, tag.to_string());
        }
    }
    let stripped = HASHTAG_RE.replace_all(text, "$1");
    let cleaned = SPACES_RE.replace_all(stripped.trim(), " ").to_string();
    (cleaned, tags)
}

fn trim_url(url: &str) -> &str {
    url.trim_end_matches(['.', ',', ';', '!', '?', '"', '\''])
}

fn push_unique(tags: &mut Vec<String>, tag: String) {
    if !tags.contains(&tag) {
        tags.push(tag);
    }
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_with_tags() {
        let entries = parse_pins(
            "- [My Video](https://vimeo.com/123) #video #collection:favs",
            "Pins",
        );
        assert_eq!(entries.len(), 1);
        let e = &entries[0];
        assert_eq!(e.url, "https://vimeo.com/123");
        assert_eq!(e.title.as_deref(), Some("My Video"));
        assert_eq!(e.raw_tags, vec!["video", "collection:favs"]);
        assert!(e.notes.is_empty());
        assert_eq!(e.section, "Pins");
    }

    #[test]
    fn bare_url_and_star_bullet() {
        let entries = parse_pins("* https://example.com/post, #reading", "Pins");
        assert_eq!(entries[0].url, "https://example.com/post");
        assert_eq!(entries[0].title, None);
        assert_eq!(entries[0].raw_tags, vec!["reading"]);
    }

    #[test]
    fn url_fragment_is_not_a_tag() {
        let entries = parse_pins("- [Docs](https://example.com/page#install) #docs", "Pins");
        assert_eq!(entries[0].url, "https://example.com/page#install");
        assert_eq!(entries[0].raw_tags, vec!["docs"]);
    }

    #[test]
    fn sections_follow_headings() {
        let md = "- [A](https://a.test)\n## Music\n- [B](https://b.test)\n## Code\n- [C](https://c.test)";
        let entries = parse_pins(md, "Reading List");
        let sections: Vec<&str> = entries.iter().map(|e| e.section.as_str()).collect();
        assert_eq!(sections, vec!["Reading List", "Music", "Code"]);
    }

    #[test]
    fn note_line_merges_tags() {
        let md = "- [A](https://a.test) #one\n  Worth a reread #two #type:article\n- [B](https://b.test)";
        let entries = parse_pins(md, "Pins");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].notes, "Worth a reread");
        assert_eq!(entries[0].raw_tags, vec!["one", "two", "type:article"]);
        assert!(entries[1].notes.is_empty());
    }

    #[test]
    fn tag_only_note_line() {
        let md = "- [A](https://a.test)\n#later #collection:queue";
        let entries = parse_pins(md, "Pins");
        assert_eq!(entries[0].raw_tags, vec!["later", "collection:queue"]);
        assert!(entries[0].notes.is_empty());
    }

    #[test]
    fn heading_is_not_a_note() {
        let md = "- [A](https://a.test)\n## Next\n- [B](https://b.test)";
        let entries = parse_pins(md, "Pins");
        assert!(entries[0].notes.is_empty());
        assert_eq!(entries[1].section, "Next");
    }

    #[test]
    fn no_urls_yields_empty() {
        assert!(parse_pins("", "Pins").is_empty());
        assert!(parse_pins("# Title\n\n- just text\n* more text #tag\nparagraph", "Pins").is_empty());
    }

    #[test]
    fn deterministic_order() {
        let md = std::fs::read_to_string("tests/fixtures/reading-list.md").unwrap();
        let a = parse_pins(&md, "Reading List");
        let b = parse_pins(&md, "Reading List");
        assert_eq!(a, b);
        assert!(a.len() >= 5);
    }

    #[test]
    fn filename_labels() {
        assert_eq!(section_from_filename("reading-list"), "Reading List");
        assert_eq!(section_from_filename("music_2024"), "Music 2024");
        assert_eq!(section_from_filename("pins"), "Pins");
    }
}

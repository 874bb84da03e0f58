use sha2::{Digest, Sha256};
use url::Url;

const MAX_SLUG_LEN: usize = 80;
const ID_HEX_LEN: usize = 10;

/// Stable id from URL and section: the same pin gets the same id every build.
pub fn pin_id(url: &str, section: &str) -> String {
    let digest = Sha256::digest(format!("{}\n{}", url, section).as_bytes());
    format!("pin-{}", &hex::encode(digest)[..ID_HEX_LEN])
}

/// ASCII, lowercase, dash separated. Non-Latin text is transliterated.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text).to_lowercase();
    let mut slug = String::with_capacity(ascii.len());
    for c in ascii.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

/// Slug from the title, else the last URL path segment, else the host.
pub fn slug_for(title: &str, url: &str) -> String {
    let from_title = slugify(title);
    if !from_title.is_empty() {
        return from_title;
    }

    let Ok(parsed) = Url::parse(url) else {
        return slugify(url);
    };
    let from_path = parsed
        .path_segments()
        .and_then(|mut s| s.rfind(|seg| !seg.is_empty()))
        .map(|seg| slugify(seg.rsplit_once('.').map_or(seg, |(stem, _)| stem)))
        .filter(|s| !s.is_empty());
    from_path
        .or_else(|| parsed.host_str().map(slugify))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_stable_and_section_scoped() {
        let a = pin_id("https://a.test", "Music");
        assert_eq!(a, pin_id("https://a.test", "Music"));
        assert_ne!(a, pin_id("https://a.test", "Code"));
        assert!(a.starts_with("pin-"));
        assert_eq!(a.len(), 4 + ID_HEX_LEN);
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("My Video!"), "my-video");
        assert_eq!(slugify("  Crème   brûlée -- recipe "), "creme-brulee-recipe");
        assert_eq!(slugify("???"), "");
        assert_eq!(slugify(&"x".repeat(200)).len(), MAX_SLUG_LEN);
    }

    #[test]
    fn slug_fallbacks() {
        assert_eq!(slug_for("Title", "https://a.test/x"), "title");
        assert_eq!(slug_for("", "https://a.test/posts/hello-world.html"), "hello-world");
        assert_eq!(slug_for("", "https://a.test/"), "a-test");
        assert_eq!(slug_for("", "nonsense"), "nonsense");
    }
}

/// Known hosts: (domain suffix, source, type). First match wins.
const DOMAINS: &[(&str, &str, &str)] = &[
    ("music.apple.com", "apple-music", "music"),
    ("spotify.com", "spotify", "music"),
    ("soundcloud.com", "soundcloud", "music"),
    ("bandcamp.com", "bandcamp", "music"),
    ("youtube.com", "youtube", "video"),
    ("youtube-nocookie.com", "youtube", "video"),
    ("youtu.be", "youtube", "video"),
    ("vimeo.com", "vimeo", "video"),
    ("twitch.tv", "twitch", "video"),
    ("github.com", "github", "code"),
    ("gitlab.com", "gitlab", "code"),
    ("codeberg.org", "codeberg", "code"),
    ("crates.io", "crates", "code"),
    ("npmjs.com", "npm", "code"),
    ("arxiv.org", "arxiv", "paper"),
    ("medium.com", "medium", "article"),
    ("substack.com", "substack", "article"),
    ("dev.to", "dev", "article"),
    ("wikipedia.org", "wikipedia", "reference"),
    ("pinterest.com", "pinterest", "image"),
    ("flickr.com", "flickr", "image"),
    ("dribbble.com", "dribbble", "image"),
    ("behance.net", "behance", "image"),
    ("instagram.com", "instagram", "image"),
    ("twitter.com", "twitter", "social"),
    ("x.com", "twitter", "social"),
    ("bsky.app", "bluesky", "social"),
    ("mastodon.social", "mastodon", "social"),
    ("news.ycombinator.com", "hackernews", "discussion"),
    ("reddit.com", "reddit", "discussion"),
];

const EXTENSIONS: &[(&[&str], &str)] = &[
    (&["mp3", "wav", "flac", "ogg", "m4a", "aac"], "music"),
    (&["mp4", "mov", "webm", "mkv", "avi", "m4v"], "video"),
    (&["jpg", "jpeg", "png", "gif", "webp", "svg", "avif"], "image"),
    (&["pdf", "doc", "docx", "txt", "epub", "odt", "rtf"], "document"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownDomain {
    pub source: &'static str,
    pub kind: &'static str,
}

pub fn lookup(host: &str) -> Option<KnownDomain> {
    let host = host.trim_start_matches("www.").to_ascii_lowercase();
    DOMAINS
        .iter()
        .find(|(d, _, _)| host == *d || host.ends_with(&format!(".{d}")))
        .map(|&(_, source, kind)| KnownDomain { source, kind })
}

/// Finer `contentType` from path segments of a known source.
pub fn content_type(source: &str, host: &str, segments: &[&str]) -> Option<&'static str> {
    match source {
        "spotify" => {
            // open.spotify.com/intl-de/album/..
            let first = segments.iter().find(|s| !s.starts_with("intl-"))?;
            match *first {
                "album" => Some("album"),
                "track" => Some("track"),
                "playlist" => Some("playlist"),
                "artist" => Some("artist"),
                "episode" => Some("episode"),
                "show" => Some("podcast"),
                _ => None,
            }
        }
        "youtube" => match segments.first().copied() {
            Some("playlist") => Some("playlist"),
            Some("shorts") => Some("short"),
            Some("channel" | "c" | "user") => Some("channel"),
            Some(s) if s.starts_with('@') => Some("channel"),
            _ => None,
        },
        "vimeo" => match segments.first().copied() {
            Some("showcase" | "album") => Some("showcase"),
            Some("channels") if segments.len() == 2 => Some("channel"),
            _ => None,
        },
        "github" | "gitlab" | "codeberg" => {
            if host.starts_with("gist.") {
                return Some("gist");
            }
            match segments {
                [] => None,
                [_] => Some("profile"),
                [_, _, "issues", ..] => Some("issue"),
                [_, _, "pull" | "merge_requests", ..] => Some("pull-request"),
                [_, _, "releases", ..] => Some("release"),
                _ => Some("repository"),
            }
        }
        "soundcloud" => match segments {
            [_] => Some("artist"),
            [_, "sets", ..] => Some("playlist"),
            [_, _] => Some("track"),
            _ => None,
        },
        "bandcamp" => match segments.first().copied() {
            Some("album") => Some("album"),
            Some("track") => Some("track"),
            _ => None,
        },
        _ => None,
    }
}

/// Content type from a file extension in the URL path.
pub fn extension_type(path: &str) -> Option<&'static str> {
    let file = path.rsplit('/').next()?;
    let (_, ext) = file.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();
    EXTENSIONS
        .iter()
        .find(|(exts, _)| exts.contains(&ext.as_str()))
        .map(|(_, kind)| *kind)
}

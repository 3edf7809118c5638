//! Audio extension sniffing from URLs and content types.

/// Extensions recognized in source URLs.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "aiff", "aif", "flac", "ogg", "m4a"];

/// Used when the URL carries no recognized extension.
pub const DEFAULT_EXTENSION: &str = "wav";

/// Extension of the last URL path segment if it is a recognized audio type,
/// otherwise `DEFAULT_EXTENSION`. Query strings and fragments are ignored.
pub fn extension_from_url(url: &str) -> &'static str {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
    };
    path.rsplit('/')
        .next()
        .and_then(|segment| segment.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .and_then(|ext| AUDIO_EXTENSIONS.iter().copied().find(|known| *known == ext))
        .unwrap_or(DEFAULT_EXTENSION)
}

/// Audio extension implied by a `Content-Type` header value, if it names one.
pub fn extension_for_content_type(content_type: &str) -> Option<&'static str> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    match mime.as_str() {
        "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Some("wav"),
        "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mpeg-3" => Some("mp3"),
        "audio/aiff" | "audio/x-aiff" => Some("aiff"),
        "audio/flac" | "audio/x-flac" => Some("flac"),
        "audio/ogg" | "application/ogg" | "audio/vorbis" => Some("ogg"),
        "audio/mp4" | "audio/x-m4a" | "audio/m4a" => Some("m4a"),
        _ => None,
    }
}

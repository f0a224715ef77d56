//! Utility functions for file naming and path handling

use crate::types::{AudioFormat, CollectionKind, Platform, Quality};
use std::path::Path;
use std::sync::LazyLock;

/// Regexes stripping common noise suffixes from platform track titles
/// ("(Official Video)", "[Audio]", ...)
static TITLE_NOISE: LazyLock<Vec<regex::Regex>> = LazyLock::new(|| {
    [
        r"(?i)\(official.*?\)",
        r"(?i)\[official.*?\]",
        r"(?i)\((?:audio|video|lyric video|lyrics)\)",
        r"(?i)\[(?:audio|video|lyric video|lyrics)\]",
        r"(?i)\(visualizer\)",
        r"(?i)\(hd\)|\(hq\)",
    ]
    .iter()
    .filter_map(|p| regex::Regex::new(p).ok())
    .collect()
});

/// Sanitize a string for use as a file or folder name
///
/// Replaces filesystem-reserved characters with underscores and a few
/// punctuation characters that routinely break shell quoting in extractor
/// CLIs with word equivalents.
pub fn sanitize_filename(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => out.push('_'),
            '&' => out.push_str("and"),
            '#' => out.push_str("No"),
            c if c.is_control() => {}
            c => out.push(c),
        }
    }
    // Collapse runs of whitespace left behind by removals
    let collapsed = out.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.trim_matches(['.', ' ']).to_string()
}

/// Strip noise suffixes from a track title ("Song (Official Video)" -> "Song")
pub fn clean_title(title: &str) -> String {
    let mut cleaned = title.to_string();
    for re in TITLE_NOISE.iter() {
        cleaned = re.replace_all(&cleaned, "").to_string();
    }
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Deterministic produced-file name: `"Artist - Title [192kbps].mp3"`
///
/// Storing this name on the item job is what lets completed items be located
/// again without fuzzy matching on display strings.
pub fn track_filename(
    artist: Option<&str>,
    title: &str,
    quality: Quality,
    format: AudioFormat,
) -> String {
    let title = sanitize_filename(&clean_title(title));
    let stem = match artist.map(sanitize_filename) {
        Some(artist) if !artist.is_empty() => format!("{artist} - {title}"),
        _ => title,
    };
    format!("{stem} [{quality}kbps].{format}")
}

/// Batch-scoped folder name: `"Title [album] [spotify]"`
///
/// Scoping intermediate files per batch keeps concurrent unrelated batches
/// from colliding on disk.
pub fn collection_folder(title: &str, kind: CollectionKind, platform: Platform) -> String {
    sanitize_filename(&format!("{title} [{kind}] [{platform}]"))
}

/// MIME type for a produced file, by extension
pub fn content_type_for(name: &str) -> &'static str {
    match Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("wav") => "audio/wav",
        Some("flac") => "audio/flac",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

/// Whether a file name looks like a produced audio file
pub fn is_audio_file(name: &str) -> bool {
    matches!(
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref(),
        Some("mp3") | Some("m4a") | Some("wav") | Some("flac")
    )
}

/// Whether a client-supplied file name is safe to resolve under the download
/// root (no separators, no parent traversal, not empty)
pub fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && name != "."
        && name != ".."
        && !name.contains('\0')
}

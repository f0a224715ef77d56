//! Track resolver — URL classification and collection enumeration
//!
//! Classification is pure string work and never touches the network; the
//! enumeration half goes through the extraction capability with a bounded
//! timeout, so a stuck platform lookup surfaces as a resolution error instead
//! of hanging the caller.

use crate::error::{Error, Result};
use crate::extraction::AudioExtractor;
use crate::types::{
    CollectionInfo, CollectionKind, ItemDescriptor, ItemSource, Platform, TrackMetadata,
};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Result of classifying a URL against the supported platform patterns
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClassifiedUrl {
    /// Which platform the URL belongs to
    pub platform: Platform,
    /// What the URL refers to
    pub kind: CollectionKind,
}

/// Classify a URL as a supported platform reference
///
/// Locale path segments in otherwise-canonical URLs
/// (`open.spotify.com/intl-es/track/...`) normalize to the same
/// classification as their canonical form. Unrecognized URLs fail with
/// [`Error::UnsupportedUrl`].
pub fn classify(raw: &str) -> Result<ClassifiedUrl> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::Validation("url must not be empty".to_string()));
    }

    // spotify:track:... URIs have no host; handle them before Url parsing
    if let Some(rest) = trimmed.strip_prefix("spotify:") {
        let kind = match rest.split(':').next() {
            Some("track") => CollectionKind::Track,
            Some("album") => CollectionKind::Album,
            Some("playlist") => CollectionKind::Playlist,
            _ => return Err(Error::UnsupportedUrl(trimmed.to_string())),
        };
        return Ok(ClassifiedUrl {
            platform: Platform::Spotify,
            kind,
        });
    }

    let url = Url::parse(trimmed).map_err(|_| Error::UnsupportedUrl(trimmed.to_string()))?;
    let host = url.host_str().unwrap_or("").to_ascii_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    match host {
        "open.spotify.com" => classify_spotify(&url, trimmed),
        "music.youtube.com" => classify_youtube(&url, Platform::YoutubeMusic, trimmed),
        "youtube.com" | "m.youtube.com" => classify_youtube(&url, Platform::Youtube, trimmed),
        "youtu.be" => {
            // Short links always point at a single video
            if url.path().len() > 1 {
                Ok(ClassifiedUrl {
                    platform: Platform::Youtube,
                    kind: CollectionKind::Track,
                })
            } else {
                Err(Error::UnsupportedUrl(trimmed.to_string()))
            }
        }
        _ => Err(Error::UnsupportedUrl(trimmed.to_string())),
    }
}

fn classify_spotify(url: &Url, raw: &str) -> Result<ClassifiedUrl> {
    let mut segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();

    // Normalize international variants: /intl-es/track/... -> /track/...
    if segments
        .first()
        .is_some_and(|seg| seg.starts_with("intl-"))
    {
        segments.remove(0);
    }

    let kind = match segments.as_slice() {
        ["track", id, ..] if !id.is_empty() => CollectionKind::Track,
        ["album", id, ..] if !id.is_empty() => CollectionKind::Album,
        ["playlist", id, ..] if !id.is_empty() => CollectionKind::Playlist,
        _ => return Err(Error::UnsupportedUrl(raw.to_string())),
    };

    Ok(ClassifiedUrl {
        platform: Platform::Spotify,
        kind,
    })
}

fn classify_youtube(url: &Url, platform: Platform, raw: &str) -> Result<ClassifiedUrl> {
    let path = url.path();
    let has_list = url.query_pairs().any(|(k, _)| k == "list");
    let has_video = url.query_pairs().any(|(k, _)| k == "v");

    let kind = if path.starts_with("/playlist") && has_list {
        CollectionKind::Playlist
    } else if path.starts_with("/watch") && has_list {
        // A watch URL inside a playlist context resolves as the playlist
        CollectionKind::Playlist
    } else if path.starts_with("/watch") && has_video {
        CollectionKind::Track
    } else if path.starts_with("/embed/") && path.len() > "/embed/".len() {
        CollectionKind::Track
    } else {
        return Err(Error::UnsupportedUrl(raw.to_string()));
    };

    Ok(ClassifiedUrl { platform, kind })
}

/// Resolves URLs into track metadata or ordered collection listings
#[derive(Clone)]
pub struct TrackResolver {
    extractor: Arc<dyn AudioExtractor>,
    max_items: usize,
    timeout: Duration,
}

impl TrackResolver {
    /// Create a resolver bound to an extraction capability
    pub fn new(extractor: Arc<dyn AudioExtractor>, max_items: usize, timeout: Duration) -> Self {
        Self {
            extractor,
            max_items,
            timeout,
        }
    }

    /// Resolve a single track URL into its metadata
    pub async fn resolve_track(&self, url: &str) -> Result<TrackMetadata> {
        let classified = classify(url)?;
        if classified.kind != CollectionKind::Track {
            return Err(Error::Validation(format!(
                "expected a single track URL, got a {}",
                classified.kind
            )));
        }

        let probe = tokio::time::timeout(self.timeout, self.extractor.probe(url))
            .await
            .map_err(|_| Error::Resolution("metadata lookup timed out".to_string()))?;
        probe.map_err(|e| Error::Resolution(e.to_string()))
    }

    /// Resolve any supported URL into an ordered collection listing
    ///
    /// Single-track URLs resolve to a degenerate one-item collection. Larger
    /// collections are truncated to the configured cap, reported through
    /// `limited` while `total_tracks` keeps the platform's true count.
    pub async fn resolve_collection(&self, url: &str) -> Result<CollectionInfo> {
        let classified = classify(url)?;

        if classified.kind == CollectionKind::Track {
            let meta = self.resolve_track(url).await?;
            let name = meta.display_name();
            return Ok(CollectionInfo {
                kind: CollectionKind::Track,
                platform: classified.platform,
                title: name.clone(),
                uploader: meta.artist,
                total_tracks: 1,
                items: vec![ItemDescriptor {
                    index: 0,
                    name,
                    source: ItemSource::Url(url.to_string()),
                }],
                limited: false,
            });
        }

        let listing = tokio::time::timeout(
            self.timeout,
            self.extractor.enumerate(url, self.max_items),
        )
        .await
        .map_err(|_| Error::Resolution("collection listing timed out".to_string()))?
        .map_err(|e| Error::Resolution(e.to_string()))?;

        if listing.items.is_empty() {
            return Err(Error::Resolution(
                "no tracks found in the collection".to_string(),
            ));
        }

        Ok(CollectionInfo {
            kind: classified.kind,
            platform: classified.platform,
            title: listing.title,
            uploader: listing.uploader,
            total_tracks: listing.total,
            limited: listing.total > listing.items.len(),
            items: listing.items,
        })
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    // `use super::*` pulls in the crate's `Result` alias (fixed error type);
    // the mock extractor impls below must match the trait's `std` Result.
    use std::result::Result;
    use crate::error::ExtractionError;
    use crate::extraction::Enumeration;
    use crate::types::DownloadOptions;
    use async_trait::async_trait;
    use std::path::Path;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    // --- classification ---

    #[test]
    fn classifies_spotify_urls() {
        let cases = [
            (
                "https://open.spotify.com/track/4cOdK2wGLETKBW3PvgPWqT",
                CollectionKind::Track,
            ),
            (
                "https://open.spotify.com/album/2noRn2Aes5aoNVsU6iWThc",
                CollectionKind::Album,
            ),
            (
                "https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M",
                CollectionKind::Playlist,
            ),
        ];
        for (url, kind) in cases {
            let c = classify(url).unwrap();
            assert_eq!(c.platform, Platform::Spotify);
            assert_eq!(c.kind, kind, "{url}");
        }
    }

    #[test]
    fn international_spotify_urls_normalize_to_canonical_classification() {
        let canonical = classify("https://open.spotify.com/album/2noRn2Aes5aoNVsU6iWThc").unwrap();
        for locale in ["intl-es", "intl-pt", "intl-de"] {
            let url = format!("https://open.spotify.com/{locale}/album/2noRn2Aes5aoNVsU6iWThc");
            assert_eq!(classify(&url).unwrap(), canonical, "{url}");
        }
    }

    #[test]
    fn classifies_spotify_urls_with_query_parameters() {
        let c = classify("https://open.spotify.com/track/4cOdK2wGLETKBW3PvgPWqT?si=abc123")
            .unwrap();
        assert_eq!(c.kind, CollectionKind::Track);
    }

    #[test]
    fn classifies_spotify_uris() {
        let c = classify("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M").unwrap();
        assert_eq!(c.platform, Platform::Spotify);
        assert_eq!(c.kind, CollectionKind::Playlist);
    }

    #[test]
    fn classifies_youtube_urls() {
        let c = classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert_eq!(c.platform, Platform::Youtube);
        assert_eq!(c.kind, CollectionKind::Track);

        let c = classify("https://youtu.be/dQw4w9WgXcQ").unwrap();
        assert_eq!(c.platform, Platform::Youtube);
        assert_eq!(c.kind, CollectionKind::Track);

        let c = classify("https://www.youtube.com/embed/dQw4w9WgXcQ").unwrap();
        assert_eq!(c.kind, CollectionKind::Track);
    }

    #[test]
    fn classifies_youtube_playlists() {
        let c =
            classify("https://www.youtube.com/playlist?list=PLabc123").unwrap();
        assert_eq!(c.kind, CollectionKind::Playlist);

        // Watch URL carrying playlist context counts as the playlist
        let c = classify("https://www.youtube.com/watch?v=dQw4w9WgXcQ&list=PLabc123").unwrap();
        assert_eq!(c.kind, CollectionKind::Playlist);
    }

    #[test]
    fn classifies_youtube_music() {
        let c = classify("https://music.youtube.com/watch?v=abc123").unwrap();
        assert_eq!(c.platform, Platform::YoutubeMusic);
        assert_eq!(c.kind, CollectionKind::Track);

        let c = classify("https://music.youtube.com/playlist?list=OLAK5uy_abc").unwrap();
        assert_eq!(c.platform, Platform::YoutubeMusic);
        assert_eq!(c.kind, CollectionKind::Playlist);
    }

    #[test]
    fn rejects_unsupported_urls() {
        for url in [
            "https://example.com/song.mp3",
            "https://soundcloud.com/artist/track",
            "https://open.spotify.com/artist/abc",
            "https://www.youtube.com/",
            "not a url at all",
        ] {
            assert!(
                matches!(classify(url), Err(Error::UnsupportedUrl(_))),
                "{url} should be unsupported"
            );
        }
    }

    #[test]
    fn empty_url_is_a_validation_error() {
        assert!(matches!(classify("  "), Err(Error::Validation(_))));
    }

    // --- enumeration through a scripted extractor ---

    struct ListingExtractor {
        total: usize,
    }

    #[async_trait]
    impl AudioExtractor for ListingExtractor {
        async fn probe(&self, _url: &str) -> Result<TrackMetadata, ExtractionError> {
            Ok(TrackMetadata {
                title: "Song".to_string(),
                artist: Some("Artist".to_string()),
                duration_secs: Some(200),
                platform: Platform::Youtube,
            })
        }

        async fn enumerate(
            &self,
            _url: &str,
            limit: usize,
        ) -> Result<Enumeration, ExtractionError> {
            let items = (0..self.total.min(limit))
                .map(|index| ItemDescriptor {
                    index,
                    name: format!("Artist - Track {}", index + 1),
                    source: ItemSource::Search(format!("Artist - Track {}", index + 1)),
                })
                .collect();
            Ok(Enumeration {
                title: "Big Playlist".to_string(),
                uploader: Some("Artist".to_string()),
                total: self.total,
                items,
            })
        }

        async fn fetch(
            &self,
            _item: &ItemDescriptor,
            _options: DownloadOptions,
            _dest_dir: &Path,
            _cancel: &CancellationToken,
            _progress: mpsc::UnboundedSender<u8>,
        ) -> Result<String, ExtractionError> {
            Err(ExtractionError::Tool {
                message: "not used".to_string(),
            })
        }
    }

    fn resolver_with_total(total: usize) -> TrackResolver {
        TrackResolver::new(
            Arc::new(ListingExtractor { total }),
            50,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn oversized_playlist_is_limited_to_the_cap() {
        let resolver = resolver_with_total(60);
        let info = resolver
            .resolve_collection("https://www.youtube.com/playlist?list=PLabc")
            .await
            .unwrap();

        assert_eq!(info.total_tracks, 60);
        assert_eq!(info.items.len(), 50);
        assert!(info.limited);
        // Items keep platform-listing order
        assert_eq!(info.items[0].name, "Artist - Track 1");
        assert_eq!(info.items[49].name, "Artist - Track 50");
    }

    #[tokio::test]
    async fn small_playlist_is_not_limited() {
        let resolver = resolver_with_total(3);
        let info = resolver
            .resolve_collection("https://www.youtube.com/playlist?list=PLabc")
            .await
            .unwrap();

        assert_eq!(info.total_tracks, 3);
        assert_eq!(info.items.len(), 3);
        assert!(!info.limited);
    }

    #[tokio::test]
    async fn track_url_resolves_to_one_item_collection() {
        let resolver = resolver_with_total(10);
        let info = resolver
            .resolve_collection("https://www.youtube.com/watch?v=abc12345")
            .await
            .unwrap();

        assert_eq!(info.kind, CollectionKind::Track);
        assert_eq!(info.total_tracks, 1);
        assert_eq!(info.items.len(), 1);
        assert_eq!(info.items[0].name, "Artist - Song");
        assert!(matches!(info.items[0].source, ItemSource::Url(_)));
    }

    #[tokio::test]
    async fn resolve_track_rejects_collection_urls() {
        let resolver = resolver_with_total(10);
        let err = resolver
            .resolve_track("https://www.youtube.com/playlist?list=PLabc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn enumeration_failure_surfaces_as_resolution_error() {
        struct FailingExtractor;

        #[async_trait]
        impl AudioExtractor for FailingExtractor {
            async fn probe(&self, _url: &str) -> Result<TrackMetadata, ExtractionError> {
                Err(ExtractionError::Tool {
                    message: "boom".to_string(),
                })
            }
            async fn enumerate(
                &self,
                _url: &str,
                _limit: usize,
            ) -> Result<Enumeration, ExtractionError> {
                Err(ExtractionError::Tool {
                    message: "listing fetch failed".to_string(),
                })
            }
            async fn fetch(
                &self,
                _item: &ItemDescriptor,
                _options: DownloadOptions,
                _dest_dir: &Path,
                _cancel: &CancellationToken,
                _progress: mpsc::UnboundedSender<u8>,
            ) -> Result<String, ExtractionError> {
                Err(ExtractionError::Cancelled)
            }
        }

        let resolver = TrackResolver::new(Arc::new(FailingExtractor), 50, Duration::from_secs(5));
        let err = resolver
            .resolve_collection("https://www.youtube.com/playlist?list=PLabc")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Resolution(_)));
    }
}

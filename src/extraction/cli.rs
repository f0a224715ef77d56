//! CLI-backed extraction: yt-dlp for YouTube, spotdl for Spotify
//!
//! Both tools run as child processes with `kill_on_drop`, so an item timeout
//! or cancellation never leaks a downloader process.

use super::{AudioExtractor, Enumeration};
use crate::config::ToolsConfig;
use crate::error::ExtractionError;
use crate::resolver;
use crate::types::{
    CollectionKind, DownloadOptions, ItemDescriptor, ItemSource, Platform, TrackMetadata,
};
use crate::utils;
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// yt-dlp progress lines look like `[download]  42.3% of 3.52MiB at ...`
static YTDLP_PERCENT: LazyLock<regex::Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    regex::Regex::new(r"\[download\]\s+([0-9]+(?:\.[0-9]+)?)%").expect("static regex")
});

/// Number of trailing stderr lines kept for error reporting
const STDERR_TAIL: usize = 8;

/// Extraction capability backed by the yt-dlp and spotdl command-line tools
pub struct CliExtractor {
    ytdlp: PathBuf,
    spotdl: Option<PathBuf>,
}

impl CliExtractor {
    /// Discover extractor binaries from explicit paths or PATH
    ///
    /// yt-dlp is mandatory; spotdl is optional (Spotify items fall back to a
    /// yt-dlp search when it is absent).
    pub fn discover(tools: &ToolsConfig) -> Result<Self, ExtractionError> {
        let ytdlp = match &tools.ytdlp_path {
            Some(path) => path.clone(),
            None if tools.search_path => which::which("yt-dlp")
                .map_err(|_| ExtractionError::MissingBinary("yt-dlp".to_string()))?,
            None => return Err(ExtractionError::MissingBinary("yt-dlp".to_string())),
        };

        let spotdl = match &tools.spotdl_path {
            Some(path) => Some(path.clone()),
            None if tools.search_path => which::which("spotdl").ok(),
            None => None,
        };

        Ok(Self { ytdlp, spotdl })
    }

    fn classify(url: &str) -> Result<resolver::ClassifiedUrl, ExtractionError> {
        resolver::classify(url).map_err(|e| ExtractionError::Tool {
            message: e.to_string(),
        })
    }

    fn spotdl_bin(&self) -> Result<&Path, ExtractionError> {
        self.spotdl
            .as_deref()
            .ok_or_else(|| ExtractionError::MissingBinary("spotdl".to_string()))
    }

    /// Run `yt-dlp -J` against a URL and parse the JSON document it prints
    async fn ytdlp_json(&self, args: &[&str]) -> Result<serde_json::Value, ExtractionError> {
        let output = Command::new(&self.ytdlp)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Tool {
                message: last_line(&stderr)
                    .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status)),
            });
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| ExtractionError::Parse(format!("yt-dlp JSON: {e}")))
    }

    /// Run `spotdl save` and parse the saved track list
    async fn spotdl_save(&self, url: &str) -> Result<Vec<serde_json::Value>, ExtractionError> {
        let spotdl = self.spotdl_bin()?.to_path_buf();
        let save_file =
            std::env::temp_dir().join(format!("trackdl-{}.spotdl", crate::types::DownloadId::generate()));

        let output = Command::new(&spotdl)
            .arg("save")
            .arg(url)
            .arg("--save-file")
            .arg(&save_file)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let _ = tokio::fs::remove_file(&save_file).await;
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::Tool {
                message: last_line(&stderr)
                    .unwrap_or_else(|| format!("spotdl exited with {}", output.status)),
            });
        }

        let raw = tokio::fs::read(&save_file).await?;
        let _ = tokio::fs::remove_file(&save_file).await;

        let entries: Vec<serde_json::Value> = serde_json::from_slice(&raw)
            .map_err(|e| ExtractionError::Parse(format!("spotdl save file: {e}")))?;
        Ok(entries)
    }

    async fn ytdlp_fetch(
        &self,
        target: &str,
        item: &ItemDescriptor,
        options: DownloadOptions,
        dest_dir: &Path,
        cancel: &CancellationToken,
        progress: mpsc::UnboundedSender<u8>,
    ) -> Result<String, ExtractionError> {
        let (artist, title) = split_display_name(&item.name);
        let filename = utils::track_filename(artist, title, options.quality, options.format);
        let ext_suffix = format!(".{}", options.format.ext());
        let stem = filename.trim_end_matches(&ext_suffix);
        let template = dest_dir.join(format!("{stem}.%(ext)s"));

        let mut child = Command::new(&self.ytdlp)
            .arg("-x")
            .arg("--audio-format")
            .arg(options.format.ext())
            .arg("--audio-quality")
            .arg(format!("{}K", options.quality.kbps()))
            .arg("--newline")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg("-o")
            .arg(&template)
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_tail = spawn_stderr_tail(child.stderr.take());

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return Err(ExtractionError::Cancelled);
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            if let Some(percent) = parse_percent(&line) {
                                let _ = progress.send(percent);
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = child.start_kill();
                            let _ = child.wait().await;
                            return Err(ExtractionError::Io(e));
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        let tail = stderr_tail.await.unwrap_or_default();
        if !status.success() {
            return Err(ExtractionError::Tool {
                message: tail
                    .back()
                    .cloned()
                    .unwrap_or_else(|| format!("yt-dlp exited with {status}")),
            });
        }

        if !dest_dir.join(&filename).is_file() {
            return Err(ExtractionError::Tool {
                message: format!("expected output file {filename} was not produced"),
            });
        }

        let _ = progress.send(100);
        Ok(filename)
    }

    async fn spotdl_fetch(
        &self,
        query: &str,
        item: &ItemDescriptor,
        options: DownloadOptions,
        dest_dir: &Path,
        cancel: &CancellationToken,
        progress: mpsc::UnboundedSender<u8>,
    ) -> Result<String, ExtractionError> {
        let spotdl = self.spotdl_bin()?.to_path_buf();
        let before = list_audio_files(dest_dir).await;

        let mut child = Command::new(&spotdl)
            .arg("download")
            .arg(query)
            .arg("--output")
            .arg(dest_dir)
            .arg("--format")
            .arg(options.format.ext())
            .arg("--bitrate")
            .arg(options.quality.bitrate_arg())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr_tail = spawn_stderr_tail(child.stderr.take());

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return Err(ExtractionError::Cancelled);
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            // spotdl reports no parseable percent; surface a
                            // coarse signal once it starts writing output
                            if line.contains("Downloaded") {
                                let _ = progress.send(100);
                            }
                        }
                        Ok(None) => break,
                        Err(e) => {
                            let _ = child.start_kill();
                            let _ = child.wait().await;
                            return Err(ExtractionError::Io(e));
                        }
                    }
                }
            }
        }

        let status = child.wait().await?;
        let tail = stderr_tail.await.unwrap_or_default();
        if !status.success() {
            return Err(ExtractionError::Tool {
                message: tail
                    .back()
                    .cloned()
                    .unwrap_or_else(|| format!("spotdl exited with {status}")),
            });
        }

        // spotdl names the file itself; rename the new file to the
        // deterministic per-item name so the job store records a stable name
        let after = list_audio_files(dest_dir).await;
        let produced = after.difference(&before).next().cloned().ok_or_else(|| {
            ExtractionError::Tool {
                message: "spotdl reported success but produced no audio file".to_string(),
            }
        })?;

        let (artist, title) = split_display_name(&item.name);
        let filename = utils::track_filename(artist, title, options.quality, options.format);
        if produced != filename {
            tokio::fs::rename(dest_dir.join(&produced), dest_dir.join(&filename)).await?;
        }

        Ok(filename)
    }
}

#[async_trait]
impl AudioExtractor for CliExtractor {
    async fn probe(&self, url: &str) -> Result<TrackMetadata, ExtractionError> {
        let classified = Self::classify(url)?;

        match classified.platform {
            Platform::Spotify => {
                let entries = self.spotdl_save(url).await?;
                let first = entries.first().ok_or_else(|| ExtractionError::Parse(
                    "spotdl returned an empty track list".to_string(),
                ))?;
                Ok(TrackMetadata {
                    title: json_str(first, "name").unwrap_or_else(|| "Unknown Title".to_string()),
                    artist: first_artist(first),
                    duration_secs: first.get("duration").and_then(|v| v.as_f64()).map(|d| d as u64),
                    platform: Platform::Spotify,
                })
            }
            platform => {
                let info = self.ytdlp_json(&["-J", "--no-playlist", url]).await?;
                Ok(TrackMetadata {
                    title: json_str(&info, "title").unwrap_or_else(|| "Unknown Title".to_string()),
                    artist: json_str(&info, "artist")
                        .or_else(|| json_str(&info, "uploader"))
                        .or_else(|| json_str(&info, "channel")),
                    duration_secs: info.get("duration").and_then(|v| v.as_f64()).map(|d| d as u64),
                    platform,
                })
            }
        }
    }

    async fn enumerate(&self, url: &str, limit: usize) -> Result<Enumeration, ExtractionError> {
        let classified = Self::classify(url)?;

        match classified.platform {
            Platform::Spotify => {
                let entries = self.spotdl_save(url).await?;
                let total = entries.len();
                let title = entries
                    .first()
                    .and_then(|e| json_str(e, "list_name"))
                    .unwrap_or_else(|| match classified.kind {
                        CollectionKind::Album => "Spotify Album".to_string(),
                        CollectionKind::Playlist => "Spotify Playlist".to_string(),
                        CollectionKind::Track => "Spotify Track".to_string(),
                    });

                let items = entries
                    .iter()
                    .take(limit)
                    .enumerate()
                    .map(|(index, entry)| {
                        let track = json_str(entry, "name")
                            .unwrap_or_else(|| format!("Track {}", index + 1));
                        let name = match first_artist(entry) {
                            Some(artist) => format!("{artist} - {track}"),
                            None => track,
                        };
                        // Spotify tracks are re-resolved by search so the
                        // fetch step works with or without spotdl installed
                        ItemDescriptor {
                            index,
                            name: name.clone(),
                            source: ItemSource::Search(name),
                        }
                    })
                    .collect();

                Ok(Enumeration {
                    title,
                    uploader: None,
                    total,
                    items,
                })
            }
            _ => {
                let info = self.ytdlp_json(&["-J", "--flat-playlist", url]).await?;

                match info.get("entries").and_then(|v| v.as_array()) {
                    Some(entries) => {
                        let total = info
                            .get("playlist_count")
                            .and_then(|v| v.as_u64())
                            .map(|n| n as usize)
                            .unwrap_or(entries.len());

                        let items = entries
                            .iter()
                            .take(limit)
                            .enumerate()
                            .map(|(index, entry)| {
                                let title = json_str(entry, "title")
                                    .unwrap_or_else(|| format!("Track {}", index + 1));
                                let name = match json_str(entry, "uploader")
                                    .or_else(|| json_str(entry, "channel"))
                                {
                                    Some(uploader) => format!("{uploader} - {title}"),
                                    None => title,
                                };
                                let source = json_str(entry, "url")
                                    .or_else(|| {
                                        json_str(entry, "id").map(|id| {
                                            format!("https://www.youtube.com/watch?v={id}")
                                        })
                                    })
                                    .map(ItemSource::Url)
                                    .unwrap_or_else(|| ItemSource::Search(name.clone()));
                                ItemDescriptor { index, name, source }
                            })
                            .collect();

                        Ok(Enumeration {
                            title: json_str(&info, "title")
                                .unwrap_or_else(|| "YouTube Playlist".to_string()),
                            uploader: json_str(&info, "uploader"),
                            total,
                            items,
                        })
                    }
                    None => {
                        // Single video: degenerate one-item listing
                        let title = json_str(&info, "title")
                            .unwrap_or_else(|| "Unknown Title".to_string());
                        let uploader =
                            json_str(&info, "uploader").or_else(|| json_str(&info, "channel"));
                        let name = match &uploader {
                            Some(uploader) => format!("{uploader} - {title}"),
                            None => title.clone(),
                        };
                        Ok(Enumeration {
                            title: name.clone(),
                            uploader,
                            total: 1,
                            items: vec![ItemDescriptor {
                                index: 0,
                                name,
                                source: ItemSource::Url(url.to_string()),
                            }],
                        })
                    }
                }
            }
        }
    }

    async fn fetch(
        &self,
        item: &ItemDescriptor,
        options: DownloadOptions,
        dest_dir: &Path,
        cancel: &CancellationToken,
        progress: mpsc::UnboundedSender<u8>,
    ) -> Result<String, ExtractionError> {
        match &item.source {
            ItemSource::Url(url) => {
                let classified = Self::classify(url)?;
                match classified.platform {
                    Platform::Spotify => {
                        self.spotdl_fetch(url, item, options, dest_dir, cancel, progress)
                            .await
                    }
                    _ => {
                        self.ytdlp_fetch(url, item, options, dest_dir, cancel, progress)
                            .await
                    }
                }
            }
            ItemSource::Search(query) => {
                if self.spotdl.is_some() {
                    self.spotdl_fetch(query, item, options, dest_dir, cancel, progress)
                        .await
                } else {
                    let target = format!("ytsearch1:{query}");
                    self.ytdlp_fetch(&target, item, options, dest_dir, cancel, progress)
                        .await
                }
            }
        }
    }
}

/// Split a "Artist - Title" display name into its parts
fn split_display_name(name: &str) -> (Option<&str>, &str) {
    match name.split_once(" - ") {
        Some((artist, title)) if !artist.trim().is_empty() => (Some(artist.trim()), title.trim()),
        _ => (None, name),
    }
}

fn parse_percent(line: &str) -> Option<u8> {
    let caps = YTDLP_PERCENT.captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u8)
}

fn last_line(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .next_back()
        .map(str::to_string)
}

fn json_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn first_artist(entry: &serde_json::Value) -> Option<String> {
    entry
        .get("artists")
        .and_then(|v| v.as_array())
        .and_then(|a| a.first())
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .or_else(|| json_str(entry, "artist"))
}

async fn list_audio_files(dir: &Path) -> HashSet<String> {
    let mut names = HashSet::new();
    if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            if utils::is_audio_file(&name) {
                names.insert(name);
            }
        }
    }
    names
}

fn spawn_stderr_tail(
    stderr: Option<tokio::process::ChildStderr>,
) -> tokio::task::JoinHandle<VecDeque<String>> {
    tokio::spawn(async move {
        let mut tail: VecDeque<String> = VecDeque::with_capacity(STDERR_TAIL);
        if let Some(stderr) = stderr {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
        }
        tail
    })
}

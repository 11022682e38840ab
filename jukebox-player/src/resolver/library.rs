//! Library folder resolver
//!
//! URLs resolve to themselves. Anything else is treated as search words and
//! matched against audio file names under the library root: a file matches
//! when its stem contains every word, ignoring case. The first match in path
//! order wins.

use async_trait::async_trait;
use jukebox_common::{RequesterId, Song};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::{is_url, ResolveError, Resolver};

/// File extensions considered playable
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "opus", "wav", "m4a", "aac"];

/// Resolver backed by a folder of audio files
#[derive(Debug, Clone)]
pub struct LibraryResolver {
    root: PathBuf,
}

impl LibraryResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn title_from_url(url: &str) -> String {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty() && !segment.contains(':'))
        .map(|segment| segment.split(['?', '#']).next().unwrap_or(segment).to_string())
        .unwrap_or_else(|| url.to_string())
}

/// Whole seconds of audio in `path`, if its headers say
fn read_duration(path: &Path) -> Option<u64> {
    let file = File::open(path).ok()?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let opened = match symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    ) {
        Ok(opened) => opened,
        Err(e) => {
            debug!("No readable audio headers in {}: {}", path.display(), e);
            return None;
        }
    };

    let track = opened
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)?;
    let frames = track.codec_params.n_frames?;
    let sample_rate = track.codec_params.sample_rate.filter(|rate| *rate > 0)?;
    Some(frames / u64::from(sample_rate))
}

/// Find the first audio file under `root` whose stem contains every word
fn search_library(root: &Path, words: &[String]) -> Option<PathBuf> {
    let mut matches: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Error accessing library entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .filter(|entry| {
            let stem = entry
                .path()
                .file_stem()
                .map(|s| s.to_string_lossy().to_lowercase())
                .unwrap_or_default();
            words.iter().all(|word| stem.contains(word.as_str()))
        })
        .map(|entry| entry.into_path())
        .collect();

    matches.sort();
    matches.into_iter().next()
}

#[async_trait]
impl Resolver for LibraryResolver {
    async fn resolve(&self, query: &str, requester: &RequesterId) -> Result<Song, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::NotFound(String::new()));
        }

        if is_url(query) {
            return Ok(Song::new(title_from_url(query), query, requester.clone()));
        }

        if !self.root.is_dir() {
            warn!("Library root {} is not a directory", self.root.display());
            return Err(ResolveError::NotFound(query.to_string()));
        }

        let words: Vec<String> = query
            .split_whitespace()
            .map(|word| word.to_lowercase())
            .collect();
        let root = self.root.clone();

        let found = tokio::task::spawn_blocking(move || {
            search_library(&root, &words).map(|path| {
                let duration = read_duration(&path);
                (path, duration)
            })
        })
        .await
        .map_err(|e| ResolveError::Backend(format!("library scan aborted: {}", e)))?;

        let (path, duration) = found.ok_or_else(|| ResolveError::NotFound(query.to_string()))?;
        debug!("Resolved '{}' to {} ({:?}s)", query, path.display(), duration);

        let title = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| query.to_string());
        let song = Song::new(title, path.to_string_lossy(), requester.clone());
        Ok(match duration {
            Some(seconds) => song.with_duration(seconds),
            None => song,
        })
    }
}

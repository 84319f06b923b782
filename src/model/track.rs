//! Track metadata as handled by the queue and the library

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Screen or list a playback was launched from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "kind", content = "name")]
pub enum PlaybackSource {
    #[default]
    Home,
    Search,
    Trending,
    Playlist(String),
    Album(String),
    Favourites,
    RecentlyPlayed,
    Downloads,
    Share,
}

impl std::fmt::Display for PlaybackSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackSource::Home => write!(f, "Home"),
            PlaybackSource::Search => write!(f, "Search"),
            PlaybackSource::Trending => write!(f, "Trending"),
            PlaybackSource::Playlist(name) => write!(f, "Playlist {name}"),
            PlaybackSource::Album(name) => write!(f, "Album {name}"),
            PlaybackSource::Favourites => write!(f, "Favourites"),
            PlaybackSource::RecentlyPlayed => write!(f, "Recently played"),
            PlaybackSource::Downloads => write!(f, "Downloads"),
            PlaybackSource::Share => write!(f, "Share"),
        }
    }
}

/// A song entry. Resolution produces a new value; entries are never patched in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: String,
    #[serde(default)]
    pub artwork: Option<String>,
    #[serde(default)]
    pub stream_url: Option<String>,
    #[serde(default, with = "duration_secs")]
    pub duration: Option<Duration>,
    #[serde(default)]
    pub source: PlaybackSource,
}

impl Track {
    pub fn new(id: impl Into<String>, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            artist: artist.into(),
            artwork: None,
            stream_url: None,
            duration: None,
            source: PlaybackSource::default(),
        }
    }

    pub fn with_source(mut self, source: PlaybackSource) -> Self {
        self.source = source;
        self
    }

    pub fn with_stream_url(mut self, url: impl Into<String>) -> Self {
        self.stream_url = Some(url.into());
        self
    }

    pub fn is_resolved(&self) -> bool {
        self.stream_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Builds the playable version of this entry from a resolver answer.
    ///
    /// Resolver metadata wins when present; the entry's own metadata fills the gaps.
    pub fn resolved_with(&self, song: ResolvedSong) -> Track {
        Track {
            id: self.id.clone(),
            title: song.title.filter(|t| !t.is_empty()).unwrap_or_else(|| self.title.clone()),
            artist: song.artist.filter(|a| !a.is_empty()).unwrap_or_else(|| self.artist.clone()),
            artwork: song.artwork.or_else(|| self.artwork.clone()),
            stream_url: Some(song.stream_url),
            duration: song.duration_hint.or(self.duration),
            source: self.source.clone(),
        }
    }
}

/// Answer from the song resolver for one track identifier.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedSong {
    pub stream_url: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub artwork: Option<String>,
    pub duration_hint: Option<Duration>,
}

impl ResolvedSong {
    pub fn from_url(stream_url: impl Into<String>) -> Self {
        Self {
            stream_url: stream_url.into(),
            title: None,
            artist: None,
            artwork: None,
            duration_hint: None,
        }
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&d.as_secs_f64()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        let secs = Option::<f64>::deserialize(deserializer)?;
        Ok(secs.filter(|s| s.is_finite() && *s >= 0.0).map(Duration::from_secs_f64))
    }
}

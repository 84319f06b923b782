//! Share links such as `vibe://listen?id=abc&title=Song&author=Artist&thumbnail=...`

use url::Url;

use crate::error::{PlayerError, Result};
use crate::model::{PlaybackSource, Track};

const UNKNOWN_ARTIST: &str = "Unknown Artist";

/// Builds the shared track from the link's query parameters. Only `id` is required.
pub fn parse_deep_link(link: &str) -> Result<Track> {
    let url = Url::parse(link).map_err(|e| PlayerError::DeepLink(format!("{link}: {e}")))?;

    let mut id = None;
    let mut title = None;
    let mut author = None;
    let mut thumbnail = None;
    for (key, value) in url.query_pairs() {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "id" => id = Some(value),
            "title" => title = Some(value),
            "author" => author = Some(value),
            "thumbnail" => thumbnail = Some(value),
            _ => {}
        }
    }

    let id = id.ok_or_else(|| PlayerError::DeepLink(format!("{link}: missing id")))?;
    let mut track = Track::new(
        id.clone(),
        title.unwrap_or(id),
        author.unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
    )
    .with_source(PlaybackSource::Share);
    track.artwork = thumbnail;
    Ok(track)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parameters_are_decoded() {
        let track = parse_deep_link(
            "vibe://listen?id=dQw4w9WgXcQ&title=Never%20Gonna&author=Rick%20Astley&thumbnail=https%3A%2F%2Fimg.example%2Fa.jpg",
        )
        .unwrap();

        assert_eq!(track.id, "dQw4w9WgXcQ");
        assert_eq!(track.title, "Never Gonna");
        assert_eq!(track.artist, "Rick Astley");
        assert_eq!(track.artwork.as_deref(), Some("https://img.example/a.jpg"));
        assert_eq!(track.source, PlaybackSource::Share);
        assert!(!track.is_resolved());
    }

    #[test]
    fn only_the_id_is_required() {
        let track = parse_deep_link("vibe://listen?id=abc").unwrap();
        assert_eq!(track.title, "abc");
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.artwork, None);
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(matches!(
            parse_deep_link("vibe://listen?title=Song&id="),
            Err(PlayerError::DeepLink(_))
        ));
        assert!(matches!(parse_deep_link("not a link"), Err(PlayerError::DeepLink(_))));
    }
}

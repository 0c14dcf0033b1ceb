//! Domain types shared by the queue and the playback controller.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A browsable object as described by a media server.
///
/// Entries are immutable once built: replacing state means replacing the entry.
/// Construction goes through [`MediaEntry::item`] / [`MediaEntry::container`]
/// and the `with_*` builders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaEntry {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ref_id: Option<String>,
    #[serde(rename = "parentID")]
    parent_id: String,
    title: String,
    #[serde(default)]
    is_container: bool,
    #[serde(default)]
    upnp_class: String,
    #[serde(default, rename = "res")]
    resource_uri: String,
    #[serde(default)]
    protocol_info: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    genre: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    creator: Option<String>,
    #[serde(default, rename = "albumArtURI", skip_serializing_if = "Option::is_none")]
    album_art_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    track_number: Option<u32>,
}

impl MediaEntry {
    /// Creates a playable item without resource yet.
    pub fn item(id: impl Into<String>, parent_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ref_id: None,
            parent_id: parent_id.into(),
            title: title.into(),
            is_container: false,
            upnp_class: "object.item.audioItem.musicTrack".to_string(),
            resource_uri: String::new(),
            protocol_info: String::new(),
            album: None,
            artist: None,
            genre: None,
            publisher: None,
            creator: None,
            album_art_uri: None,
            track_number: None,
        }
    }

    pub fn container(
        id: impl Into<String>,
        parent_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        Self {
            is_container: true,
            upnp_class: "object.container".to_string(),
            ..Self::item(id, parent_id, title)
        }
    }

    pub fn with_ref_id(mut self, ref_id: impl Into<String>) -> Self {
        self.ref_id = Some(ref_id.into());
        self
    }

    pub fn with_class(mut self, upnp_class: impl Into<String>) -> Self {
        self.upnp_class = upnp_class.into();
        self
    }

    pub fn with_resource(mut self, uri: impl Into<String>, protocol_info: impl Into<String>) -> Self {
        self.resource_uri = uri.into();
        self.protocol_info = protocol_info.into();
        self
    }

    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_genre(mut self, genre: impl Into<String>) -> Self {
        self.genre = Some(genre.into());
        self
    }

    pub fn with_publisher(mut self, publisher: impl Into<String>) -> Self {
        self.publisher = Some(publisher.into());
        self
    }

    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    pub fn with_album_art_uri(mut self, uri: impl Into<String>) -> Self {
        self.album_art_uri = Some(uri.into());
        self
    }

    pub fn with_track_number(mut self, track_number: u32) -> Self {
        self.track_number = Some(track_number);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ref_id(&self) -> Option<&str> {
        self.ref_id.as_deref()
    }

    pub fn parent_id(&self) -> &str {
        &self.parent_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn is_container(&self) -> bool {
        self.is_container
    }

    pub fn upnp_class(&self) -> &str {
        &self.upnp_class
    }

    pub fn resource_uri(&self) -> &str {
        &self.resource_uri
    }

    pub fn protocol_info(&self) -> &str {
        &self.protocol_info
    }

    pub fn album(&self) -> Option<&str> {
        self.album.as_deref()
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn genre(&self) -> Option<&str> {
        self.genre.as_deref()
    }

    pub fn publisher(&self) -> Option<&str> {
        self.publisher.as_deref()
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    pub fn album_art_uri(&self) -> Option<&str> {
        self.album_art_uri.as_deref()
    }

    pub fn track_number(&self) -> Option<u32> {
        self.track_number
    }

    /// True when both entries designate the same server object.
    ///
    /// A reference item (`refID`) is the same object as the item it points to.
    pub fn same_object(&self, other: &MediaEntry) -> bool {
        if self.id == other.id {
            return true;
        }
        match (self.ref_id.as_deref(), other.ref_id.as_deref()) {
            (Some(a), Some(b)) if a == b => true,
            (Some(a), _) if a == other.id => true,
            (_, Some(b)) if b == self.id => true,
            _ => false,
        }
    }
}

/// Transport state as reported by the renderer's AVTransport service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransportState {
    #[default]
    Stopped,
    Playing,
    Paused,
    Transitioning,
    NoMediaPresent,
    Unknown(String),
}

impl TransportState {
    pub fn from_upnp(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "STOPPED" => TransportState::Stopped,
            "PLAYING" => TransportState::Playing,
            "PAUSED_PLAYBACK" | "PAUSED" => TransportState::Paused,
            "TRANSITIONING" => TransportState::Transitioning,
            "NO_MEDIA_PRESENT" => TransportState::NoMediaPresent,
            _ => TransportState::Unknown(state.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TransportState::Stopped => "STOPPED",
            TransportState::Playing => "PLAYING",
            TransportState::Paused => "PAUSED_PLAYBACK",
            TransportState::Transitioning => "TRANSITIONING",
            TransportState::NoMediaPresent => "NO_MEDIA_PRESENT",
            TransportState::Unknown(s) => s,
        }
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Play/pause control as published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    Playing,
    #[default]
    Paused,
}

/// Descriptive metadata of what is currently served. `None` means unknown.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct NowPlaying {
    pub title: Option<String>,
    pub album: Option<String>,
    pub artist: Option<String>,
    pub genre: Option<String>,
    pub publisher: Option<String>,
    pub creator: Option<String>,
    pub album_art_uri: Option<String>,
    pub track_number: Option<u32>,
}

impl NowPlaying {
    pub fn is_empty(&self) -> bool {
        *self == NowPlaying::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_items_are_the_same_object() {
        let original = MediaEntry::item("42", "1", "Song");
        let reference = MediaEntry::item("pl$7", "pl", "Song").with_ref_id("42");
        let other = MediaEntry::item("43", "1", "Other");

        assert!(original.same_object(&reference));
        assert!(reference.same_object(&original));
        assert!(!reference.same_object(&other));
    }

    #[test]
    fn transport_state_parsing() {
        assert_eq!(TransportState::from_upnp("PLAYING"), TransportState::Playing);
        assert_eq!(TransportState::from_upnp(" paused_playback "), TransportState::Paused);
        assert_eq!(
            TransportState::from_upnp("RECORDING"),
            TransportState::Unknown("RECORDING".to_string())
        );
    }

    #[test]
    fn entry_json_uses_upnp_names() {
        let entry = MediaEntry::item("1", "0", "T")
            .with_resource("http://h/1.flac", "http-get:*:audio/flac:*")
            .with_album_art_uri("http://h/1.jpg");
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["parentID"], "0");
        assert_eq!(json["res"], "http://h/1.flac");
        assert_eq!(json["albumArtURI"], "http://h/1.jpg");
        assert!(json.get("album").is_none());
    }
}

use std::sync::Arc;

use crate::confirmation::UriConfirmation;
use crate::model::{ControlState, MediaEntry, NowPlaying, TransportState};
use crate::queue::EntryQueue;
use crate::timer::{DelayedTask, RepeatingTask};

/// Working state of one renderer session. Only ever touched under the
/// controller's session lock.
pub(crate) struct PlaybackSession {
    pub(crate) transport_state: TransportState,
    pub(crate) queue: Arc<EntryQueue>,
    pub(crate) repeat: bool,
    pub(crate) shuffle: bool,
    pub(crate) current_entry: Option<MediaEntry>,
    /// Entry pre-staged with `SetNextAVTransportURI`.
    pub(crate) next_entry: Option<MediaEntry>,
    /// Last URI the renderer reported, decoded.
    pub(crate) now_playing_uri: String,
    /// Set on PLAYING, cleared on STOPPED.
    pub(crate) playing: bool,
    /// The last stop was ours, not the renderer reaching the end of a track.
    pub(crate) player_stopped: bool,
    /// The renderer is believed to play an entry drawn from `queue`.
    pub(crate) playing_queue: bool,
    pub(crate) setting_uri: Option<UriConfirmation>,
    pub(crate) track_duration: u64,
    pub(crate) track_position: u64,
    pub(crate) expected_track_end_millis: i64,
    pub(crate) metadata: NowPlaying,
    pub(crate) control: ControlState,
    pub(crate) position_observed: bool,
    pub(crate) position_task: Option<RepeatingTask>,
    pub(crate) position_generation: u64,
    pub(crate) pause_watchdog: Option<DelayedTask>,
    pub(crate) pause_generation: u64,
    pub(crate) disposed: bool,
}

impl PlaybackSession {
    pub(crate) fn new() -> Self {
        Self {
            transport_state: TransportState::Stopped,
            queue: Arc::new(EntryQueue::new(Vec::new(), "")),
            repeat: false,
            shuffle: false,
            current_entry: None,
            next_entry: None,
            now_playing_uri: String::new(),
            playing: false,
            player_stopped: false,
            playing_queue: false,
            setting_uri: None,
            track_duration: 0,
            track_position: 0,
            expected_track_end_millis: 0,
            metadata: NowPlaying::default(),
            control: ControlState::Paused,
            position_observed: false,
            position_task: None,
            position_generation: 0,
            pause_watchdog: None,
            pause_generation: 0,
            disposed: false,
        }
    }

    pub(crate) fn relative_position(&self) -> Option<u8> {
        if self.track_duration == 0 {
            return None;
        }
        let percent = (self.track_position.min(self.track_duration) * 100) / self.track_duration;
        Some(percent as u8)
    }
}

/// Percent-decodes and trims a URI for comparison purposes.
pub(crate) fn normalize_uri(uri: &str) -> String {
    let trimmed = uri.trim();
    urlencoding::decode(trimmed)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| trimmed.to_string())
}

/// Wall-clock instant (epoch ms) before which a STOPPED cannot be a natural end of track.
pub(crate) fn expected_track_end(now_millis: i64, duration: u64, position: u64, margin_millis: i64) -> i64 {
    let duration = i64::try_from(duration).unwrap_or(i64::MAX);
    let position = i64::try_from(position).unwrap_or(i64::MAX);
    now_millis
        .saturating_add(duration.saturating_sub(position).saturating_mul(1000))
        .saturating_sub(margin_millis)
}

fn is_unknown(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.is_empty() || v.starts_with("Unknown"))
}

fn is_default_art(value: Option<&str>) -> bool {
    value.is_none_or(|v| v.is_empty() || v.contains("DefaultAlbumCover"))
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

/// Metadata to publish after receiving `media`.
///
/// When `media` describes the entry already being served (`is_current`),
/// empty or placeholder values do not overwrite what is known; otherwise every
/// field is taken from `media`, absent ones included.
pub(crate) fn merge_now_playing(known: &NowPlaying, media: &MediaEntry, is_current: bool) -> NowPlaying {
    let mut merged = known.clone();

    if !(is_current && media.title().is_empty()) {
        merged.title = non_empty(Some(media.title()));
    }

    let text_fields: [(&mut Option<String>, Option<&str>); 5] = [
        (&mut merged.album, media.album()),
        (&mut merged.creator, media.creator()),
        (&mut merged.artist, media.artist()),
        (&mut merged.publisher, media.publisher()),
        (&mut merged.genre, media.genre()),
    ];
    for (slot, value) in text_fields {
        if !(is_current && is_unknown(value)) {
            *slot = non_empty(value);
        }
    }

    let art = media.album_art_uri();
    if !(is_current && is_default_art(art)) {
        merged.album_art_uri = if is_default_art(art) {
            None
        } else {
            art.map(str::to_string)
        };
    }

    if !(is_current && media.track_number().is_none()) {
        merged.track_number = media.track_number();
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn known() -> NowPlaying {
        NowPlaying {
            title: Some("So What".into()),
            album: Some("Kind of Blue".into()),
            artist: Some("Miles Davis".into()),
            album_art_uri: Some("http://server/a1.jpg".into()),
            track_number: Some(1),
            ..NowPlaying::default()
        }
    }

    #[test]
    fn sparse_echo_of_current_entry_keeps_known_fields() {
        let echo = MediaEntry::item("0", "-1", "")
            .with_album("Unknown Album")
            .with_album_art_uri("http://renderer/DefaultAlbumCover.png");

        let merged = merge_now_playing(&known(), &echo, true);
        assert_eq!(merged, known());
    }

    #[test]
    fn richer_echo_of_current_entry_fills_in() {
        let echo = MediaEntry::item("0", "-1", "So What").with_genre("Jazz");
        let merged = merge_now_playing(&known(), &echo, true);
        assert_eq!(merged.genre.as_deref(), Some("Jazz"));
        assert_eq!(merged.album.as_deref(), Some("Kind of Blue"));
    }

    #[test]
    fn new_entry_replaces_everything() {
        let other = MediaEntry::item("2", "a", "Freddie Freeloader").with_artist("Miles Davis");
        let merged = merge_now_playing(&known(), &other, false);

        assert_eq!(merged.title.as_deref(), Some("Freddie Freeloader"));
        assert_eq!(merged.album, None);
        assert_eq!(merged.album_art_uri, None);
        assert_eq!(merged.track_number, None);
    }

    #[test]
    fn uris_compare_decoded() {
        assert_eq!(
            normalize_uri(" http://h/My%20Song.flac "),
            normalize_uri("http://h/My Song.flac")
        );
    }

    #[test]
    fn expected_end_subtracts_margin() {
        assert_eq!(expected_track_end(10_000, 200, 50, 2_500), 10_000 + 150_000 - 2_500);
        assert!(expected_track_end(10_000, 0, 0, 2_500) < 10_000);
    }

    #[test]
    fn expected_end_saturates_on_huge_values() {
        assert_eq!(expected_track_end(10_000, u64::MAX, 0, 2_500), i64::MAX - 2_500);
        assert!(expected_track_end(10_000, 0, u64::MAX, 2_500) < 0);
    }

    #[test]
    fn relative_position_needs_duration() {
        let mut session = PlaybackSession::new();
        session.track_position = 30;
        assert_eq!(session.relative_position(), None);
        session.track_duration = 120;
        assert_eq!(session.relative_position(), Some(25));
    }
}

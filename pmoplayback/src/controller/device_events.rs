use std::sync::Arc;

use tracing::{debug, trace};

use super::session::{PlaybackSession, normalize_uri};
use super::{ControllerInner, PendingPlay, now_millis};
use crate::events::PlaybackUpdate;
use crate::model::{ControlState, TransportState};
use crate::queue::Direction;
use crate::time_utils::parse_upnp_time;

impl ControllerInner {
    pub(super) fn handle_device_event(
        self: &Arc<Self>,
        s: &mut PlaybackSession,
        variable: &str,
        value: &str,
    ) -> Option<PendingPlay> {
        match variable {
            "RelTime" | "TrackDuration" | "CurrentTrackDuration" => {
                trace!(variable, value, "Device event")
            }
            _ => debug!(variable, value, "Device event"),
        }

        match variable {
            "TransportState" | "CurrentTransportState" => return self.on_transport_state(s, value),
            "CurrentTrackURI" | "CurrentURI" => self.on_current_uri(s, value),
            "CurrentTrackMetaData" | "CurrentURIMetaData" => self.on_current_metadata(s, value),
            "NextAVTransportURIMetaData" | "NextURIMetaData" => self.on_next_metadata(s, value),
            "TrackDuration" | "CurrentTrackDuration" => self.apply_duration(s, parse_upnp_time(value)),
            "RelTime" => self.apply_position(s, parse_upnp_time(value)),
            _ => trace!(variable, "Ignoring device variable"),
        }
        None
    }

    fn on_transport_state(self: &Arc<Self>, s: &mut PlaybackSession, value: &str) -> Option<PendingPlay> {
        let state = TransportState::from_upnp(value);
        if s.transport_state != state {
            s.transport_state = state.clone();
            self.publish(PlaybackUpdate::TransportStateChanged(state.clone()));
        }

        match state {
            TransportState::Stopped => {
                self.cancel_pause_watchdog(s);
                self.set_control(s, ControlState::Paused);
                self.cancel_position_refresh(s);

                let mut pending = None;
                if s.playing && !s.player_stopped {
                    let now = now_millis();
                    if now < s.expected_track_end_millis {
                        debug!(
                            early_ms = s.expected_track_end_millis - now,
                            "Stopped before expected end of track, ignoring"
                        );
                    } else if s.playing_queue {
                        debug!("End of track, serving next entry");
                        pending = self.serve_next_locked(s);
                    } else {
                        debug!("End of track outside the queue");
                    }
                }
                s.playing = false;
                pending
            }
            TransportState::Playing => {
                s.player_stopped = false;
                s.playing = true;
                self.set_control(s, ControlState::Playing);
                self.schedule_position_refresh(s);
                None
            }
            TransportState::Paused => {
                self.cancel_pause_watchdog(s);
                self.set_control(s, ControlState::Paused);
                None
            }
            _ => None,
        }
    }

    /// Reconciles the URI the renderer reports with what the queue expects.
    fn on_current_uri(&self, s: &mut PlaybackSession, value: &str) {
        if let Some(token) = s.setting_uri.take() {
            token.resolve(true);
        }

        let reported = normalize_uri(value);
        if reported != s.now_playing_uri {
            s.now_playing_uri = reported.clone();
            self.publish(PlaybackUpdate::UriChanged(reported.clone()));
        }

        let current_uri = s
            .current_entry
            .as_ref()
            .map(|entry| normalize_uri(entry.resource_uri()));
        if current_uri.as_deref() == Some(reported.as_str()) {
            return;
        }

        let next_uri = s
            .next_entry
            .as_ref()
            .map(|entry| normalize_uri(entry.resource_uri()));
        // Le passage à l'entrée pré-chargée réactive le suivi de la file
        if next_uri.as_deref() == Some(reported.as_str()) {
            let advanced = s.next_entry.take();
            s.current_entry = s.queue.next();
            s.next_entry = s.queue.peek(Direction::Next);
            trace!(cursor = ?s.queue.cursor(), "Renderer moved to next entry");
            debug!(uri = %reported, "Renderer advanced on its own");

            if let Some(entry) = advanced.or_else(|| s.current_entry.clone()) {
                self.show_entry(s, &entry);
            }
            if let Some(next) = s.next_entry.clone() {
                self.set_next_uri(&next);
            }
            self.set_playing_queue(s, true);
        } else {
            debug!(uri = %reported, "Renderer plays something outside the queue");
            self.set_playing_queue(s, false);
            self.clear_metadata(s);
        }
    }

    fn on_current_metadata(&self, s: &mut PlaybackSession, value: &str) {
        match self.codec.decode(value).into_iter().next() {
            Some(media) => self.update_metadata(s, &media),
            None => self.clear_metadata(s),
        }
    }

    fn on_next_metadata(&self, s: &mut PlaybackSession, value: &str) {
        let value = value.trim();
        if value.is_empty() || value == "NOT_IMPLEMENTED" {
            return;
        }
        if let Some(entry) = self.codec.decode(value).into_iter().next() {
            trace!(entry = entry.id(), "Renderer reported next entry");
            s.next_entry = Some(entry);
        }
    }

    pub(super) fn apply_duration(&self, s: &mut PlaybackSession, duration: Option<u64>) {
        let seconds = duration.unwrap_or(0);
        if s.track_duration != seconds {
            s.track_duration = seconds;
            self.publish(PlaybackUpdate::DurationChanged(duration));
        }
        self.set_expected_track_end(s);
    }

    pub(super) fn apply_position(&self, s: &mut PlaybackSession, position: Option<u64>) {
        s.track_position = position.unwrap_or(0);
        self.publish_position(s);
        self.set_expected_track_end(s);
    }
}

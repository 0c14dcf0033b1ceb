//! Playback state machine for one renderer session.
//!
//! [`PlaybackController`] keeps an [`EntryQueue`] in step with a renderer it
//! drives through AVTransport actions. Three things move independently:
//!
//! - what the controller asked the renderer to play,
//! - the transport state the renderer reports, asynchronously,
//! - the renderer switching on its own to the URI pre-staged with
//!   `SetNextAVTransportURI`.
//!
//! Every mutation of the session goes through one mutex. Actions are invoked
//! with that lock held, so device commands are serialized. The only waits
//! done outside the lock are the bounded URI-confirmation waits of `play`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded, select};
use tracing::{debug, info, trace, warn};

use crate::confirmation::UriConfirmation;
use crate::didl::{DidlLiteCodec, MetadataCodec};
use crate::errors::{PlaybackError, Result};
use crate::events::{DeviceEventBus, PlaybackEventBus, PlaybackUpdate};
use crate::invoker::{ActionInvoker, AvTransportClient};
use crate::model::{ControlState, MediaEntry, NowPlaying, TransportState};
use crate::persistence::{Favorite, FavoriteStore, Store};
use crate::queue::{Direction, EntryQueue};
use crate::settings::PlaybackSettings;
use crate::timer::{DelayedTask, RepeatingTask};

mod device_events;
mod session;

use session::{PlaybackSession, expected_track_end, merge_now_playing, normalize_uri};

/// A `Play` to issue once the URI it depends on is confirmed.
#[must_use]
pub(crate) struct PendingPlay {
    token: Option<UriConfirmation>,
}

pub(crate) struct ControllerInner {
    transport: AvTransportClient,
    codec: Arc<dyn MetadataCodec>,
    settings: PlaybackSettings,
    session: Mutex<PlaybackSession>,
    updates: PlaybackEventBus,
    event_loop: Mutex<Option<Sender<()>>>,
}

/// Handle on a playback session. Clones share the session.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<ControllerInner>,
}

impl PlaybackController {
    pub fn new(invoker: Arc<dyn ActionInvoker>, settings: PlaybackSettings) -> Self {
        Self::with_codec(invoker, Arc::new(DidlLiteCodec), settings)
    }

    pub fn with_codec(
        invoker: Arc<dyn ActionInvoker>,
        codec: Arc<dyn MetadataCodec>,
        settings: PlaybackSettings,
    ) -> Self {
        let transport = AvTransportClient::new(invoker, settings.instance_id);
        Self {
            inner: Arc::new(ControllerInner {
                transport,
                codec,
                settings,
                session: Mutex::new(PlaybackSession::new()),
                updates: PlaybackEventBus::new(),
                event_loop: Mutex::new(None),
            }),
        }
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.inner.settings
    }

    /// Stream of state changes for display layers.
    pub fn subscribe(&self) -> Receiver<PlaybackUpdate> {
        self.inner.updates.subscribe()
    }

    /// Feeds every event published on `bus` to [`PlaybackController::on_device_event`]
    /// from a dedicated thread. Attaching again replaces the previous feed.
    pub fn attach(&self, bus: &DeviceEventBus) -> Result<()> {
        let events = bus.subscribe();
        let (shutdown_tx, shutdown_rx) = bounded::<()>(0);
        let weak = Arc::downgrade(&self.inner);

        thread::Builder::new()
            .name("playback-events".into())
            .spawn(move || run_event_loop(weak, events, shutdown_rx))?;

        let previous = self
            .inner
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(shutdown_tx);
        drop(previous);
        Ok(())
    }

    /// Single entry point for renderer state variables.
    pub fn on_device_event(&self, variable: &str, value: &str) {
        let pending = {
            let mut s = self.inner.lock();
            if s.disposed {
                return;
            }
            self.inner.handle_device_event(&mut s, variable, value)
        };
        if let Some(pending) = pending {
            self.inner.spawn_pending_play(pending);
        }
    }

    /// Installs a new queue.
    ///
    /// While something plays, the queue's first entry is pre-staged as next so
    /// playback flows into it. Otherwise the queue is rewound and its first
    /// entry staged as current, without playing.
    pub fn register_queue(&self, queue: EntryQueue) -> Result<()> {
        let mut s = self.inner.lock();
        ensure_active(&s)?;
        debug!(source = queue.source_tag(), entries = queue.size(), "Registering queue");

        queue.set_repeat(s.repeat);
        queue.set_shuffle(s.shuffle);
        s.queue = Arc::new(queue);

        if s.playing {
            trace!("Still playing, staging new queue as next entry");
            s.next_entry = s.queue.peek(Direction::Next);
            if let Some(next) = s.next_entry.clone() {
                self.inner.set_next_uri(&next);
            }
        } else {
            self.inner.reset_to_start(&mut s);
        }
        Ok(())
    }

    /// Starts playback once the pending `SetAVTransportURI`, if any, is confirmed.
    ///
    /// The wait is bounded by the response timeout; on timeout the renderer is
    /// asked to play anyway. A superseded URI cancels the request.
    pub fn play(&self) -> Result<()> {
        let token = {
            let s = self.inner.lock();
            ensure_active(&s)?;
            s.setting_uri.clone()
        };
        self.inner.play_after(token)
    }

    pub fn pause(&self) -> Result<()> {
        let mut s = self.inner.lock();
        ensure_active(&s)?;
        self.inner.set_control(&mut s, ControlState::Paused);
        self.inner.arm_pause_watchdog(&mut s);
        self.inner.transport.pause().inspect_err(|err| {
            warn!(error = %err, "Pause failed");
        })
    }

    pub fn stop(&self) -> Result<()> {
        let mut s = self.inner.lock();
        ensure_active(&s)?;
        self.inner.set_control(&mut s, ControlState::Paused);
        let result = self.inner.stop_locked(&mut s);
        s.track_position = 0;
        self.inner.publish_position(&s);
        result
    }

    /// Serves the next queue entry, rewinding to the start when there is none.
    pub fn serve_next(&self) -> Result<()> {
        let pending = {
            let mut s = self.inner.lock();
            ensure_active(&s)?;
            self.inner.serve_next_locked(&mut s)
        };
        self.inner.finish(pending)
    }

    /// Serves the previous queue entry, rewinding to the start when there is none.
    pub fn serve_previous(&self) -> Result<()> {
        let pending = {
            let mut s = self.inner.lock();
            ensure_active(&s)?;
            self.inner.serve_previous_locked(&mut s)
        };
        self.inner.finish(pending)
    }

    pub fn next(&self) -> Result<()> {
        self.serve_next()
    }

    pub fn previous(&self) -> Result<()> {
        self.serve_previous()
    }

    pub fn set_repeat(&self, repeat: bool) -> Result<()> {
        let mut s = self.inner.lock();
        ensure_active(&s)?;
        s.repeat = repeat;
        s.queue.set_repeat(repeat);
        self.inner.publish(PlaybackUpdate::RepeatChanged(repeat));
        self.inner.restage_next(&mut s);
        Ok(())
    }

    /// Switches shuffle; when nothing plays the queue is rewound and re-staged.
    pub fn set_shuffle(&self, shuffle: bool) -> Result<()> {
        let mut s = self.inner.lock();
        ensure_active(&s)?;
        s.shuffle = shuffle;
        s.queue.set_shuffle(shuffle);
        self.inner.publish(PlaybackUpdate::ShuffleChanged(shuffle));
        if s.playing {
            self.inner.restage_next(&mut s);
        } else {
            self.inner.reset_to_start(&mut s);
        }
        Ok(())
    }

    /// Seeks to `position` seconds, clamped to the track duration when known.
    pub fn seek(&self, position: u64) -> Result<()> {
        let s = self.inner.lock();
        ensure_active(&s)?;
        let target = clamp_to_duration(position, s.track_duration);
        self.inner.seek_locked(target)
    }

    /// Seeks to `percent` of the known duration.
    pub fn seek_percent(&self, percent: u8) -> Result<()> {
        let s = self.inner.lock();
        ensure_active(&s)?;
        let target = u64::from(percent.min(100)) * s.track_duration / 100;
        self.inner.seek_locked(target)
    }

    pub fn fast_forward(&self) -> Result<()> {
        let s = self.inner.lock();
        ensure_active(&s)?;
        let target = clamp_to_duration(
            s.track_position + self.inner.settings.seek_step_secs,
            s.track_duration,
        );
        self.inner.seek_locked(target)
    }

    pub fn rewind(&self) -> Result<()> {
        let s = self.inner.lock();
        ensure_active(&s)?;
        let target = s
            .track_position
            .saturating_sub(self.inner.settings.seek_step_secs);
        self.inner.seek_locked(target)
    }

    /// Plays an arbitrary URI outside the queue.
    pub fn play_uri(&self, uri: &str) -> Result<()> {
        let token = {
            let mut s = self.inner.lock();
            ensure_active(&s)?;
            self.inner.set_current_uri(&mut s, uri, "")?;
            s.setting_uri.clone()
        };
        self.inner.play_after(token)
    }

    /// Bookmarks what the renderer currently plays under `name`.
    pub fn save_favorite(&self, name: &str, store: &dyn FavoriteStore) -> Result<()> {
        let favorite = {
            let s = self.inner.lock();
            if s.now_playing_uri.is_empty() {
                return Err(PlaybackError::NothingPlaying);
            }
            Favorite {
                name: name.to_string(),
                uri: s.now_playing_uri.clone(),
                entry: s.current_entry.clone(),
            }
        };
        store.save_favorite(&favorite)?;
        info!(favorite = name, uri = %favorite.uri, "Favorite saved");
        Ok(())
    }

    pub fn play_favorite(&self, name: &str, store: &dyn FavoriteStore) -> Result<()> {
        let favorite = store.load_favorite(name)?;
        if favorite.uri.is_empty() {
            debug!(favorite = name, "Favorite has no URI");
            return Ok(());
        }
        let metadata = favorite
            .entry
            .as_ref()
            .map(|entry| self.inner.codec.encode(entry))
            .unwrap_or_default();

        let token = {
            let mut s = self.inner.lock();
            ensure_active(&s)?;
            self.inner.set_current_uri(&mut s, &favorite.uri, &metadata)?;
            s.setting_uri.clone()
        };
        self.inner.play_after(token)
    }

    pub fn delete_favorite(&self, name: &str, store: &dyn FavoriteStore) -> Result<()> {
        store.delete_favorite(name)
    }

    pub fn favorites(&self, store: &dyn FavoriteStore) -> Result<Vec<String>> {
        store.list_favorites()
    }

    /// Persists the registered queue.
    pub fn save_queue(&self, name: &str, append: bool, store: &dyn Store) -> Result<()> {
        let queue = self.queue();
        queue.save(name, append, store)
    }

    /// Loads a saved queue and registers it.
    pub fn restore_queue(&self, name: &str, source_filter: Option<&str>, store: &dyn Store) -> Result<()> {
        let queue = EntryQueue::load(name, source_filter, store)?;
        self.register_queue(queue)
    }

    pub fn playlists(&self, store: &dyn Store) -> Result<Vec<String>> {
        store.list()
    }

    pub fn delete_playlist(&self, name: &str, store: &dyn Store) -> Result<()> {
        store.delete(name)
    }

    /// Whether something displays the track position. When nobody does, the
    /// position is fetched once per PLAYING instead of polled.
    pub fn set_position_observed(&self, observed: bool) {
        let mut s = self.inner.lock();
        if s.position_observed == observed || s.disposed {
            return;
        }
        s.position_observed = observed;
        if observed && s.transport_state == TransportState::Playing {
            self.inner.schedule_position_refresh(&mut s);
        } else if !observed {
            s.position_task = None;
            s.position_generation += 1;
        }
    }

    /// Tears the session down: timers are cancelled, a pending confirmation is
    /// resolved negatively and the event feed is detached.
    pub fn dispose(&self) {
        {
            let mut s = self.inner.lock();
            if s.disposed {
                return;
            }
            s.disposed = true;
            s.position_task = None;
            s.position_generation += 1;
            s.pause_watchdog = None;
            s.pause_generation += 1;
            if let Some(token) = s.setting_uri.take() {
                token.resolve(false);
            }
        }
        self.inner
            .event_loop
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        debug!("Playback session disposed");
    }

    pub fn queue(&self) -> Arc<EntryQueue> {
        Arc::clone(&self.inner.lock().queue)
    }

    pub fn transport_state(&self) -> TransportState {
        self.inner.lock().transport_state.clone()
    }

    pub fn now_playing(&self) -> NowPlaying {
        self.inner.lock().metadata.clone()
    }

    pub fn now_playing_uri(&self) -> String {
        self.inner.lock().now_playing_uri.clone()
    }

    pub fn current_entry(&self) -> Option<MediaEntry> {
        self.inner.lock().current_entry.clone()
    }

    pub fn next_entry(&self) -> Option<MediaEntry> {
        self.inner.lock().next_entry.clone()
    }

    /// Seconds into the current track.
    pub fn track_position(&self) -> u64 {
        self.inner.lock().track_position
    }

    /// Track length in seconds, 0 when unknown.
    pub fn track_duration(&self) -> u64 {
        self.inner.lock().track_duration
    }

    pub fn control_state(&self) -> ControlState {
        self.inner.lock().control
    }

    pub fn is_playing(&self) -> bool {
        self.inner.lock().playing
    }

    pub fn is_tracking_queue(&self) -> bool {
        self.inner.lock().playing_queue
    }

    pub fn repeat(&self) -> bool {
        self.inner.lock().repeat
    }

    pub fn shuffle(&self) -> bool {
        self.inner.lock().shuffle
    }
}

fn ensure_active(s: &PlaybackSession) -> Result<()> {
    if s.disposed {
        return Err(PlaybackError::Disposed);
    }
    Ok(())
}

fn clamp_to_duration(position: u64, duration: u64) -> u64 {
    if duration > 0 {
        position.min(duration)
    } else {
        position
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn run_event_loop(
    inner: Weak<ControllerInner>,
    events: Receiver<crate::events::DeviceEvent>,
    shutdown: Receiver<()>,
) {
    loop {
        select! {
            recv(events) -> event => {
                let Ok(event) = event else { break };
                let Some(inner) = inner.upgrade() else { break };
                PlaybackController { inner }.on_device_event(&event.variable, &event.value);
            }
            recv(shutdown) -> _ => break,
        }
    }
    debug!("Playback event loop exiting");
}

impl ControllerInner {
    fn lock(&self) -> MutexGuard<'_, PlaybackSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, update: PlaybackUpdate) {
        self.updates.broadcast(update);
    }

    fn publish_position(&self, s: &PlaybackSession) {
        self.publish(PlaybackUpdate::PositionChanged {
            position: s.track_position,
            percent: s.relative_position(),
        });
    }

    fn set_control(&self, s: &mut PlaybackSession, control: ControlState) {
        if s.control != control {
            s.control = control;
            self.publish(PlaybackUpdate::ControlChanged(control));
        }
    }

    fn set_playing_queue(&self, s: &mut PlaybackSession, tracking: bool) {
        if s.playing_queue != tracking {
            s.playing_queue = tracking;
            self.publish(PlaybackUpdate::QueueTrackingChanged(tracking));
        }
    }

    fn set_metadata(&self, s: &mut PlaybackSession, metadata: NowPlaying) {
        if s.metadata != metadata {
            s.metadata = metadata.clone();
            self.publish(PlaybackUpdate::MetadataChanged(metadata));
        }
    }

    /// Metadata for a new entry: every field replaced.
    fn show_entry(&self, s: &mut PlaybackSession, entry: &MediaEntry) {
        let metadata = merge_now_playing(&s.metadata, entry, false);
        self.set_metadata(s, metadata);
    }

    /// Metadata echoed by the renderer, which may describe the entry already shown.
    fn update_metadata(&self, s: &mut PlaybackSession, media: &MediaEntry) {
        let served_uri = if s.playing_queue {
            s.current_entry
                .as_ref()
                .map(|entry| normalize_uri(entry.resource_uri()))
                .unwrap_or_default()
        } else {
            String::new()
        };
        let is_current = normalize_uri(media.resource_uri()) == served_uri;
        trace!(id = media.id(), is_current, "Updating metadata");

        let metadata = merge_now_playing(&s.metadata, media, is_current);
        self.set_metadata(s, metadata);
    }

    fn clear_metadata(&self, s: &mut PlaybackSession) {
        self.set_metadata(s, NowPlaying::default());
    }

    fn clear_current_entry(&self, s: &mut PlaybackSession) {
        self.clear_metadata(s);
        s.track_duration = 0;
        s.track_position = 0;
        self.publish(PlaybackUpdate::DurationChanged(None));
        self.publish_position(s);
        s.current_entry = None;
    }

    /// Issues `SetAVTransportURI`.
    ///
    /// A new confirmation token replaces (and cancels) the previous one, except
    /// when the URI is the one already playing: renderers do not always
    /// re-announce an unchanged URI, so there would be nothing to wait for.
    fn set_current_uri(&self, s: &mut PlaybackSession, uri: &str, metadata: &str) -> Result<()> {
        let uri = uri.trim();
        if normalize_uri(uri) != s.now_playing_uri {
            if let Some(previous) = s.setting_uri.take() {
                previous.resolve(false);
            }
            s.setting_uri = Some(UriConfirmation::new());
        } else {
            debug!(uri, "New URI is the one already playing");
        }

        self.transport
            .set_av_transport_uri(uri, metadata)
            .inspect_err(|err| {
                warn!(uri, error = %err, "SetAVTransportURI failed");
                if let Some(token) = s.setting_uri.take() {
                    token.resolve(false);
                }
            })
    }

    fn set_next_uri(&self, entry: &MediaEntry) {
        if entry.resource_uri().is_empty() {
            return;
        }
        let metadata = self.codec.encode(entry);
        if let Err(err) = self
            .transport
            .set_next_av_transport_uri(entry.resource_uri(), &metadata)
        {
            warn!(entry = entry.id(), error = %err, "SetNextAVTransportURI failed");
        }
    }

    /// Recomputes and pre-stages the next entry after a navigation mode change.
    fn restage_next(&self, s: &mut PlaybackSession) {
        if !(s.playing && s.playing_queue) {
            return;
        }
        let next = s.queue.peek(Direction::Next);
        if next != s.next_entry {
            s.next_entry = next;
            if let Some(next) = s.next_entry.clone() {
                self.set_next_uri(&next);
            }
        }
    }

    fn stop_locked(&self, s: &mut PlaybackSession) -> Result<()> {
        s.player_stopped = true;
        self.transport.stop().inspect_err(|err| {
            warn!(error = %err, "Stop failed, assuming renderer stopped");
            s.playing = false;
        })
    }

    fn seek_locked(&self, position: u64) -> Result<()> {
        debug!(position, "Seeking");
        self.transport.seek(position).inspect_err(|err| {
            warn!(position, error = %err, "Seek failed");
        })
    }

    fn play_after(&self, token: Option<UriConfirmation>) -> Result<()> {
        if let Some(token) = token {
            match token.wait(self.settings.response_timeout) {
                Some(true) => {}
                Some(false) => {
                    debug!("Cannot play, setting URI was cancelled");
                    return Ok(());
                }
                None => {
                    warn!(
                        timeout_ms = self.settings.response_timeout.as_millis() as u64,
                        "URI not confirmed by renderer, trying to play anyway"
                    );
                }
            }
        }

        let s = self.lock();
        ensure_active(&s)?;
        self.transport.play().inspect_err(|err| {
            warn!(error = %err, "Play failed");
        })
    }

    fn finish(&self, pending: Option<PendingPlay>) -> Result<()> {
        match pending {
            Some(pending) => self.play_after(pending.token),
            None => Ok(()),
        }
    }

    /// Plays from a worker thread so that the event loop stays free to deliver
    /// the confirmation the play waits for.
    fn spawn_pending_play(self: &Arc<Self>, pending: PendingPlay) {
        let inner = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name("playback-advance".into())
            .spawn(move || {
                if let Err(err) = inner.play_after(pending.token) {
                    debug!(error = %err, "Deferred play not issued");
                }
            });
        if let Err(err) = spawned {
            warn!(error = %err, "Cannot spawn playback thread");
        }
    }

    /// Rewinds the queue and stages its first entry as current, without playing.
    fn reset_to_start(&self, s: &mut PlaybackSession) {
        s.playing = false;
        let _ = self.stop_locked(s);

        s.queue.reset();
        s.current_entry = s.queue.next();
        s.next_entry = s.queue.peek(Direction::Next);
        trace!(cursor = ?s.queue.cursor(), "Queue reset to start");

        match s.current_entry.clone() {
            Some(entry) => {
                self.show_entry(s, &entry);
                let metadata = self.codec.encode(&entry);
                let _ = self.set_current_uri(s, entry.resource_uri(), &metadata);
                self.set_playing_queue(s, true);
            }
            None => self.clear_current_entry(s),
        }
    }

    fn serve_next_locked(&self, s: &mut PlaybackSession) -> Option<PendingPlay> {
        if !s.queue.has_next() {
            debug!("End of queue, rewinding");
            self.reset_to_start(s);
            return None;
        }
        s.current_entry = s.queue.next();
        s.next_entry = s.queue.peek(Direction::Next);
        trace!(cursor = ?s.queue.cursor(), "Serve next");
        self.serve(s)
    }

    fn serve_previous_locked(&self, s: &mut PlaybackSession) -> Option<PendingPlay> {
        if !s.queue.has_previous() {
            debug!("Start of queue, rewinding");
            self.reset_to_start(s);
            return None;
        }
        s.current_entry = s.queue.previous();
        s.next_entry = s.queue.peek(Direction::Next);
        trace!(cursor = ?s.queue.cursor(), "Serve previous");
        self.serve(s)
    }

    /// Stages the current entry. When a track is playing, the next entry is
    /// pre-staged too and a play is returned for the caller to complete.
    fn serve(&self, s: &mut PlaybackSession) -> Option<PendingPlay> {
        let entry = s.current_entry.clone()?;
        debug!(entry = entry.id(), title = entry.title(), "Serving entry");
        self.show_entry(s, &entry);

        if entry.resource_uri().is_empty() {
            debug!(entry = entry.id(), "Cannot serve entry without URI");
            self.set_playing_queue(s, true);
            return None;
        }

        let metadata = self.codec.encode(&entry);
        let staged = self
            .set_current_uri(s, entry.resource_uri(), &metadata)
            .is_ok();

        let mut pending = None;
        if staged && s.playing {
            s.track_duration = 0;
            s.track_position = 0;
            s.expected_track_end_millis = 0;
            pending = Some(PendingPlay {
                token: s.setting_uri.clone(),
            });
            if let Some(next) = s.next_entry.clone() {
                self.set_next_uri(&next);
            }
        }

        self.set_playing_queue(s, true);
        pending
    }

    fn arm_pause_watchdog(self: &Arc<Self>, s: &mut PlaybackSession) {
        s.pause_generation += 1;
        let generation = s.pause_generation;
        let weak = Arc::downgrade(self);

        let task = DelayedTask::spawn("playback-pause-check", self.settings.response_timeout, move || {
            let Some(inner) = weak.upgrade() else { return };
            let mut s = inner.lock();
            if s.disposed || s.pause_generation != generation {
                return;
            }
            debug!("Renderer did not pause, reverting control to playing");
            s.pause_watchdog = None;
            inner.set_control(&mut s, ControlState::Playing);
        });

        match task {
            Ok(task) => s.pause_watchdog = Some(task),
            Err(err) => warn!(error = %err, "Cannot spawn pause watchdog"),
        }
    }

    fn cancel_pause_watchdog(&self, s: &mut PlaybackSession) {
        s.pause_watchdog = None;
        s.pause_generation += 1;
    }

    fn schedule_position_refresh(self: &Arc<Self>, s: &mut PlaybackSession) {
        self.cancel_position_refresh(s);

        if !s.position_observed {
            // One read is enough to learn where the track is expected to end.
            self.poll_position(s);
            return;
        }

        let generation = s.position_generation;
        let weak = Arc::downgrade(self);
        let task = RepeatingTask::spawn(
            "playback-position",
            self.settings.position_poll_interval,
            move || {
                let Some(inner) = weak.upgrade() else { return };
                let mut s = inner.lock();
                if s.disposed || s.position_generation != generation {
                    return;
                }
                inner.poll_position(&mut s);
            },
        );

        match task {
            Ok(task) => s.position_task = Some(task),
            Err(err) => warn!(error = %err, "Cannot spawn position refresh"),
        }
    }

    fn cancel_position_refresh(&self, s: &mut PlaybackSession) {
        s.position_task = None;
        s.position_generation += 1;
        s.track_position = 0;
        self.publish_position(s);
    }

    fn poll_position(&self, s: &mut PlaybackSession) {
        match self.transport.get_position_info() {
            Ok(info) => {
                if info.track_duration.is_some() {
                    self.apply_duration(s, info.duration_secs());
                }
                if info.rel_time.is_some() {
                    self.apply_position(s, info.position_secs());
                }
            }
            Err(err) => debug!(error = %err, "GetPositionInfo failed"),
        }
    }

    fn set_expected_track_end(&self, s: &mut PlaybackSession) {
        s.expected_track_end_millis = expected_track_end(
            now_millis(),
            s.track_duration,
            s.track_position,
            self.settings.response_timeout.as_millis() as i64,
        );
    }
}

//! Plays a short queue on an in-process renderer simulation.
//!
//! The simulated renderer answers AVTransport actions and publishes the state
//! variables a real device would notify: it confirms URIs, moves on its own to
//! the pre-staged next URI at the end of a track and stops at the end of the
//! queue.
//!
//! ```text
//! RUST_LOG=pmoplayback=debug cargo run -p pmoplayback --example simulated_renderer
//! ```

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use pmoplayback::{
    ActionArgs, ActionInvoker, ActionOutputs, DeviceEventBus, EntryQueue, MediaEntry,
    PlaybackConfigExt, PlaybackController, PlaybackUpdate,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const TRACK_LENGTH: Duration = Duration::from_secs(3);
const TRACK_DURATION: &str = "0:00:03";

#[derive(Default)]
struct RendererState {
    current: Option<String>,
    next: Option<String>,
    generation: u64,
}

struct Shared {
    bus: DeviceEventBus,
    state: Mutex<RendererState>,
}

impl Shared {
    fn start_track(self: &Arc<Self>, generation: u64) {
        self.bus.publish("TransportState", "PLAYING");
        self.bus.publish("TrackDuration", TRACK_DURATION);

        let shared = Arc::clone(self);
        thread::spawn(move || {
            thread::sleep(TRACK_LENGTH);
            shared.end_of_track(generation);
        });
    }

    fn end_of_track(self: &Arc<Self>, generation: u64) {
        let mut state = self.state.lock().unwrap();
        if state.generation != generation {
            return;
        }
        match state.next.take() {
            Some(next) => {
                state.current = Some(next.clone());
                drop(state);
                self.bus.publish("CurrentTrackURI", &next);
                self.start_track(generation);
            }
            None => {
                drop(state);
                self.bus.publish("TransportState", "STOPPED");
            }
        }
    }
}

struct SimulatedRenderer {
    shared: Arc<Shared>,
}

impl SimulatedRenderer {
    fn new(bus: DeviceEventBus) -> Self {
        Self {
            shared: Arc::new(Shared {
                bus,
                state: Mutex::new(RendererState::default()),
            }),
        }
    }
}

impl ActionInvoker for SimulatedRenderer {
    fn invoke(&self, _service_id: &str, action_id: &str, args: &ActionArgs) -> pmoplayback::Result<ActionOutputs> {
        let bus = &self.shared.bus;
        let mut state = self.shared.state.lock().unwrap();

        match action_id {
            "SetAVTransportURI" => {
                let uri = args.get("CurrentURI").cloned().unwrap_or_default();
                state.current = Some(uri.clone());
                state.next = None;
                bus.publish("CurrentTrackURI", &uri);
                if let Some(metadata) = args.get("CurrentURIMetaData") {
                    bus.publish("CurrentTrackMetaData", metadata);
                }
            }
            "SetNextAVTransportURI" => {
                state.next = args.get("NextURI").cloned();
            }
            "Play" => {
                state.generation += 1;
                let generation = state.generation;
                drop(state);
                self.shared.start_track(generation);
            }
            "Stop" => {
                state.generation += 1;
                bus.publish("TransportState", "STOPPED");
            }
            "Pause" => {
                state.generation += 1;
                bus.publish("TransportState", "PAUSED_PLAYBACK");
            }
            "GetPositionInfo" => {
                return Ok(ActionOutputs::from([
                    ("TrackDuration".to_string(), TRACK_DURATION.to_string()),
                    ("RelTime".to_string(), "0:00:00".to_string()),
                ]));
            }
            _ => {}
        }
        Ok(ActionOutputs::new())
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pmoplayback={default_level}")));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn demo_queue() -> EntryQueue {
    let titles = ["So What", "Freddie Freeloader", "Blue in Green", "All Blues"];
    let entries = titles
        .iter()
        .enumerate()
        .map(|(i, title)| {
            let n = i as u32 + 1;
            MediaEntry::item(format!("kob-{n}"), "kind-of-blue", *title)
                .with_artist("Miles Davis")
                .with_album("Kind of Blue")
                .with_track_number(n)
                .with_resource(format!("http://localhost/kob/{n}.flac"), "http-get:*:audio/flac:*")
        })
        .collect();
    EntryQueue::new(entries, "demo")
}

fn main() -> Result<()> {
    let settings = pmosettings::get_settings();
    init_tracing(&settings.get_log_min_level()?);

    let bus = DeviceEventBus::new();
    let renderer = Arc::new(SimulatedRenderer::new(bus.clone()));
    let controller = PlaybackController::new(renderer, settings.playback_settings()?);
    let updates = controller.subscribe();
    controller.attach(&bus)?;

    controller.register_queue(demo_queue())?;
    controller.play()?;

    // Le renderer se tait une fois la file terminée
    while let Ok(update) = updates.recv_timeout(TRACK_LENGTH * 2) {
        match update {
            PlaybackUpdate::MetadataChanged(now) => info!(
                title = now.title.as_deref().unwrap_or("-"),
                track = ?now.track_number,
                "Now playing"
            ),
            PlaybackUpdate::TransportStateChanged(state) => info!(%state, "Transport"),
            PlaybackUpdate::QueueTrackingChanged(tracking) => info!(tracking, "Queue tracking"),
            _ => {}
        }
    }

    match settings.playback_store() {
        Ok(store) => controller.save_queue("simulated-renderer", false, &store)?,
        Err(err) => warn!(error = %err, "No playlist store"),
    }
    controller.dispose();
    info!("Done");
    Ok(())
}

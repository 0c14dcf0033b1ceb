use std::sync::{Arc, Mutex, PoisonError};

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::model::{ControlState, NowPlaying, TransportState};

/// State variable change notified by the renderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEvent {
    pub variable: String,
    pub value: String,
}

impl DeviceEvent {
    pub fn new(variable: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            value: value.into(),
        }
    }
}

/// What the controller publishes to observers (UI channels and the like).
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackUpdate {
    TransportStateChanged(TransportState),
    ControlChanged(ControlState),
    MetadataChanged(NowPlaying),
    UriChanged(String),
    /// Seconds into the track, and the same as a percentage when the duration is known.
    PositionChanged {
        position: u64,
        percent: Option<u8>,
    },
    DurationChanged(Option<u64>),
    RepeatChanged(bool),
    ShuffleChanged(bool),
    QueueTrackingChanged(bool),
}

/// Fan-out channel: every subscriber gets every event, dead subscribers are dropped.
#[derive(Debug)]
pub struct EventBus<E> {
    subscribers: Arc<Mutex<Vec<Sender<E>>>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            subscribers: Arc::clone(&self.subscribers),
        }
    }
}

impl<E> Default for EventBus<E> {
    fn default() -> Self {
        Self {
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl<E: Clone> EventBus<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<E> {
        let (tx, rx) = unbounded::<E>();
        {
            let mut subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers.push(tx);
        }
        rx
    }

    pub fn broadcast(&self, event: E) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

pub type DeviceEventBus = EventBus<DeviceEvent>;
pub type PlaybackEventBus = EventBus<PlaybackUpdate>;

impl EventBus<DeviceEvent> {
    /// Convenience for transport layers delivering `(variable, value)` pairs.
    pub fn publish(&self, variable: &str, value: &str) {
        self.broadcast(DeviceEvent::new(variable, value));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_subscriber_receives_events() {
        let bus = DeviceEventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish("TransportState", "PLAYING");

        assert_eq!(a.try_recv().unwrap(), DeviceEvent::new("TransportState", "PLAYING"));
        assert_eq!(b.try_recv().unwrap().value, "PLAYING");
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let bus = PlaybackEventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.broadcast(PlaybackUpdate::RepeatChanged(true));
        bus.broadcast(PlaybackUpdate::RepeatChanged(false));

        assert_eq!(kept.len(), 2);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }
}

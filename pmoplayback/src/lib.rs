//! # pmoplayback - Lecture pilotée par file d'attente sur un MediaRenderer UPnP
//!
//! Cette crate garde une file d'attente locale synchronisée avec l'état de
//! transport d'un renderer distant piloté par actions AVTransport :
//! - File d'attente avec curseur, répétition et lecture aléatoire
//! - Pré-chargement du morceau suivant (`SetNextAVTransportURI`)
//! - Réconciliation avec les changements d'URI annoncés par le renderer
//! - Sauvegarde et restauration des files et des favoris
//!
//! # Architecture
//!
//! - **EntryQueue** : file d'entrées et navigation (suivant, précédent, aléatoire)
//! - **PlaybackController** : machine d'état d'une session de lecture
//! - **ActionInvoker** : envoi des actions au renderer (transport fourni par l'appelant)
//! - **DeviceEventBus** : événements `(variable, valeur)` émis par le renderer
//! - **Store / FavoriteStore** : persistance (`MemoryStore`, `JsonDirStore`)
//!
//! # Exemple d'utilisation
//!
//! ```no_run
//! use std::sync::Arc;
//! use pmoplayback::{
//!     ActionArgs, ActionOutputs, DeviceEventBus, EntryQueue, MediaEntry, PlaybackController,
//!     PlaybackSettings,
//! };
//!
//! # fn main() -> pmoplayback::Result<()> {
//! let invoker = |_service: &str, _action: &str, _args: &ActionArgs| {
//!     Ok::<_, pmoplayback::PlaybackError>(ActionOutputs::new())
//! };
//! let controller = PlaybackController::new(Arc::new(invoker), PlaybackSettings::default());
//!
//! let events = DeviceEventBus::new();
//! controller.attach(&events)?;
//!
//! let tracks = vec![
//!     MediaEntry::item("t1", "album", "So What").with_resource("http://server/t1.flac", ""),
//!     MediaEntry::item("t2", "album", "Blue in Green").with_resource("http://server/t2.flac", ""),
//! ];
//! controller.register_queue(EntryQueue::new(tracks, "library"))?;
//! controller.play()?;
//! # Ok(())
//! # }
//! ```

pub mod confirmation;
pub mod controller;
pub mod didl;
pub mod errors;
pub mod events;
pub mod invoker;
pub mod model;
pub mod persistence;
pub mod queue;
pub mod settings;
pub mod time_utils;
pub mod timer;

#[cfg(feature = "pmosettings")]
mod config_ext;

// Réexports publics
pub use confirmation::UriConfirmation;
pub use controller::PlaybackController;
pub use didl::{DidlLiteCodec, MetadataCodec};
pub use errors::{PlaybackError, Result};
pub use events::{DeviceEvent, DeviceEventBus, EventBus, PlaybackEventBus, PlaybackUpdate};
pub use invoker::{AVTRANSPORT_SERVICE, ActionArgs, ActionInvoker, ActionOutputs, AvTransportClient, PositionInfo};
pub use model::{ControlState, MediaEntry, NowPlaying, TransportState};
pub use persistence::{Favorite, FavoriteStore, JsonDirStore, MemoryStore, PlaylistData, Store};
pub use queue::{Direction, EntryQueue};
pub use settings::PlaybackSettings;

#[cfg(feature = "pmosettings")]
pub use config_ext::PlaybackConfigExt;

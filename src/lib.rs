//! Client bindings for the MPRIS D-Bus interfaces.
//!
//! [`MprisClient`] sends commands to media players registered under `org.mpris.MediaPlayer2.*`
//! and subscribes to the signals they broadcast. The bus itself sits behind [`BusSession`];
//! [`ZbusSession`] is the zbus-backed implementation.

pub mod address;
pub mod client;
pub mod config;
pub mod dbus;
pub mod error;
pub mod metadata;
pub mod signals;

pub use address::{Interfaces, PlayerAddress};
pub use client::{Interface, MprisClient};
pub use config::ClientConfig;
pub use dbus::{Argument, BusSession, Subscription, ZbusSession};
pub use error::{Error, Result};
pub use metadata::{Metadata, VariantDict};
pub use signals::{
    PlaybackStatus, Playlist, PlaylistChanged, PropertiesChanged, Seeked, Signal, TrackAdded,
    TrackListReplaced, TrackMetadataChanged, TrackRemoved,
};

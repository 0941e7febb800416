use std::str::FromStr;

use indexmap::IndexMap;

use serde::Serialize;
use zbus::{
    zvariant::{OwnedObjectPath, Value},
    Message,
};

use crate::{
    address::Interfaces,
    dbus::decode_body,
    error::Result,
    metadata::{extract_str, Metadata, VariantDict},
};

/// Current playback status of a MPRIS-compliant player
#[derive(Clone, Copy, Eq, PartialEq, Debug, Serialize)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    Stopped,
}
impl FromStr for PlaybackStatus {
    type Err = UnknownPlaybackStatus;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "playing" => Ok(Self::Playing),
            "paused" => Ok(Self::Paused),
            "stopped" => Ok(Self::Stopped),
            _ => Err(UnknownPlaybackStatus(s.to_owned())),
        }
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Unknown PlaybackStatus {0}")]
pub struct UnknownPlaybackStatus(pub String);

/// One entry of a player's playlist collection
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Playlist {
    /// Opaque identifier, passed back unchanged to `ActivatePlaylist`
    pub id: String,
    pub name: String,
    /// URI of the playlist icon, empty if the player has none
    pub icon: String,
}

impl From<(OwnedObjectPath, String, String)> for Playlist {
    fn from((id, name, icon): (OwnedObjectPath, String, String)) -> Self {
        Self {
            id: id.as_str().to_owned(),
            name,
            icon,
        }
    }
}

/// A broadcast signal the client knows how to subscribe to and decode.
pub trait Signal: Sized + Send + 'static {
    /// Signal name on the bus
    const MEMBER: &'static str;

    /// Interface the signal is emitted on
    fn interface(interfaces: &Interfaces) -> &str;

    /// Decode the signal body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`](crate::Error::MalformedReply) if the body has an
    /// unexpected shape.
    fn decode(msg: &Message) -> Result<Self>;
}

/// `Player.Seeked`: the position jumped in a way not explained by normal playback
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Seeked {
    /// New position in microseconds
    pub position: i64,
}

impl Signal for Seeked {
    const MEMBER: &'static str = "Seeked";

    fn interface(interfaces: &Interfaces) -> &str {
        &interfaces.player
    }

    fn decode(msg: &Message) -> Result<Self> {
        decode_body(msg, Self::MEMBER).map(|position| Self { position })
    }
}

/// `Properties.PropertiesChanged` as emitted on the MPRIS object path
#[derive(Debug, PartialEq)]
pub struct PropertiesChanged {
    /// Interface whose properties changed
    pub interface: String,
    /// New values, with variant wrappers removed
    pub changed: IndexMap<String, Value<'static>>,
    /// Properties that changed but whose new value was not sent
    pub invalidated: Vec<String>,
}

impl PropertiesChanged {
    /// New `PlaybackStatus`, if it is among the changed properties and recognised
    #[must_use]
    pub fn playback_status(&self) -> Option<PlaybackStatus> {
        self.changed
            .get("PlaybackStatus")
            .and_then(extract_str)
            .and_then(|s| {
                s.as_str()
                    .parse()
                    .inspect_err(|e| tracing::debug!(%e, "Ignoring PlaybackStatus"))
                    .ok()
            })
    }

    /// New `Volume`, if it is among the changed properties
    #[must_use]
    pub fn volume(&self) -> Option<f64> {
        match self.changed.get("Volume")? {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }
}

impl Signal for PropertiesChanged {
    const MEMBER: &'static str = "PropertiesChanged";

    fn interface(interfaces: &Interfaces) -> &str {
        &interfaces.properties
    }

    fn decode(msg: &Message) -> Result<Self> {
        decode_body::<(String, VariantDict, Vec<String>)>(msg, Self::MEMBER).map(
            |(interface, changed, invalidated)| Self {
                interface,
                changed: Metadata::from(changed).into_inner(),
                invalidated,
            },
        )
    }
}

/// `Playlists.PlaylistChanged`: a playlist's name or icon changed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaylistChanged(pub Playlist);

impl Signal for PlaylistChanged {
    const MEMBER: &'static str = "PlaylistChanged";

    fn interface(interfaces: &Interfaces) -> &str {
        &interfaces.playlists
    }

    fn decode(msg: &Message) -> Result<Self> {
        decode_body::<(OwnedObjectPath, String, String)>(msg, Self::MEMBER)
            .map(|raw| Self(raw.into()))
    }
}

/// `TrackList.TrackListReplaced`: the whole track list was swapped out
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackListReplaced {
    pub tracks: Vec<String>,
    pub current: String,
}

impl Signal for TrackListReplaced {
    const MEMBER: &'static str = "TrackListReplaced";

    fn interface(interfaces: &Interfaces) -> &str {
        &interfaces.track_list
    }

    fn decode(msg: &Message) -> Result<Self> {
        decode_body::<(Vec<OwnedObjectPath>, OwnedObjectPath)>(msg, Self::MEMBER).map(
            |(tracks, current)| Self {
                tracks: tracks.iter().map(|t| t.as_str().to_owned()).collect(),
                current: current.as_str().to_owned(),
            },
        )
    }
}

/// `TrackList.TrackAdded`
#[derive(Debug, PartialEq)]
pub struct TrackAdded {
    pub metadata: Metadata,
    /// Track the new one was inserted after
    pub after: String,
}

impl Signal for TrackAdded {
    const MEMBER: &'static str = "TrackAdded";

    fn interface(interfaces: &Interfaces) -> &str {
        &interfaces.track_list
    }

    fn decode(msg: &Message) -> Result<Self> {
        decode_body::<(VariantDict, OwnedObjectPath)>(msg, Self::MEMBER).map(
            |(metadata, after)| Self {
                metadata: Metadata::from(metadata),
                after: after.as_str().to_owned(),
            },
        )
    }
}

/// `TrackList.TrackRemoved`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrackRemoved {
    pub track: String,
}

impl Signal for TrackRemoved {
    const MEMBER: &'static str = "TrackRemoved";

    fn interface(interfaces: &Interfaces) -> &str {
        &interfaces.track_list
    }

    fn decode(msg: &Message) -> Result<Self> {
        decode_body::<OwnedObjectPath>(msg, Self::MEMBER).map(|track| Self {
            track: track.as_str().to_owned(),
        })
    }
}

/// `TrackList.TrackMetadataChanged`
#[derive(Debug, PartialEq)]
pub struct TrackMetadataChanged {
    pub track: String,
    pub metadata: Metadata,
}

impl Signal for TrackMetadataChanged {
    const MEMBER: &'static str = "TrackMetadataChanged";

    fn interface(interfaces: &Interfaces) -> &str {
        &interfaces.track_list
    }

    fn decode(msg: &Message) -> Result<Self> {
        decode_body::<(OwnedObjectPath, VariantDict)>(msg, Self::MEMBER).map(
            |(track, metadata)| Self {
                track: track.as_str().to_owned(),
                metadata: Metadata::from(metadata),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::{address::MPRIS_PATH, error::Error};
    use zbus::zvariant::ObjectPath;

    fn signal<B>(interface: &str, member: &str, body: &B) -> Message
    where
        B: serde::Serialize + zbus::zvariant::DynamicType,
    {
        Message::signal(MPRIS_PATH, interface, member)
            .unwrap()
            .build(body)
            .unwrap()
    }

    fn path(p: &str) -> ObjectPath<'_> {
        ObjectPath::try_from(p).unwrap()
    }

    #[test]
    fn playback_status_parse() {
        assert_eq!("Playing".parse(), Ok(PlaybackStatus::Playing));
        assert_eq!("paused".parse(), Ok(PlaybackStatus::Paused));
        assert_eq!("Stopped".parse(), Ok(PlaybackStatus::Stopped));
        assert!("Buffering".parse::<PlaybackStatus>().is_err());
    }

    #[test]
    fn seeked() {
        let msg = signal("org.mpris.MediaPlayer2.Player", "Seeked", &(1_500_000i64,));
        assert_eq!(
            Seeked::decode(&msg).unwrap(),
            Seeked {
                position: 1_500_000
            }
        );
    }

    #[test]
    fn seeked_with_wrong_body() {
        let msg = signal("org.mpris.MediaPlayer2.Player", "Seeked", &("soon",));
        assert!(matches!(
            Seeked::decode(&msg),
            Err(Error::MalformedReply { member, .. }) if member == "Seeked"
        ));
    }

    #[test]
    fn properties_changed() {
        let changed = HashMap::from([
            ("PlaybackStatus", Value::from("Playing")),
            ("Volume", Value::from(0.5f64)),
        ]);
        let msg = signal(
            "org.freedesktop.DBus.Properties",
            "PropertiesChanged",
            &(
                "org.mpris.MediaPlayer2.Player",
                changed,
                vec!["Position"],
            ),
        );
        let event = PropertiesChanged::decode(&msg).unwrap();
        assert_eq!(event.interface, "org.mpris.MediaPlayer2.Player");
        assert_eq!(event.playback_status(), Some(PlaybackStatus::Playing));
        assert_eq!(event.volume(), Some(0.5));
        assert_eq!(event.invalidated, vec!["Position".to_owned()]);
    }

    #[test]
    fn playlist_changed() {
        let msg = signal(
            "org.mpris.MediaPlayer2.Playlists",
            "PlaylistChanged",
            &(path("/playlists/1"), "Favourites", ""),
        );
        assert_eq!(
            PlaylistChanged::decode(&msg).unwrap(),
            PlaylistChanged(Playlist {
                id: "/playlists/1".to_owned(),
                name: "Favourites".to_owned(),
                icon: String::new(),
            })
        );
    }

    #[test]
    fn track_list_signals() {
        let iface = "org.mpris.MediaPlayer2.TrackList";

        let msg = signal(
            iface,
            "TrackListReplaced",
            &(vec![path("/t/1"), path("/t/2")], path("/t/2")),
        );
        assert_eq!(
            TrackListReplaced::decode(&msg).unwrap(),
            TrackListReplaced {
                tracks: vec!["/t/1".to_owned(), "/t/2".to_owned()],
                current: "/t/2".to_owned(),
            }
        );

        let metadata = HashMap::from([("xesam:title", Value::from("New"))]);
        let msg = signal(iface, "TrackAdded", &(metadata, path("/t/1")));
        let added = TrackAdded::decode(&msg).unwrap();
        assert_eq!(added.after, "/t/1");
        assert_eq!(added.metadata.title(), Some("New"));

        let msg = signal(iface, "TrackRemoved", &(path("/t/2"),));
        assert_eq!(
            TrackRemoved::decode(&msg).unwrap(),
            TrackRemoved {
                track: "/t/2".to_owned()
            }
        );

        let metadata = HashMap::from([("xesam:title", Value::from("Renamed"))]);
        let msg = signal(iface, "TrackMetadataChanged", &(path("/t/1"), metadata));
        let changed = TrackMetadataChanged::decode(&msg).unwrap();
        assert_eq!(changed.track, "/t/1");
        assert_eq!(changed.metadata.title(), Some("Renamed"));
    }

    #[test]
    fn signal_interfaces() {
        let interfaces = Interfaces::default();
        assert_eq!(Seeked::interface(&interfaces), "org.mpris.MediaPlayer2.Player");
        assert_eq!(
            PlaylistChanged::interface(&interfaces),
            "org.mpris.MediaPlayer2.Playlists"
        );
        assert_eq!(
            TrackRemoved::interface(&interfaces),
            "org.mpris.MediaPlayer2.TrackList"
        );
        assert_eq!(
            PropertiesChanged::interface(&interfaces),
            "org.freedesktop.DBus.Properties"
        );
    }
}

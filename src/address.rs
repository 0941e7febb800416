use std::{fmt, str::FromStr};

use crate::error::{Error, Result};

/// Well-known bus name prefix shared by every MPRIS player
pub const MPRIS_PREFIX: &str = "org.mpris.MediaPlayer2";
/// Object path every MPRIS player exposes its interfaces on
pub const MPRIS_PATH: &str = "/org/mpris/MediaPlayer2";
/// Generic D-Bus properties interface
pub const PROPERTIES_INTERFACE: &str = "org.freedesktop.DBus.Properties";

/// Maximum length of a full bus name
const MAX_BUS_NAME_LEN: usize = 255;

/// Names of the remote interfaces the client talks to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Interfaces {
    /// `org.mpris.MediaPlayer2`
    pub base: String,
    /// `org.mpris.MediaPlayer2.Player`
    pub player: String,
    /// `org.mpris.MediaPlayer2.TrackList`
    pub track_list: String,
    /// `org.mpris.MediaPlayer2.Playlists`
    pub playlists: String,
    /// `org.freedesktop.DBus.Properties`
    pub properties: String,
}

impl Default for Interfaces {
    fn default() -> Self {
        Self {
            base: MPRIS_PREFIX.to_owned(),
            player: format!("{MPRIS_PREFIX}.Player"),
            track_list: format!("{MPRIS_PREFIX}.TrackList"),
            playlists: format!("{MPRIS_PREFIX}.Playlists"),
            properties: PROPERTIES_INTERFACE.to_owned(),
        }
    }
}

/// Short player identifier, e.g. `vlc` in `org.mpris.MediaPlayer2.vlc`
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlayerAddress(String);

impl PlayerAddress {
    /// Validate `address` as a single bus name element.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if the address is empty, contains a dot or any
    /// character outside `[A-Za-z0-9_-]`, starts with a digit, or would make the full bus
    /// name too long.
    pub fn new(address: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidAddress {
            address: address.to_owned(),
            reason,
        };

        let Some(first) = address.chars().next() else {
            return Err(invalid("address is empty"));
        };
        if address.contains('.') {
            return Err(invalid("address must be a single bus name element"));
        }
        if first.is_ascii_digit() {
            return Err(invalid("address must not start with a digit"));
        }
        if !address
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("address may only contain [A-Za-z0-9_-]"));
        }
        if MPRIS_PREFIX.len() + 1 + address.len() > MAX_BUS_NAME_LEN {
            return Err(invalid("full bus name exceeds 255 characters"));
        }
        Ok(Self(address.to_owned()))
    }

    /// Full bus name to send calls to
    #[must_use]
    pub fn destination(&self) -> String {
        format!("{MPRIS_PREFIX}.{}", self.0)
    }

    /// Recover the address from a full bus name as returned by
    /// [`MprisClient::list_mpris_services`](crate::MprisClient::list_mpris_services).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `bus_name` lacks the MPRIS prefix or the remainder
    /// is not a valid address.
    pub fn from_bus_name(bus_name: &str) -> Result<Self> {
        bus_name
            .strip_prefix(MPRIS_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| Error::InvalidAddress {
                address: bus_name.to_owned(),
                reason: "bus name lacks the MPRIS prefix",
            })
            .and_then(Self::new)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PlayerAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl fmt::Display for PlayerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interfaces_are_independent() {
        let interfaces = Interfaces::default();
        assert_eq!(interfaces.base, "org.mpris.MediaPlayer2");
        assert_eq!(interfaces.player, "org.mpris.MediaPlayer2.Player");
        assert_eq!(interfaces.track_list, "org.mpris.MediaPlayer2.TrackList");
        assert_eq!(interfaces.playlists, "org.mpris.MediaPlayer2.Playlists");
        assert_eq!(interfaces.properties, "org.freedesktop.DBus.Properties");
    }

    #[test]
    fn valid_addresses() {
        for address in ["HTidal", "vlc", "spotify", "_private", "kde-connect", "mpd2"] {
            let parsed = PlayerAddress::new(address).unwrap();
            assert_eq!(
                parsed.destination(),
                format!("org.mpris.MediaPlayer2.{address}")
            );
        }
    }

    #[test]
    fn invalid_addresses() {
        let too_long = "a".repeat(250);
        for address in [
            "",
            ".vlc",
            "firefox.instance_1_234",
            "1player",
            "has space",
            "ümlaut",
            too_long.as_str(),
        ] {
            assert!(
                matches!(
                    PlayerAddress::new(address),
                    Err(Error::InvalidAddress { .. })
                ),
                "{address:?} should be rejected"
            );
        }
    }

    #[test]
    fn from_bus_name() {
        assert_eq!(
            PlayerAddress::from_bus_name("org.mpris.MediaPlayer2.vlc")
                .unwrap()
                .as_str(),
            "vlc"
        );
        assert!(PlayerAddress::from_bus_name("org.freedesktop.Notifications").is_err());
        assert!(PlayerAddress::from_bus_name("org.mpris.MediaPlayer2").is_err());
        assert!(PlayerAddress::from_bus_name("org.mpris.MediaPlayer2Foo").is_err());
    }
}

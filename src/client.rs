use std::future::Future;

use indexmap::IndexMap;

use tokio::time::timeout;
use zbus::{
    zvariant::{OwnedObjectPath, OwnedValue, Value},
    Message,
};

use crate::{
    address::{PlayerAddress, MPRIS_PATH, MPRIS_PREFIX},
    config::ClientConfig,
    dbus::{decode_body, Argument, BusSession, MethodCall, SignalRule, Subscription, ZbusSession},
    error::{Error, Result},
    metadata::{strip_variant, Metadata, VariantDict},
    signals::{
        Playlist, PlaylistChanged, PropertiesChanged, Seeked, Signal, TrackAdded,
        TrackListReplaced, TrackMetadataChanged, TrackRemoved,
    },
};


/// Which of the configured interfaces a call goes to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interface {
    Base,
    Player,
    TrackList,
    Playlists,
    Properties,
}

/// Client side of the MPRIS interfaces.
///
/// Every call goes to `org.mpris.MediaPlayer2.<player>` at `/org/mpris/MediaPlayer2`; only the
/// interface, member and arguments differ between operations.
pub struct MprisClient<S = ZbusSession> {
    config: ClientConfig,
    session: Option<S>,
}

impl<S> MprisClient<S> {
    /// Create a client with no bus session attached
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }

    /// Create a client on top of an already established session
    #[must_use]
    pub fn with_session(config: ClientConfig, session: S) -> Self {
        Self {
            config,
            session: Some(session),
        }
    }

    /// Attach a session, replacing any previous one
    pub fn attach(&mut self, session: S) {
        self.session = Some(session);
    }

    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn interface(&self, interface: Interface) -> &str {
        let interfaces = &self.config.interfaces;
        match interface {
            Interface::Base => &interfaces.base,
            Interface::Player => &interfaces.player,
            Interface::TrackList => &interfaces.track_list,
            Interface::Playlists => &interfaces.playlists,
            Interface::Properties => &interfaces.properties,
        }
    }
}

impl MprisClient<ZbusSession> {
    /// Open the session bus and resolve the bus directory.
    ///
    /// Does nothing if a session is already attached.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteFault`] if the session bus cannot be reached.
    pub async fn connect(&mut self) -> Result<()> {
        if self.session.is_some() {
            tracing::debug!("Already connected to the session bus");
            return Ok(());
        }
        self.session = Some(ZbusSession::session().await?);
        tracing::info!("Connected to the session bus");
        Ok(())
    }
}

impl<S: BusSession> MprisClient<S> {
    fn session(&self) -> Result<&S> {
        self.session.as_ref().ok_or(Error::NotConnected)
    }

    async fn with_timeout<T>(
        &self,
        member: &str,
        fut: impl Future<Output = zbus::Result<T>>,
    ) -> Result<T> {
        match self.config.call_timeout {
            None => Ok(fut.await?),
            Some(limit) => timeout(limit, fut)
                .await
                .map_err(|_| Error::Timeout {
                    member: member.to_owned(),
                    timeout: limit,
                })?
                .map_err(Error::from),
        }
    }

    fn method_call(
        &self,
        player: &PlayerAddress,
        interface: Interface,
        member: &str,
        args: Vec<Argument>,
    ) -> MethodCall {
        MethodCall {
            destination: player.destination(),
            path: MPRIS_PATH.to_owned(),
            interface: self.interface(interface).to_owned(),
            member: member.to_owned(),
            args,
        }
    }

    /// Send `member` to an already validated `player`
    async fn send(
        &self,
        player: &PlayerAddress,
        interface: Interface,
        member: &str,
        args: Vec<Argument>,
    ) -> Result<Message> {
        self.dispatch(self.method_call(player, interface, member, args))
            .await
    }

    async fn dispatch(&self, call: MethodCall) -> Result<Message> {
        let session = self.session()?;
        tracing::debug!(
            destination = %call.destination,
            interface = %call.interface,
            member = %call.member,
            signature = %call.signature(),
            "Sending method call"
        );
        let reply = self
            .with_timeout(&call.member, session.call(&call))
            .await
            .inspect_err(|e| tracing::debug!(%e, member = %call.member, "Method call failed"))?;
        Ok(reply)
    }

    /// Call `member` on `player` with arguments and return the raw reply
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`], [`Error::NotConnected`], [`Error::RemoteFault`] or
    /// [`Error::Timeout`].
    pub async fn send_command(
        &self,
        player: &str,
        interface: Interface,
        member: &str,
        args: Vec<Argument>,
    ) -> Result<Message> {
        let player = PlayerAddress::new(player)?;
        self.send(&player, interface, member, args).await
    }

    /// Call a method that takes no arguments.
    ///
    /// A player that ignores the method answers with an empty reply, which is returned as
    /// success like any other.
    ///
    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn send_simple_command(
        &self,
        player: &str,
        member: &str,
        interface: Interface,
    ) -> Result<()> {
        self.send_command(player, interface, member, Vec::new())
            .await
            .map(drop)
    }

    /// Full bus names of every MPRIS player currently on the bus, in bus order.
    ///
    /// Not part of MPRIS itself.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`], [`Error::RemoteFault`] or [`Error::Timeout`].
    pub async fn list_mpris_services(&self) -> Result<Vec<String>> {
        let session = self.session()?;
        let names = self
            .with_timeout("ListNames", session.list_names())
            .await?;
        Ok(names
            .into_iter()
            .filter(|name| {
                name.strip_prefix(MPRIS_PREFIX)
                    .is_some_and(|rest| rest.starts_with('.'))
            })
            .collect())
    }

    // Base

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn raise(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "Raise", Interface::Base)
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn quit(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "Quit", Interface::Base)
            .await
    }

    // Player

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn play(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "Play", Interface::Player)
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn pause(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "Pause", Interface::Player)
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn play_pause(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "PlayPause", Interface::Player)
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn next(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "Next", Interface::Player)
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn previous(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "Previous", Interface::Player)
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn stop(&self, player: &str) -> Result<()> {
        self.send_simple_command(player, "Stop", Interface::Player)
            .await
    }

    /// Move the position by `offset` microseconds; negative values seek backwards
    ///
    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn seek(&self, player: &str, offset: i64) -> Result<()> {
        self.send_command(player, Interface::Player, "Seek", vec![Argument::I64(offset)])
            .await
            .map(drop)
    }

    /// Jump to `position` microseconds into `track_id`. Players ignore this if `track_id` is not
    /// the current track.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if `track_id` is not an object path, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn set_position(&self, player: &str, track_id: &str, position: i64) -> Result<()> {
        let player = PlayerAddress::new(player)?;
        let args = vec![Argument::object_path(track_id)?, Argument::I64(position)];
        self.send(&player, Interface::Player, "SetPosition", args)
            .await
            .map(drop)
    }

    /// Ask the player to open `uri`. The reply is returned as is.
    ///
    /// # Errors
    ///
    /// See [`MprisClient::send_command`].
    pub async fn open_uri(&self, player: &str, uri: &str) -> Result<Message> {
        self.send_command(
            player,
            Interface::Player,
            "OpenUri",
            vec![Argument::Str(uri.to_owned())],
        )
        .await
    }

    // Playlists

    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if `playlist_id` is not an object path, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn activate_playlist(&self, player: &str, playlist_id: &str) -> Result<()> {
        let player = PlayerAddress::new(player)?;
        let args = vec![Argument::object_path(playlist_id)?];
        self.send(&player, Interface::Playlists, "ActivatePlaylist", args)
            .await
            .map(drop)
    }

    /// Fetch up to `max_count` playlists starting at `index`, sorted by `order` (one of the
    /// player's `Orderings`, e.g. `Alphabetical`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`] if the reply is not a list of playlists, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn get_playlists(
        &self,
        player: &str,
        index: u32,
        max_count: u32,
        order: &str,
        reverse_order: bool,
    ) -> Result<Vec<Playlist>> {
        const MEMBER: &str = "GetPlaylists";
        let args = vec![
            Argument::U32(index),
            Argument::U32(max_count),
            Argument::Str(order.to_owned()),
            Argument::Bool(reverse_order),
        ];
        let reply = self
            .send_command(player, Interface::Playlists, MEMBER, args)
            .await?;
        let playlists = decode_body::<Vec<(OwnedObjectPath, String, String)>>(&reply, MEMBER)?;
        Ok(playlists.into_iter().map(Playlist::from).collect())
    }

    // TrackList

    /// Metadata of each track in `track_ids`, in the order the player returns them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if any id is not an object path,
    /// [`Error::MalformedReply`] if the reply is not a list of metadata maps, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn get_tracks_metadata<T: AsRef<str>>(
        &self,
        player: &str,
        track_ids: &[T],
    ) -> Result<Vec<Metadata>> {
        const MEMBER: &str = "GetTracksMetadata";
        let player = PlayerAddress::new(player)?;
        let args = vec![Argument::object_paths(track_ids)?];
        let reply = self
            .send(&player, Interface::TrackList, MEMBER, args)
            .await?;
        let records = decode_body::<Vec<VariantDict>>(&reply, MEMBER)?;
        Ok(records.into_iter().map(Metadata::from).collect())
    }

    /// Insert `uri` after `after_track`, optionally making it the current track
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if `after_track` is not an object path, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn add_track(
        &self,
        player: &str,
        uri: &str,
        after_track: &str,
        set_as_current: bool,
    ) -> Result<()> {
        let player = PlayerAddress::new(player)?;
        let args = vec![
            Argument::Str(uri.to_owned()),
            Argument::object_path(after_track)?,
            Argument::Bool(set_as_current),
        ];
        self.send(&player, Interface::TrackList, "AddTrack", args)
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if `track_id` is not an object path, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn remove_track(&self, player: &str, track_id: &str) -> Result<()> {
        let player = PlayerAddress::new(player)?;
        let args = vec![Argument::object_path(track_id)?];
        self.send(&player, Interface::TrackList, "RemoveTrack", args)
            .await
            .map(drop)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if `track_id` is not an object path, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn go_to(&self, player: &str, track_id: &str) -> Result<()> {
        let player = PlayerAddress::new(player)?;
        let args = vec![Argument::object_path(track_id)?];
        self.send(&player, Interface::TrackList, "GoTo", args)
            .await
            .map(drop)
    }

    // Properties

    /// Read a single property, e.g. `("org.mpris.MediaPlayer2.Player", "PlaybackStatus")`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`] if the reply is not a variant, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn get_property(
        &self,
        player: &str,
        interface: &str,
        property: &str,
    ) -> Result<Value<'static>> {
        const MEMBER: &str = "Get";
        let args = vec![
            Argument::Str(interface.to_owned()),
            Argument::Str(property.to_owned()),
        ];
        let reply = self
            .send_command(player, Interface::Properties, MEMBER, args)
            .await?;
        decode_body::<OwnedValue>(&reply, MEMBER).map(|v| strip_variant(v.into()))
    }

    /// Read every property of `interface`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedReply`] if the reply is not a property map, otherwise see
    /// [`MprisClient::send_command`].
    pub async fn get_all_properties(
        &self,
        player: &str,
        interface: &str,
    ) -> Result<IndexMap<String, Value<'static>>> {
        const MEMBER: &str = "GetAll";
        let args = vec![Argument::Str(interface.to_owned())];
        let reply = self
            .send_command(player, Interface::Properties, MEMBER, args)
            .await?;
        decode_body::<VariantDict>(&reply, MEMBER)
            .map(|props| Metadata::from(props).into_inner())
    }

    // Signals

    /// Register `callback` for signal `T` from any player.
    ///
    /// Bodies that fail to decode are logged and skipped. Registering twice delivers twice.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotConnected`] or [`Error::RemoteFault`] if the bus refuses the match.
    pub async fn subscribe<T, F>(&self, callback: F) -> Result<Subscription>
    where
        T: Signal,
        F: Fn(T) + Send + Sync + 'static,
    {
        let session = self.session()?;
        let rule = SignalRule {
            path: MPRIS_PATH.to_owned(),
            interface: T::interface(&self.config.interfaces).to_owned(),
            member: T::MEMBER.to_owned(),
        };
        tracing::debug!(?rule, "Subscribing to signal");
        let handler = Box::new(move |msg: &Message| match T::decode(msg) {
            Ok(event) => callback(event),
            Err(e) => tracing::warn!(%e, "Dropping undecodable signal"),
        });
        Ok(session.subscribe(rule, handler).await?)
    }

    /// `callback` receives the new position in microseconds
    ///
    /// # Errors
    ///
    /// See [`MprisClient::subscribe`].
    pub async fn subscribe_seeked<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        self.subscribe::<Seeked, _>(move |Seeked { position }| callback(position))
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::subscribe`].
    pub async fn subscribe_properties_changed<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(PropertiesChanged) + Send + Sync + 'static,
    {
        self.subscribe::<PropertiesChanged, _>(callback).await
    }

    /// # Errors
    ///
    /// See [`MprisClient::subscribe`].
    pub async fn subscribe_playlist_changed<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(Playlist) + Send + Sync + 'static,
    {
        self.subscribe::<PlaylistChanged, _>(move |PlaylistChanged(playlist)| callback(playlist))
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::subscribe`].
    pub async fn subscribe_track_list_replaced<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(TrackListReplaced) + Send + Sync + 'static,
    {
        self.subscribe::<TrackListReplaced, _>(callback).await
    }

    /// # Errors
    ///
    /// See [`MprisClient::subscribe`].
    pub async fn subscribe_track_added<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(TrackAdded) + Send + Sync + 'static,
    {
        self.subscribe::<TrackAdded, _>(callback).await
    }

    /// `callback` receives the id of the removed track
    ///
    /// # Errors
    ///
    /// See [`MprisClient::subscribe`].
    pub async fn subscribe_track_removed<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(String) + Send + Sync + 'static,
    {
        self.subscribe::<TrackRemoved, _>(move |TrackRemoved { track }| callback(track))
            .await
    }

    /// # Errors
    ///
    /// See [`MprisClient::subscribe`].
    pub async fn subscribe_track_metadata_changed<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(TrackMetadataChanged) + Send + Sync + 'static,
    {
        self.subscribe::<TrackMetadataChanged, _>(callback).await
    }
}

use std::fmt;

use async_trait::async_trait;
use futures_lite::StreamExt as _;
use serde::de::DeserializeOwned;
use tokio::task::spawn;
use zbus::{
    fdo::DBusProxy,
    message::Type as MessageType,
    zvariant::{OwnedObjectPath, Structure, StructureBuilder, Type, Value},
    Connection, MatchRule, Message, MessageStream,
};

use crate::error::{Error, Result};

#[cfg(test)]
pub mod fake;

/// A single argument of a method call, tagged with its D-Bus type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Argument {
    /// `s`
    Str(String),
    /// `o`
    ObjectPath(OwnedObjectPath),
    /// `ao`
    ObjectPaths(Vec<OwnedObjectPath>),
    /// `u`
    U32(u32),
    /// `x`
    I64(i64),
    /// `b`
    Bool(bool),
}

impl Argument {
    /// Parse an opaque track or playlist identifier into an object path argument.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if `path` is not a valid object path.
    pub fn object_path(path: &str) -> Result<Self> {
        parse_object_path(path).map(Self::ObjectPath)
    }

    /// # Errors
    ///
    /// Returns [`Error::InvalidObjectPath`] if any element is not a valid object path.
    pub fn object_paths<S: AsRef<str>>(paths: &[S]) -> Result<Self> {
        paths
            .iter()
            .map(|p| parse_object_path(p.as_ref()))
            .collect::<Result<_>>()
            .map(Self::ObjectPaths)
    }

    #[must_use]
    pub const fn signature(&self) -> &'static str {
        match self {
            Self::Str(_) => "s",
            Self::ObjectPath(_) => "o",
            Self::ObjectPaths(_) => "ao",
            Self::U32(_) => "u",
            Self::I64(_) => "x",
            Self::Bool(_) => "b",
        }
    }

    fn into_value(self) -> Value<'static> {
        match self {
            Self::Str(s) => Value::from(s),
            Self::ObjectPath(p) => Value::from(p.into_inner()),
            Self::ObjectPaths(p) => Value::from(
                p.into_iter()
                    .map(OwnedObjectPath::into_inner)
                    .collect::<Vec<_>>(),
            ),
            Self::U32(v) => Value::U32(v),
            Self::I64(v) => Value::I64(v),
            Self::Bool(v) => Value::Bool(v),
        }
    }
}

fn parse_object_path(path: &str) -> Result<OwnedObjectPath> {
    OwnedObjectPath::try_from(path).map_err(|source| Error::InvalidObjectPath {
        path: path.to_owned(),
        source,
    })
}

/// Everything needed to address one remote method call
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodCall {
    pub destination: String,
    pub path: String,
    pub interface: String,
    pub member: String,
    pub args: Vec<Argument>,
}

impl MethodCall {
    /// Concatenated D-Bus signature of the arguments, e.g. `uusb`
    #[must_use]
    pub fn signature(&self) -> String {
        self.args.iter().map(Argument::signature).collect()
    }

    /// Arguments packed as a message body. `None` when there are no arguments.
    ///
    /// # Errors
    ///
    /// Returns an error if the arguments cannot be packed into a structure.
    pub fn body(&self) -> zbus::zvariant::Result<Option<Structure<'static>>> {
        if self.args.is_empty() {
            return Ok(None);
        }
        self.args
            .iter()
            .cloned()
            .map(Argument::into_value)
            .fold(StructureBuilder::new(), |builder, field| {
                builder.append_field(field)
            })
            .build()
            .map(Some)
    }
}

/// Filter selecting which broadcast signals a subscription receives
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SignalRule {
    pub path: String,
    pub interface: String,
    pub member: String,
}

impl SignalRule {
    /// Whether a received message falls under this rule
    #[must_use]
    pub fn matches(&self, msg: &Message) -> bool {
        let header = msg.header();
        header.message_type() == MessageType::Signal
            && header.path().is_some_and(|p| p.as_str() == self.path)
            && header
                .interface()
                .is_some_and(|i| i.as_str() == self.interface)
            && header.member().is_some_and(|m| m.as_str() == self.member)
    }

    fn match_rule(&self) -> zbus::Result<MatchRule<'_>> {
        Ok(MatchRule::builder()
            .msg_type(MessageType::Signal)
            .path(self.path.as_str())?
            .interface(self.interface.as_str())?
            .member(self.member.as_str())?
            .build())
    }
}

/// Callback invoked with every signal message matching a [`SignalRule`]
pub type SignalHandler = Box<dyn Fn(&Message) + Send + Sync + 'static>;

/// Handle to a registered signal callback.
///
/// Dropping the handle leaves the callback registered; call [`Subscription::unsubscribe`] to stop
/// delivery.
pub struct Subscription {
    rule: SignalRule,
    cancel: Box<dyn FnOnce() + Send + Sync>,
}

impl Subscription {
    pub fn new(rule: SignalRule, cancel: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            rule,
            cancel: Box::new(cancel),
        }
    }

    #[must_use]
    pub const fn rule(&self) -> &SignalRule {
        &self.rule
    }

    /// Stop delivering signals to the callback
    pub fn unsubscribe(self) {
        tracing::debug!(rule = ?self.rule, "Removing signal subscription");
        (self.cancel)();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("rule", &self.rule)
            .finish_non_exhaustive()
    }
}

/// Connection to a message bus, as far as the MPRIS client needs one.
///
/// Implementations must allow several calls in flight at once and correlate each reply with
/// its call.
#[async_trait]
pub trait BusSession: Send + Sync {
    /// Send a method call and wait for its reply.
    async fn call(&self, call: &MethodCall) -> zbus::Result<Message>;

    /// Every name currently owned on the bus, in the order the bus reports them.
    async fn list_names(&self) -> zbus::Result<Vec<String>>;

    /// Invoke `handler` for every signal matching `rule` until the subscription is removed.
    ///
    /// Registering the same rule twice yields two independent deliveries.
    async fn subscribe(&self, rule: SignalRule, handler: SignalHandler)
        -> zbus::Result<Subscription>;
}

/// [`BusSession`] backed by a zbus connection
#[derive(Clone, Debug)]
pub struct ZbusSession {
    conn: Connection,
    directory: DBusProxy<'static>,
}

impl ZbusSession {
    /// Connect to the session bus.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus cannot be reached.
    pub async fn session() -> zbus::Result<Self> {
        Self::new(Connection::session().await?).await
    }

    /// Wrap an existing connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the bus directory proxy cannot be created.
    pub async fn new(conn: Connection) -> zbus::Result<Self> {
        let directory = DBusProxy::new(&conn).await?;
        Ok(Self { conn, directory })
    }

    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}

#[async_trait]
impl BusSession for ZbusSession {
    async fn call(&self, call: &MethodCall) -> zbus::Result<Message> {
        let destination = Some(call.destination.as_str());
        let interface = Some(call.interface.as_str());
        match call.body()? {
            None => {
                self.conn
                    .call_method(destination, call.path.as_str(), interface, call.member.as_str(), &())
                    .await
            }
            Some(body) => {
                self.conn
                    .call_method(destination, call.path.as_str(), interface, call.member.as_str(), &body)
                    .await
            }
        }
    }

    async fn list_names(&self) -> zbus::Result<Vec<String>> {
        Ok(self
            .directory
            .list_names()
            .await?
            .into_iter()
            .map(|name| name.to_string())
            .collect())
    }

    async fn subscribe(
        &self,
        rule: SignalRule,
        handler: SignalHandler,
    ) -> zbus::Result<Subscription> {
        let mut stream =
            MessageStream::for_match_rule(rule.match_rule()?, &self.conn, None).await?;
        let task = spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(msg) => handler(&msg),
                    Err(e) => tracing::warn!(?e, "Failed to receive signal"),
                }
            }
            tracing::debug!("Signal stream closed");
        });
        Ok(Subscription::new(rule, move || task.abort()))
    }
}

/// Decode a whole message body into `T`.
///
/// # Errors
///
/// Returns [`Error::MalformedReply`] if the body does not have the shape of `T`.
pub fn decode_body<T>(msg: &Message, member: &str) -> Result<T>
where
    T: DeserializeOwned + Type,
{
    msg.body()
        .deserialize::<T>()
        .map_err(|source| Error::MalformedReply {
            member: member.to_owned(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: Vec<Argument>) -> MethodCall {
        MethodCall {
            destination: "org.mpris.MediaPlayer2.vlc".to_owned(),
            path: "/org/mpris/MediaPlayer2".to_owned(),
            interface: "org.mpris.MediaPlayer2.Playlists".to_owned(),
            member: "GetPlaylists".to_owned(),
            args,
        }
    }

    #[test]
    fn signature_follows_argument_order() {
        let call = call(vec![
            Argument::U32(0),
            Argument::U32(10),
            Argument::Str("Alphabetical".to_owned()),
            Argument::Bool(false),
        ]);
        assert_eq!(call.signature(), "uusb");
        assert!(call.body().unwrap().is_some());
    }

    /// Pack `call` into a message the way it would be sent
    fn wire(call: &MethodCall) -> Message {
        let builder = Message::method_call(call.path.as_str(), call.member.as_str())
            .unwrap()
            .destination(call.destination.as_str())
            .unwrap()
            .interface(call.interface.as_str())
            .unwrap();
        match call.body().unwrap() {
            Some(body) => builder.build(&body).unwrap(),
            None => builder.build(&()).unwrap(),
        }
    }

    #[test]
    fn get_playlists_on_the_wire() {
        let msg = wire(&call(vec![
            Argument::U32(3),
            Argument::U32(10),
            Argument::Str("Alphabetical".to_owned()),
            Argument::Bool(true),
        ]));
        let body = msg.body();
        assert_eq!(body.signature().to_string_no_parens(), "uusb");
        assert_eq!(
            body.deserialize::<(u32, u32, String, bool)>().unwrap(),
            (3, 10, "Alphabetical".to_owned(), true)
        );
    }

    #[test]
    fn add_track_on_the_wire() {
        let mut add_track = call(vec![
            Argument::Str("file:///b.flac".to_owned()),
            Argument::object_path("/t/5").unwrap(),
            Argument::Bool(true),
        ]);
        add_track.interface = "org.mpris.MediaPlayer2.TrackList".to_owned();
        add_track.member = "AddTrack".to_owned();
        let msg = wire(&add_track);
        let body = msg.body();
        assert_eq!(body.signature().to_string_no_parens(), "sob");
        let (uri, after, current) = body
            .deserialize::<(String, OwnedObjectPath, bool)>()
            .unwrap();
        assert_eq!(uri, "file:///b.flac");
        assert_eq!(after.as_str(), "/t/5");
        assert!(current);
    }

    #[test]
    fn get_tracks_metadata_on_the_wire() {
        let mut get_tracks = call(vec![Argument::object_paths(&["/t/1", "/t/2"]).unwrap()]);
        get_tracks.interface = "org.mpris.MediaPlayer2.TrackList".to_owned();
        get_tracks.member = "GetTracksMetadata".to_owned();
        let msg = wire(&get_tracks);
        let body = msg.body();
        assert_eq!(body.signature().to_string_no_parens(), "ao");
        let tracks = body.deserialize::<Vec<OwnedObjectPath>>().unwrap();
        assert_eq!(
            tracks.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
            vec!["/t/1", "/t/2"]
        );
    }

    #[test]
    fn set_position_on_the_wire() {
        let msg = wire(&call(vec![
            Argument::object_path("/t/1").unwrap(),
            Argument::I64(-42),
        ]));
        let body = msg.body();
        assert_eq!(body.signature().to_string_no_parens(), "ox");
        let (track, position) = body.deserialize::<(OwnedObjectPath, i64)>().unwrap();
        assert_eq!(track.as_str(), "/t/1");
        assert_eq!(position, -42);
    }

    #[test]
    fn empty_call_has_no_body() {
        let call = call(Vec::new());
        assert_eq!(call.signature(), "");
        assert!(call.body().unwrap().is_none());
    }

    #[test]
    fn object_path_arguments() {
        assert_eq!(
            Argument::object_paths(&["/track/1", "/track/2"])
                .unwrap()
                .signature(),
            "ao"
        );
        assert!(matches!(
            Argument::object_path("not a path"),
            Err(Error::InvalidObjectPath { .. })
        ));
        assert!(matches!(
            Argument::object_paths(&["/ok", "bad//path"]),
            Err(Error::InvalidObjectPath { .. })
        ));
    }

    #[test]
    fn rule_matches_signal_messages() {
        let rule = SignalRule {
            path: "/org/mpris/MediaPlayer2".to_owned(),
            interface: "org.mpris.MediaPlayer2.Player".to_owned(),
            member: "Seeked".to_owned(),
        };
        let seeked = Message::signal(
            "/org/mpris/MediaPlayer2",
            "org.mpris.MediaPlayer2.Player",
            "Seeked",
        )
        .unwrap()
        .build(&(5i64,))
        .unwrap();
        let other = Message::signal(
            "/org/mpris/MediaPlayer2",
            "org.mpris.MediaPlayer2.TrackList",
            "Seeked",
        )
        .unwrap()
        .build(&(5i64,))
        .unwrap();
        assert!(rule.matches(&seeked));
        assert!(!rule.matches(&other));
    }
}

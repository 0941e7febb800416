use std::{borrow::Cow, collections::HashMap};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use zbus::zvariant::{OwnedValue, Signature, Str, Type, Value};

const MAX_METADATA_VALUE_LEN: usize = 256;

/// `a{sv}` dictionary that keeps entries in the order the sender wrote them
#[derive(Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VariantDict(pub IndexMap<String, OwnedValue>);

impl Type for VariantDict {
    const SIGNATURE: &'static Signature = <HashMap<String, OwnedValue> as Type>::SIGNATURE;
}

/// Key/value description of a single track, as sent by a player.
///
/// Values hold the payload of each variant with its D-Bus wrapper removed, and entries keep the
/// order the player sent them in. See
/// `<https://www.freedesktop.org/wiki/Specifications/mpris-spec/metadata/>` for common keys.
#[derive(Debug, Default, PartialEq)]
pub struct Metadata(IndexMap<String, Value<'static>>);

impl Metadata {
    /// Build a record from decoded `a{sv}` entries, unwrapping nested variants.
    #[must_use]
    pub fn from_raw(raw: impl IntoIterator<Item = (String, OwnedValue)>) -> Self {
        Self(
            raw.into_iter()
                .map(|(k, v)| (k, strip_variant(v.into())))
                .collect(),
        )
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value<'static>> {
        self.0.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value<'static>)> {
        self.0.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn into_inner(self) -> IndexMap<String, Value<'static>> {
        self.0
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(extract_str).map(Str::as_str)
    }

    /// `mpris:trackid`, accepting players that send it as a plain string
    #[must_use]
    pub fn track_id(&self) -> Option<&str> {
        match self.get("mpris:trackid")? {
            Value::ObjectPath(p) => Some(p.as_str()),
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn title(&self) -> Option<&str> {
        self.get_str("xesam:title")
    }

    #[must_use]
    pub fn album(&self) -> Option<&str> {
        self.get_str("xesam:album")
    }

    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.get_str("xesam:url")
    }

    #[must_use]
    pub fn art_url(&self) -> Option<&str> {
        self.get_str("mpris:artUrl")
    }

    /// `xesam:artist`, which is a list of names
    #[must_use]
    pub fn artists(&self) -> Vec<&str> {
        match self.get("xesam:artist") {
            Some(Value::Array(a)) => a
                .iter()
                .filter_map(extract_str)
                .map(Str::as_str)
                .collect(),
            Some(Value::Str(s)) => vec![s.as_str()],
            _ => Vec::new(),
        }
    }

    /// `mpris:length` in microseconds. Some players send it unsigned or 32-bit.
    #[must_use]
    pub fn length(&self) -> Option<i64> {
        match self.get("mpris:length")? {
            Value::I64(v) => Some(*v),
            Value::U64(v) => i64::try_from(*v).ok(),
            Value::I32(v) => Some(i64::from(*v)),
            Value::U32(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Render every entry as `key: value` lines, collapsing large values.
    #[must_use]
    pub fn format(&self) -> String {
        let mut lines = self
            .iter()
            .map(|(k, v)| {
                let v = format_value(v);
                if v.len() > MAX_METADATA_VALUE_LEN {
                    format!("{k}: ({} bytes blob)", v.len())
                } else {
                    format!("{k}: {v}")
                }
            })
            .collect::<Vec<_>>();
        lines.sort_unstable();
        lines.join("\n")
    }
}

impl From<VariantDict> for Metadata {
    fn from(VariantDict(raw): VariantDict) -> Self {
        Self::from_raw(raw)
    }
}

/// Remove any variant wrappers around a value, keeping only the payload.
#[must_use]
pub fn strip_variant(mut value: Value<'static>) -> Value<'static> {
    loop {
        match value {
            Value::Value(inner) => value = *inner,
            other => return other,
        }
    }
}

#[must_use]
/// Converts a [`Value`] into [`Str`], or return [`None`] if it's not `str`.
pub const fn extract_str<'a, 'b>(v: &'a Value<'b>) -> Option<&'a Str<'b>> {
    if let Value::Str(v) = v {
        Some(v)
    } else {
        None
    }
}

/// Human-readable rendering of a variant payload
#[must_use]
pub fn format_value<'a>(v: &'a Value<'_>) -> Cow<'a, str> {
    match v {
        Value::U8(v) => Cow::Owned(v.to_string()),
        Value::Bool(v) => Cow::Owned(v.to_string()),
        Value::I16(v) => Cow::Owned(v.to_string()),
        Value::U16(v) => Cow::Owned(v.to_string()),
        Value::I32(v) => Cow::Owned(v.to_string()),
        Value::U32(v) => Cow::Owned(v.to_string()),
        Value::I64(v) => Cow::Owned(v.to_string()),
        Value::U64(v) => Cow::Owned(v.to_string()),
        Value::F64(v) => Cow::Owned(v.to_string()),
        Value::Str(v) => Cow::Borrowed(v.as_str()),
        Value::Signature(s) => Cow::Owned(s.to_string()),
        Value::ObjectPath(o) => Cow::Borrowed(o.as_str()),
        Value::Value(v) => format_value(v),
        Value::Array(a) => Cow::Owned(a.iter().map(format_value).collect::<Vec<_>>().join(";")),
        Value::Dict(d) => Cow::Owned(
            d.iter()
                .map(|(k, v)| format!("{}={}", format_value(k), format_value(v)))
                .collect::<Vec<_>>()
                .join(";"),
        ),
        Value::Structure(s) => Cow::Owned(
            s.fields()
                .iter()
                .map(format_value)
                .collect::<Vec<_>>()
                .join(";"),
        ),
        Value::Fd(_) => Cow::Borrowed("fd"),
    }
}

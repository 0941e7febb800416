use std::{
    collections::BTreeMap,
    io::{self, Write},
};

use mpris_client::{metadata::format_value, Metadata, Playlist};
use serde::Serialize;
use zbus::zvariant::Value;

/// One line of JSON written to stdout
#[derive(Serialize, Debug)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Output {
    /// A command without a meaningful reply was accepted
    Done {
        command: &'static str,
        player: String,
    },
    Services {
        names: Vec<String>,
    },
    Playlists {
        player: String,
        playlists: Vec<Playlist>,
    },
    Tracks {
        player: String,
        tracks: Vec<BTreeMap<String, String>>,
    },
    Properties {
        player: String,
        interface: String,
        properties: BTreeMap<String, String>,
    },
    /// A broadcast signal, printed by `listen`
    Signal {
        member: &'static str,
        body: serde_json::Value,
    },
}

impl Output {
    pub const fn done(command: &'static str, player: String) -> Self {
        Self::Done { command, player }
    }

    /// Format the output as JSON and write it to the given writer.
    ///
    /// # Errors
    ///
    /// This function will return an error if writing to the given writer fails.
    pub fn format<T: Write>(&self, mut f: &mut T) -> io::Result<()> {
        serde_json::to_writer(&mut f, self)?;
        f.write_all(b"\n")?;
        Ok(())
    }

    /// Print the output to stdout.
    ///
    /// # Errors
    ///
    /// This function will return an error if writing to stdout fails.
    pub fn print(&self) -> io::Result<()> {
        self.format(&mut io::stdout().lock())
    }
}

/// Render values as strings, sorted by key
pub fn fields<'a>(
    values: impl IntoIterator<Item = (&'a String, &'a Value<'static>)>,
) -> BTreeMap<String, String> {
    values
        .into_iter()
        .map(|(k, v)| (k.clone(), format_value(v).into_owned()))
        .collect()
}

pub fn metadata_fields(metadata: &Metadata) -> BTreeMap<String, String> {
    fields(metadata.iter())
}

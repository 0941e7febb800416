use anyhow::{Context as _, Result};
use args::Command;
use clap::Parser as _;
use mpris_client::{ClientConfig, MprisClient, Subscription};
use out::{fields, metadata_fields, Output};
use serde_json::json;

mod args;
mod out;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = args::Args::parse();
    args.init_tracing_subscriber()?;

    let mut client = MprisClient::new(ClientConfig::default().with_call_timeout(args.call_timeout()));
    client
        .connect()
        .await
        .context("Failed to connect to the session bus")?;
    run(&client, args.command).await
}

async fn run(client: &MprisClient, command: Command) -> Result<()> {
    let output = match command {
        Command::List => Output::Services {
            names: client.list_mpris_services().await?,
        },
        Command::Raise { player } => {
            client.raise(&player).await?;
            Output::done("raise", player)
        }
        Command::Quit { player } => {
            client.quit(&player).await?;
            Output::done("quit", player)
        }
        Command::Play { player } => {
            client.play(&player).await?;
            Output::done("play", player)
        }
        Command::Pause { player } => {
            client.pause(&player).await?;
            Output::done("pause", player)
        }
        Command::PlayPause { player } => {
            client.play_pause(&player).await?;
            Output::done("play-pause", player)
        }
        Command::Next { player } => {
            client.next(&player).await?;
            Output::done("next", player)
        }
        Command::Previous { player } => {
            client.previous(&player).await?;
            Output::done("previous", player)
        }
        Command::Stop { player } => {
            client.stop(&player).await?;
            Output::done("stop", player)
        }
        Command::OpenUri { player, uri } => {
            client
                .open_uri(&player, &uri)
                .await
                .with_context(|| format!("{player} could not open {uri}"))?;
            Output::done("open-uri", player)
        }
        Command::Seek { player, offset } => {
            client.seek(&player, offset).await?;
            Output::done("seek", player)
        }
        Command::SetPosition {
            player,
            track_id,
            position,
        } => {
            client.set_position(&player, &track_id, position).await?;
            Output::done("set-position", player)
        }
        Command::ActivatePlaylist {
            player,
            playlist_id,
        } => {
            client.activate_playlist(&player, &playlist_id).await?;
            Output::done("activate-playlist", player)
        }
        Command::Playlists {
            player,
            index,
            max_count,
            order,
            reverse,
        } => {
            let playlists = client
                .get_playlists(&player, index, max_count, &order, reverse)
                .await?;
            Output::Playlists { player, playlists }
        }
        Command::TracksMetadata { player, track_ids } => {
            let records = client.get_tracks_metadata(&player, &track_ids[..]).await?;
            for record in &records {
                tracing::debug!("Track metadata:\n{}", record.format());
            }
            Output::Tracks {
                player,
                tracks: records.iter().map(metadata_fields).collect(),
            }
        }
        Command::AddTrack {
            player,
            uri,
            after_track,
            set_as_current,
        } => {
            client
                .add_track(&player, &uri, &after_track, set_as_current)
                .await?;
            Output::done("add-track", player)
        }
        Command::RemoveTrack { player, track_id } => {
            client.remove_track(&player, &track_id).await?;
            Output::done("remove-track", player)
        }
        Command::GoTo { player, track_id } => {
            client.go_to(&player, &track_id).await?;
            Output::done("go-to", player)
        }
        Command::Properties { player, interface } => {
            let properties = client.get_all_properties(&player, &interface).await?;
            Output::Properties {
                player,
                interface,
                properties: fields(&properties),
            }
        }
        Command::Listen => return listen(client).await,
    };
    output.print().context("Failed to write output")
}

fn print_signal(member: &'static str, body: serde_json::Value) {
    if let Err(e) = (Output::Signal { member, body }).print() {
        tracing::warn!(%e, member, "Failed to write signal");
    }
}

/// Print every signal from every player until interrupted
async fn listen(client: &MprisClient) -> Result<()> {
    let subscriptions: Vec<Subscription> = vec![
        client
            .subscribe_seeked(|position| print_signal("Seeked", json!({ "position": position })))
            .await?,
        client
            .subscribe_properties_changed(|event| {
                let playback_status = event.playback_status();
                let volume = event.volume();
                print_signal(
                    "PropertiesChanged",
                    json!({
                        "interface": event.interface,
                        "changed": fields(&event.changed),
                        "invalidated": event.invalidated,
                        "playback_status": playback_status,
                        "volume": volume,
                    }),
                );
            })
            .await?,
        client
            .subscribe_playlist_changed(|playlist| {
                print_signal("PlaylistChanged", json!({ "playlist": playlist }));
            })
            .await?,
        client
            .subscribe_track_list_replaced(|event| {
                print_signal(
                    "TrackListReplaced",
                    json!({ "tracks": event.tracks, "current": event.current }),
                );
            })
            .await?,
        client
            .subscribe_track_added(|event| {
                print_signal(
                    "TrackAdded",
                    json!({
                        "metadata": metadata_fields(&event.metadata),
                        "after": event.after,
                    }),
                );
            })
            .await?,
        client
            .subscribe_track_removed(|track| {
                print_signal("TrackRemoved", json!({ "track": track }));
            })
            .await?,
        client
            .subscribe_track_metadata_changed(|event| {
                print_signal(
                    "TrackMetadataChanged",
                    json!({
                        "track": event.track,
                        "metadata": metadata_fields(&event.metadata),
                    }),
                );
            })
            .await?,
    ];
    tracing::info!(count = subscriptions.len(), "Listening for MPRIS signals");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for Ctrl-C")?;
    tracing::info!("Interrupted, removing subscriptions");
    for subscription in subscriptions {
        subscription.unsubscribe();
    }
    Ok(())
}

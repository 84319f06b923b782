use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use vibe_rs::api::{ApiClient, FavouritesRemote};
use vibe_rs::config::{PlayerConfig, DEFAULT_CONFIG_FILE};
use vibe_rs::logging;
use vibe_rs::model::{format_time, NowPlaying, PlaybackSource, Track};
use vibe_rs::session::{FixedPermission, SimulatedSession};
use vibe_rs::store::JsonFileStore;
use vibe_rs::{PlayerController, PlayerDeps};

const HELP: &str = "\
commands:
  queue <id> [<id>...] [@<start>]   play a list of song ids
  open <link>                       play a shared link
  downloads [<start>]               play downloaded songs
  toggle | next | prev | seek <s>   transport
  repeat                            cycle repeat mode
  end                               let the current track finish
  like | retry                      favourites
  status | recents | favourites     show state
  logout | quit";

#[tokio::main]
async fn main() -> Result<()> {
    let _log_guard = match logging::init_logging(Path::new(logging::LOG_DIR)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: Failed to initialize logging: {}", e);
            None
        }
    };

    tracing::info!("=== vibe-rs player starting ===");

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string());
    let config = PlayerConfig::load(&config_path)?;
    tracing::info!(api = %config.api_url, signed_in = config.user_email.is_some(), "Configuration loaded");

    let api = Arc::new(ApiClient::new(
        config.api_url.clone(),
        config.user_email.clone(),
        config.resolve_timeout(),
    )?);
    let favourites_remote: Option<Arc<dyn FavouritesRemote>> = if api.has_user() {
        Some(api.clone() as Arc<dyn FavouritesRemote>)
    } else {
        None
    };
    let session = Arc::new(SimulatedSession::new());
    let store = Arc::new(JsonFileStore::open(&config.store_path).await?);

    let controller = PlayerController::spawn(
        &config,
        PlayerDeps {
            session: session.clone(),
            resolver: api,
            favourites_remote,
            media_library: Arc::new(FixedPermission(true)),
            store,
        },
    )
    .await?;

    let mut notices = controller.notices();
    tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            eprintln!("! {}", notice.message());
        }
    });

    println!("{HELP}");
    let res = run_commands(&controller, &session).await;

    controller.shutdown().await;
    if let Err(err) = res {
        tracing::error!(error = ?err, "Command loop failed");
    }

    tracing::info!("vibe-rs player shutting down");
    Ok(())
}

async fn run_commands(controller: &PlayerController, session: &SimulatedSession) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let args: Vec<&str> = words.collect();
        tracing::debug!(command, ?args, "Command received");

        // Failures are already reported through the notice channel.
        let _ = match command {
            "queue" => {
                let (tracks, start) = parse_queue(&args);
                controller.start_queue(tracks, start, PlaybackSource::Search).await
            }
            "open" => match args.first() {
                Some(link) => controller.open_deep_link(link).await,
                None => Ok(()),
            },
            "downloads" => {
                let start = args.first().and_then(|a| a.parse().ok()).unwrap_or(0);
                controller.play_downloads(start).await
            }
            "toggle" | "pause" | "play" => controller.play_pause().await,
            "next" => controller.next().await,
            "prev" => controller.previous().await,
            "seek" => {
                let seconds = args.first().and_then(|a| a.parse().ok()).unwrap_or(f64::NAN);
                controller.seek_to(seconds).await
            }
            "repeat" => controller.toggle_repeat().await.map(|mode| println!("repeat {}", mode.label())),
            "end" => {
                session.finish_track();
                Ok(())
            }
            "like" => controller.toggle_favourite(None).await.map(|liked| println!("liked: {liked}")),
            "retry" => controller
                .retry_failed_favourites()
                .await
                .map(|count| println!("re-sent {count} favourites")),
            "status" => controller.refresh_status().await.map(|_| ()),
            "recents" => controller.recently_played().await.map(|tracks| print_tracks(&tracks)),
            "favourites" => controller.favourites().await.map(|tracks| print_tracks(&tracks)),
            "logout" => controller.clear_user_data().await,
            "quit" | "exit" => break,
            _ => {
                println!("{HELP}");
                Ok(())
            }
        };

        print_now_playing(&controller.now_playing());
    }

    Ok(())
}

/// `a b c @1` plays `[a, b, c]` from `b`.
fn parse_queue(args: &[&str]) -> (Vec<Track>, usize) {
    let mut start = 0;
    let mut tracks = Vec::new();
    for arg in args {
        match arg.strip_prefix('@') {
            Some(index) => start = index.parse().unwrap_or(0),
            None => tracks.push(Track::new(*arg, *arg, "Unknown Artist").with_source(PlaybackSource::Search)),
        }
    }
    (tracks, start)
}

fn print_now_playing(now: &NowPlaying) {
    match &now.track {
        Some(track) => println!(
            "[{}/{}] {} - {} {}/{} {:?} repeat:{}{}",
            now.index + 1,
            now.queue_len,
            track.title,
            track.artist,
            format_time(now.status.position),
            format_time(now.status.duration),
            now.status.state,
            now.status.repeat.label(),
            if now.liked { " ♥" } else { "" },
        ),
        None => println!("[idle]"),
    }
}

fn print_tracks(tracks: &[Track]) {
    for (i, track) in tracks.iter().enumerate() {
        println!("{:>3}. {} - {}", i + 1, track.title, track.artist);
    }
}

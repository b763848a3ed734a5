use airwave_client::{
    AudioConstraints, CallSession, CaptureDevice, CaptureError, CaptureHandle, CaptureProfile,
    ClientConfig, DEFAULT_RELAY_URL, OutboundQuality, SessionEvent, SignalingClient,
    SignalingConfig, SignalingEvent,
};
use airwave_core::{PeerId, RoomSummary};
use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Select;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser)]
#[command(name = "airwave", about = "Browse, broadcast to and listen to airwave rooms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct RelayArgs {
    /// Relay endpoint. Repeat for fallbacks; the first is primary.
    #[arg(long = "relay", value_name = "URL", default_value = DEFAULT_RELAY_URL)]
    relays: Vec<Url>,

    /// Per-attempt connect timeout.
    #[arg(long, default_value_t = 5000)]
    connect_timeout_ms: u64,

    #[arg(long, default_value_t = 3)]
    max_attempts: u32,
}

impl RelayArgs {
    fn signaling(&self) -> SignalingConfig {
        SignalingConfig {
            endpoints: self.relays.clone(),
            connect_timeout_ms: self.connect_timeout_ms,
            max_attempts: self.max_attempts,
            ..Default::default()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Print the active rooms.
    Rooms {
        /// Refresh the listing every N seconds until Ctrl-C.
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,

        #[command(flatten)]
        relay: RelayArgs,
    },
    /// Join a room as a listener.
    Listen {
        /// Room to join. Prompts from the live listing when omitted.
        #[arg(long)]
        room: Option<String>,

        #[command(flatten)]
        relay: RelayArgs,
    },
    /// Join a room as the broadcaster and stream the microphone.
    Broadcast {
        #[arg(long)]
        room: String,

        /// Input device name. Uses the system default when omitted.
        #[arg(long)]
        device: Option<String>,

        /// Capture profile: speech or music.
        #[arg(long, default_value = "speech")]
        profile: CaptureProfile,

        /// Outbound quality: high, standard or low.
        #[arg(long, default_value = "standard")]
        quality: OutboundQuality,

        #[command(flatten)]
        relay: RelayArgs,
    },
}

/// Listeners never capture; every open is refused.
struct NoCapture;

#[cfg(not(feature = "capture"))]
const NO_CAPTURE_REASON: &str = "built without the capture feature";
#[cfg(feature = "capture")]
const NO_CAPTURE_REASON: &str = "listener has no microphone";

#[async_trait]
impl CaptureDevice for NoCapture {
    async fn open_microphone(
        &self,
        _constraints: &AudioConstraints,
    ) -> Result<Arc<dyn CaptureHandle>, CaptureError> {
        Err(CaptureError::Unavailable(NO_CAPTURE_REASON.to_owned()))
    }

    async fn open_system_audio(&self) -> Result<Arc<dyn CaptureHandle>, CaptureError> {
        Err(CaptureError::Unavailable("listener has no display capture".to_owned()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match Cli::parse().command {
        Commands::Rooms { watch, relay } => rooms(relay, watch).await,
        Commands::Listen { room, relay } => listen(relay, room).await,
        Commands::Broadcast {
            room,
            device,
            profile,
            quality,
            relay,
        } => broadcast(relay, room, device, profile, quality).await,
    }
}

async fn rooms(relay: RelayArgs, watch: Option<u64>) -> Result<()> {
    let (client, mut events) = SignalingClient::new(relay.signaling(), PeerId::new());
    let url = client
        .connect("")
        .await
        .context("Could not reach any relay")?;
    println!("{} {}", "📡 Connected to".green().bold(), url);

    let Some(secs) = watch else {
        let rooms = next_listing(&mut events).await?;
        print_rooms(&rooms);
        client.close();
        return Ok(());
    };

    let mut refresh = tokio::time::interval(Duration::from_secs(secs.max(1)));
    // The connect already asked for a listing.
    refresh.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            _ = refresh.tick() => {
                client.get_rooms();
            }
            event = events.recv() => match event {
                Some(SignalingEvent::RoomsList { rooms }) => print_rooms(&rooms),
                Some(SignalingEvent::ConnectionError(e)) => bail!("Relay connection lost: {e}"),
                Some(SignalingEvent::Disconnected) | None => break,
                Some(_) => {}
            },
        }
    }

    client.close();
    Ok(())
}

async fn listen(relay: RelayArgs, room: Option<String>) -> Result<()> {
    let config = ClientConfig {
        signaling: relay.signaling(),
        ..Default::default()
    };
    let mut session = CallSession::with_webrtc(config, Arc::new(NoCapture));

    let room = match room {
        Some(room) => room,
        None => {
            session.connect().await.context("Could not reach any relay")?;
            let rooms = loop {
                match session.next_event().await {
                    Some(SessionEvent::RoomsList { rooms }) => break rooms,
                    Some(SessionEvent::Error { message }) => bail!(message),
                    Some(_) => continue,
                    None => bail!("Relay connection closed"),
                }
            };
            choose_room(rooms).await?
        }
    };

    let url = session
        .join(&room)
        .await
        .with_context(|| format!("Could not join room {room}"))?;
    session.declare_listener();
    println!(
        "{} {} {} {}",
        "🎧 Listening in".green().bold(),
        room.bold(),
        "via".dimmed(),
        url
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            event = session.next_event() => match event {
                Some(event) => print_event(&event),
                None => break,
            },
        }
    }

    session.hangup().await;
    session.signaling().close();
    println!("{}", "👋 Hung up".cyan());
    Ok(())
}

#[cfg(feature = "capture")]
fn capture_device(name: Option<String>) -> Arc<dyn CaptureDevice> {
    Arc::new(airwave_client::CpalCaptureDevice::new(name))
}

#[cfg(not(feature = "capture"))]
fn capture_device(_name: Option<String>) -> Arc<dyn CaptureDevice> {
    Arc::new(NoCapture)
}

async fn broadcast(
    relay: RelayArgs,
    room: String,
    device: Option<String>,
    profile: CaptureProfile,
    quality: OutboundQuality,
) -> Result<()> {
    let config = ClientConfig {
        signaling: relay.signaling(),
        ..Default::default()
    };
    let mut session = CallSession::with_webrtc(config, capture_device(device));

    let url = session
        .join(&room)
        .await
        .with_context(|| format!("Could not join room {room}"))?;
    session
        .declare_broadcaster()
        .await
        .context("Could not open the microphone")?;
    let report = session.apply_profile(profile);
    for (_, constraint) in report.skipped.iter().chain(&report.failed) {
        println!("{} {:?}", "⚠️  Input device ignores".yellow(), constraint);
    }
    println!(
        "{} {} {} {}",
        "🎙️  Broadcasting to".green().bold(),
        room.bold(),
        "via".dimmed(),
        url
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => break,
            event = session.next_event() => event,
        };
        let Some(event) = event else { break };
        print_event(&event);

        // Each new listener gets its own sender at the default rate.
        if matches!(event, SessionEvent::Established { .. }) && !session.set_quality(quality).await {
            eprintln!("{} {}", "❌".red(), "Could not apply outbound quality".red());
        }
    }

    session.hangup().await;
    session.signaling().close();
    println!("{}", "👋 Hung up".cyan());
    Ok(())
}

async fn next_listing(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<SignalingEvent>,
) -> Result<Vec<RoomSummary>> {
    while let Some(event) = events.recv().await {
        match event {
            SignalingEvent::RoomsList { rooms } => return Ok(rooms),
            SignalingEvent::ConnectionError(e) => return Err(e.into()),
            SignalingEvent::Disconnected => break,
            _ => {}
        }
    }
    bail!("Relay closed before sending the room list")
}

async fn choose_room(rooms: Vec<RoomSummary>) -> Result<String> {
    if rooms.is_empty() {
        bail!("No active rooms");
    }

    let items: Vec<String> = rooms
        .iter()
        .map(|room| format!("{} ({} connected)", room.id, room.count))
        .collect();
    let index = tokio::task::spawn_blocking(move || {
        Select::new()
            .with_prompt("Pick a room")
            .items(&items)
            .default(0)
            .interact()
    })
    .await
    .context("Room prompt failed")??;

    Ok(rooms[index].id.clone())
}

fn print_rooms(rooms: &[RoomSummary]) {
    if rooms.is_empty() {
        println!("{}", "No active rooms".yellow());
        return;
    }
    println!("{}", "Active rooms:".cyan().bold());
    for room in rooms {
        println!("  {:<24} {} connected", room.id.bold(), room.count);
    }
}

fn print_event(event: &SessionEvent) {
    match event {
        SessionEvent::Connected { url } => println!("{} {}", "📡 Connected to".green(), url),
        SessionEvent::Joined { room_id, peer_count } => {
            println!("{} {} ({} connected)", "✅ Joined".green(), room_id.bold(), peer_count)
        }
        SessionEvent::RoomsList { .. } => {}
        SessionEvent::Established { peer } => {
            println!("{} {}", "🔗 Channel established with".green().bold(), peer)
        }
        SessionEvent::RemoteTrack { peer } => println!("{} {}", "🔊 Receiving audio from".cyan(), peer),
        SessionEvent::PeerClosed { peer } => println!("{} {}", "⚠️  Channel closed:".yellow(), peer),
        SessionEvent::Error { message } => eprintln!("{} {}", "❌".red(), message.red()),
        SessionEvent::Disconnected => println!("{}", "Relay disconnected".yellow()),
    }
}

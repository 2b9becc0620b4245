use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use cueline_core::{
    ArtNet, AudioOutput, AudioTransport, ConfigManager, Cue, CueAction, DmxScene, DmxTransport,
    DmxUniverse, EasingType, MidiCommand, MidiTriggerType, MidirTransport, NetworkConfig, Project,
    ShowConsole, ShowEvent, Timeline, TimelineStep, TransportError, Transports, VideoSettings,
    VideoTransport,
};
use env_logger::Env;
use tokio::sync::mpsc;

/// Show control engine for live performances: cues, timelines, DMX and MIDI.
#[derive(Parser, Debug)]
#[command(name = "cueline")]
#[command(about = "Cueline show control")]
struct Args {
    /// Path to config.json (created with defaults if missing)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Art-Net Source IP address (overrides config)
    #[arg(long, value_parser = parse_ip)]
    source_ip: Option<IpAddr>,

    /// Art-Net Destination IP address (overrides config)
    #[arg(long, value_parser = parse_ip)]
    dest_ip: Option<IpAddr>,

    /// Art-Net port (overrides config)
    #[arg(long)]
    artnet_port: Option<u16>,

    /// Force broadcast mode even if destination IP is provided
    #[arg(long, default_value = "false")]
    broadcast: bool,

    /// Whether to enable MIDI support
    #[arg(short, long)]
    enable_midi: bool,

    /// MIDI clock tempo (overrides config)
    #[arg(long)]
    bpm: Option<f64>,

    /// Load a short demo show
    #[arg(long)]
    demo: bool,
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

/// Stands in for DMX hardware when output is disabled.
struct NoDmx;

impl DmxTransport for NoDmx {
    fn send(&mut self, _universe: u16, _frame: &[u8; 512]) -> Result<(), TransportError> {
        Ok(())
    }

    fn connect(&mut self, universe: &DmxUniverse) -> Result<(), TransportError> {
        log::info!("DMX disabled, universe {} not sent", universe.universe_number);
        Ok(())
    }

    fn disconnect(&mut self, _universe: u16) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Logs playback requests. Audio and video engines plug in here.
struct LogMedia;

#[async_trait]
impl AudioTransport for LogMedia {
    async fn play(&self, file: &str, outputs: &BTreeMap<u32, AudioOutput>) -> Result<(), TransportError> {
        log::info!("[audio] play {} on {} outputs", file, outputs.len());
        Ok(())
    }

    async fn stop(&self, file: &str) -> Result<(), TransportError> {
        log::info!("[audio] stop {}", file);
        Ok(())
    }

    async fn pause(&self, file: &str) -> Result<(), TransportError> {
        log::info!("[audio] pause {}", file);
        Ok(())
    }

    async fn resume(&self, file: &str) -> Result<(), TransportError> {
        log::info!("[audio] resume {}", file);
        Ok(())
    }
}

#[async_trait]
impl VideoTransport for LogMedia {
    async fn play(&self, file: &str, settings: &VideoSettings) -> Result<(), TransportError> {
        log::info!("[video] play {} on '{}'", file, settings.output_display);
        Ok(())
    }

    async fn stop(&self, file: &str) -> Result<(), TransportError> {
        log::info!("[video] stop {}", file);
        Ok(())
    }

    async fn pause(&self, file: &str) -> Result<(), TransportError> {
        log::info!("[video] pause {}", file);
        Ok(())
    }

    async fn resume(&self, file: &str) -> Result<(), TransportError> {
        log::info!("[video] resume {}", file);
        Ok(())
    }

    async fn seek(&self, file: &str, position: Duration) -> Result<(), TransportError> {
        log::info!("[video] seek {} to {:?}", file, position);
        Ok(())
    }
}

fn demo_project(bpm: f64) -> Project {
    let mut preset = Cue::new(1, "Preset");
    preset.duration = Duration::from_secs(2);
    preset.dmx_scenes.push(
        DmxScene::new("house warm", 1)
            .with_value(1, 255)
            .with_value(2, 180)
            .with_value(3, 90)
            .with_fade(Duration::from_secs(2)),
    );

    let mut chase = Cue::new(2, "Chase");
    chase.duration = Duration::from_secs(16);
    chase.audio_file = Some("intro.wav".to_string());
    chase.timelines.push(
        Timeline::new("pars chase", Duration::from_secs(2))
            .looped()
            .with_step(
                TimelineStep::new(1, 10, 0, 255)
                    .lasting(Duration::from_secs(1))
                    .with_easing(EasingType::EaseInOut),
            )
            .with_step(
                TimelineStep::new(1, 10, 255, 0)
                    .starting_at(Duration::from_secs(1))
                    .lasting(Duration::from_secs(1)),
            ),
    );
    chase.midi_commands.push(MidiCommand::program_change("", 1, 4).named("patch 4"));
    chase.midi_commands.push(
        MidiCommand::control_change("", 1, 20, 127)
            .with_trigger(MidiTriggerType::OnCueStop, Duration::ZERO)
            .named("lights down"),
    );
    chase.auto_follow = true;

    let mut out = Cue::new(3, "Out");
    out.action = CueAction::StopAll;
    out.dmx_scenes.push(
        DmxScene::new("dark", 1)
            .with_value(1, 0)
            .with_value(2, 0)
            .with_value(3, 0)
            .with_fade(Duration::from_secs(3)),
    );

    let mut project = Project::new("Demo")
        .with_cue(preset)
        .with_cue(chase)
        .with_cue(out);
    project.universes.push(DmxUniverse::new(1));
    project.settings.bpm = bpm;
    project
}

fn log_event(event: &ShowEvent) {
    match event {
        ShowEvent::StepExecuted { .. } | ShowEvent::ShowStateChanged { .. } => {
            log::trace!("{:?}", event)
        }
        ShowEvent::Error { message } => log::error!("{}", message),
        ShowEvent::TransportFailure { target, message } => log::warn!("{}: {}", target, message),
        other => log::info!("{:?}", other),
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load()?;
    if let Some(bpm) = args.bpm {
        settings.midi_clock_bpm = bpm;
    }
    if args.enable_midi {
        settings.midi_enabled = true;
    }

    let source_ip = match args.source_ip {
        Some(ip) => ip,
        None => settings.dmx_source_ip.parse()?,
    };
    let dest_ip = match args.dest_ip {
        Some(ip) => Some(ip),
        None => settings.dmx_dest_ip.parse().ok(),
    };
    let network_config = NetworkConfig::new(
        source_ip,
        dest_ip,
        args.artnet_port.unwrap_or(settings.dmx_port),
        args.broadcast || settings.dmx_broadcast,
    );

    let dmx: Box<dyn DmxTransport> = if settings.dmx_enabled {
        log::info!("Art-Net destination: {}", network_config.describe());
        Box::new(ArtNet::new(network_config)?)
    } else {
        Box::new(NoDmx)
    };

    let midi = Arc::new(MidirTransport::new());
    let mut inbound_rx = None;
    if settings.midi_enabled {
        match MidirTransport::available_outputs() {
            Ok(ports) => log::info!("MIDI outputs available: {:?}", ports),
            Err(e) => log::warn!("Could not list MIDI outputs: {}", e),
        }
        for device in &settings.midi_output_devices {
            if let Err(e) = midi.connect_output(device) {
                log::warn!("MIDI output '{}': {}", device, e);
            }
        }
        if settings.midi_input_device != "None" {
            let (tx, rx) = mpsc::unbounded_channel();
            match midi.connect_input(&settings.midi_input_device, tx) {
                Ok(()) => inbound_rx = Some(rx),
                Err(e) => log::warn!("MIDI input '{}': {}", settings.midi_input_device, e),
            }
        }
    }

    let media = Arc::new(LogMedia);
    let bpm = settings.midi_clock_bpm;
    let (handle, mut events, console) = ShowConsole::spawn(
        settings,
        Transports {
            dmx,
            midi,
            audio: media.clone(),
            video: media,
        },
        inbound_rx,
    );

    let event_logger = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log_event(&event);
        }
    });

    if args.demo {
        handle.load_project(demo_project(bpm)).await?;
        handle.go().await?;
    }

    log::info!("Cueline running, press Ctrl-C to stop");
    tokio::signal::ctrl_c().await?;

    handle.shutdown().await?;
    console.await?;
    drop(handle);
    event_logger.await?;
    Ok(())
}

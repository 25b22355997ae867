//! shift-mapper - run a shift-routed mapping against a MIDI control surface

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use shift_mapper::config::MappingConfig;
use shift_mapper::transport::{self, MidiOutputSink, EVENT_QUEUE};
use shift_mapper::{ConsoleSink, Controller, FeedbackSink, MemoryHost, SharedHost};
use std::path::PathBuf;
use std::rc::Rc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Shift-routed MIDI controller mapping for DJ software
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to mapping file
    #[arg(short, long, default_value = "mappings/bcr2000.yaml")]
    mapping: PathBuf,

    /// Input port name pattern (overrides the mapping file)
    #[arg(short, long)]
    input: Option<String>,

    /// Output port name pattern (overrides the mapping file)
    #[arg(short, long)]
    output: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Validate the mapping and print a summary
    #[arg(long)]
    check: bool,

    /// Log feedback instead of sending it to an output port
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    /// Human-readable lines
    Text,
    /// One JSON object per event
    Json,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_logging(&args.log_level, args.log_format)?;

    if args.list_ports {
        print_ports()?;
        return Ok(());
    }

    info!("Mapping file: {}", args.mapping.display());
    let config = MappingConfig::load(&args.mapping).await?;

    if args.check {
        print_summary(&config)?;
        return Ok(());
    }

    run(args, config).await?;
    info!("shift-mapper shutdown complete");
    Ok(())
}

async fn run(args: Args, config: MappingConfig) -> Result<()> {
    let ports = config.midi.clone().unwrap_or_default();
    let input_pattern = args
        .input
        .or(ports.input_port)
        .context("No input port given (use --input or midi.input_port)")?;

    let sink: Rc<dyn FeedbackSink> = if args.dry_run {
        info!("Dry run: feedback is logged only");
        Rc::new(ConsoleSink)
    } else {
        let pattern = args
            .output
            .or(ports.output_port)
            .context("No output port given (use --output, midi.output_port or --dry-run)")?;
        let output = MidiOutputSink::connect(&pattern)?;
        info!("💡 Feedback goes to '{}'", output.port());
        Rc::new(output)
    };

    // No engine attached: controls live in the loopback host
    let host: SharedHost = Rc::new(MemoryHost::new());
    let controller = Controller::build(&config, host, sink)?;
    controller.start()?;

    let (tx, mut rx) = mpsc::channel(EVENT_QUEUE);
    let _input = transport::connect_input(&input_pattern, tx)?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    info!("🚀 Listening on '{}' (level '{}')", input_pattern, controller.current_level());
    loop {
        tokio::select! {
            event = rx.recv() => {
                let Some(event) = event else {
                    warn!("Input port closed");
                    break;
                };
                if let Err(e) = controller.handle_midi(&event.raw, event.at) {
                    warn!("⚠️  {:#}", e);
                }
            }
            signal = &mut shutdown => {
                signal?;
                break;
            }
        }
    }

    Ok(())
}

fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_thread_names(false),
            )
            .init(),
    }

    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to install CTRL+C signal handler")?;
    info!("Shutdown signal received");
    Ok(())
}

fn print_ports() -> Result<()> {
    use colored::*;

    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());
    for (title, ports) in [
        ("Input Ports:", transport::list_input_ports()?),
        ("Output Ports:", transport::list_output_ports()?),
    ] {
        println!("\n{}", title.bold());
        if ports.is_empty() {
            println!("  {}", "No ports found".dimmed());
        }
        for port in ports {
            println!("  {}", port);
        }
    }
    println!();
    Ok(())
}

fn print_summary(config: &MappingConfig) -> Result<()> {
    use colored::*;

    // Building wires every handler, so it catches what validation cannot
    let controller = Controller::build(config, Rc::new(MemoryHost::new()), Rc::new(ConsoleSink))?;

    println!("\n{}", format!("=== Mapping '{}' ===", config.name).bold().cyan());
    let levels = controller
        .shifter()
        .levels()
        .iter()
        .map(|(id, name)| format!("{} {}", id, name))
        .collect::<Vec<_>>()
        .join(", ");
    println!("  Levels: {}", levels.green());
    println!("  Inputs: {}", controller.input_count().to_string().green());
    println!("  Startup commands: {}", config.startup.len().to_string().green());

    println!("\n{}", "Modifiers:".bold());
    for modifier in &config.modifiers {
        println!("  {} → level {}", modifier.input.addr()?.to_string().yellow(), modifier.level.cyan());
    }

    println!("\n{}", "Controls:".bold());
    for control in &config.controls {
        let levels = if control.routes.is_empty() {
            "all levels".dimmed().to_string()
        } else {
            control.routes.keys().cloned().collect::<Vec<_>>().join(",")
        };
        println!(
            "  {:<24} {:<16} {:<32} {}",
            control.name.bright_white(),
            control.input_addr()?.to_string().yellow(),
            control.group.to_string(),
            levels
        );
    }

    println!("\n{}", "✅ Mapping is valid".green().bold());
    Ok(())
}

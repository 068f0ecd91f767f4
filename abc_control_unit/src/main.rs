//! # ABC Control Unit
//!
//! Auto-balancer control loop against the simulated biped.
//!
//! Loads and validates the balancer TOML, builds the engine (with a gait
//! generator when `leg_offset` is configured), feeds the standing posture as
//! the reference every cycle, optionally engages balance control with the
//! configured limbs, performs RT setup, and enters the cycle loop until
//! Ctrl-C or the requested duration elapses.

use abc_common::config::LoggingConfig;
use abc_control_unit::config::load_config;
use abc_control_unit::control::balance::AutoBalancer;
use abc_control_unit::cycle::{CycleRunner, rt_setup};
use abc_control_unit::service::BalancerService;
use abc_control_unit::state::mode::ControlMode;
use abc_sim::SimBiped;
use clap::Parser;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

/// ABC Control Unit: auto-balancer control loop
#[derive(Parser, Debug)]
#[command(name = "abc_control_unit")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Active balance control loop for a legged robot")]
struct Args {
    /// Path to the balancer configuration TOML.
    #[arg(default_value = "config/abc.toml")]
    config: PathBuf,

    /// CPU core to pin the RT thread to (default: 1).
    #[arg(long, default_value_t = 1)]
    cpu_core: usize,

    /// SCHED_FIFO priority (default: 80).
    #[arg(long, default_value_t = 80)]
    rt_priority: i32,

    /// Engage balance control with the configured limbs before the loop.
    #[arg(long)]
    start: bool,

    /// Stop after this many seconds (default: run until Ctrl-C).
    #[arg(long, value_name = "SECONDS")]
    duration: Option<f64>,

    /// Enable verbose logging (DEBUG level).
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format (also enabled by `logging.json`).
    #[arg(long)]
    json: bool,
}

fn main() {
    let args = Args::parse();
    let config = load_config(&args.config);
    setup_tracing(
        &args,
        config.as_ref().map(|c| c.logging).unwrap_or_default(),
    );

    info!("ABC Control Unit v{} starting...", env!("CARGO_PKG_VERSION"));

    let result = config
        .map_err(|e| Box::new(e) as Box<dyn std::error::Error>)
        .and_then(|config| run(&args, config));
    if let Err(e) = result {
        error!("FATAL: {e}");
        process::exit(1);
    }

    info!("ABC Control Unit shutdown complete");
}

fn run(
    args: &Args,
    config: abc_control_unit::config::BalancerConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let dt = config.balancer.dt;
    info!(
        "Config OK: {}, dt={}s, limbs={}, walking={}",
        args.config.display(),
        dt,
        config.limbs.len(),
        config.balancer.leg_offset.is_some()
    );

    let posture = SimBiped::standing_posture();
    let balancer = AutoBalancer::new(
        SimBiped::default(),
        config.build_gait(),
        dt,
        config.balancer.debug_level,
    );
    let service = Arc::new(BalancerService::new(balancer));
    service.write_reference(&posture);

    if args.start && !service.start_auto_balancer(&config.limbs) {
        return Err("startAutoBalancer rejected".into());
    }

    rt_setup(args.cpu_core, args.rt_priority)?;
    info!(
        "RT setup complete (cpu_core={}, priority={})",
        args.cpu_core, args.rt_priority
    );

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        r.store(false, Ordering::SeqCst);
    })?;

    let mut runner = CycleRunner::new(Arc::clone(&service), dt, running).with_reference_source(
        Box::new(move |_cycle: u64, reference: &mut Vec<f64>| {
            reference.copy_from_slice(&posture);
            true
        }),
    );
    if let Some(seconds) = args.duration {
        runner = runner.with_max_cycles((seconds / dt).round() as u64);
    }

    if let Err(e) = runner.run() {
        error!("RT loop error: {e}");
        return Err(Box::new(e) as Box<dyn std::error::Error>);
    }

    if service.mode() == ControlMode::Abc && !service.stop_auto_balancer() {
        warn!("stopAutoBalancer rejected at shutdown");
    }

    let stats = &runner.stats;
    info!(
        "Cycles={} avg={}ns min={}ns max={}ns overruns={} loops={}",
        stats.cycle_count,
        stats.avg_cycle_ns(),
        if stats.cycle_count == 0 { 0 } else { stats.min_cycle_ns },
        stats.max_cycle_ns,
        stats.overruns,
        service.with_balancer(|b| b.loop_count())
    );
    Ok(())
}

/// Setup tracing subscriber; CLI flags override the `[logging]` section.
fn setup_tracing(args: &Args, logging: LoggingConfig) {
    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::from(logging.level)
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.json || logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .compact()
            .init();
    }
}

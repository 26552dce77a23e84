use anyhow::{bail, Result};
use clap::{Arg, Command};
use log::{info, LevelFilter};
use simplelog::{Config as LogConfig, WriteLogger};
use std::fs::{self, File};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tunsniff::config::Config;
use tunsniff::network::capture::{CaptureConfig, FrameIo, TunInterface};
use tunsniff::network::pipeline::{Pipeline, PipelineConfig};
use tunsniff::storage::MemoryStore;

fn main() -> Result<()> {
    // Parse command line arguments
    let matches = Command::new("tunsniff")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Passive traffic inspector for TUN interfaces")
        .arg(
            Arg::new("interface")
                .short('i')
                .long("interface")
                .value_name("DEVICE")
                .help("TUN device to attach to (e.g. tun0)")
                .required(false),
        )
        .arg(
            Arg::new("fd")
                .long("fd")
                .value_name("FD")
                .help("Adopt an already-established TUN file descriptor")
                .value_parser(clap::value_parser!(i32))
                .required(false),
        )
        .arg(
            Arg::new("workers")
                .short('w')
                .long("workers")
                .value_name("COUNT")
                .help("Number of analysis worker threads")
                .value_parser(clap::value_parser!(usize))
                .required(false),
        )
        .arg(
            Arg::new("queue-depth")
                .long("queue-depth")
                .value_name("FRAMES")
                .help("Analysis queue capacity (a full queue drops analyses, never frames)")
                .value_parser(clap::value_parser!(usize))
                .required(false),
        )
        .arg(
            Arg::new("store-capacity")
                .long("store-capacity")
                .value_name("RECORDS")
                .help("Number of packet records kept in memory")
                .value_parser(clap::value_parser!(usize))
                .required(false),
        )
        .arg(
            Arg::new("duration")
                .short('d')
                .long("duration")
                .value_name("SECONDS")
                .help("Stop after this many seconds (default: run until Ctrl-C)")
                .value_parser(clap::value_parser!(u64))
                .required(false),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("Set the log level (if not provided, no logging will be enabled)")
                .value_parser(clap::value_parser!(LevelFilter))
                .required(false),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .required(false),
        )
        .get_matches();

    // Set up logging only if log-level was provided
    if let Some(log_level) = matches.get_one::<LevelFilter>("log-level") {
        setup_logging(*log_level)?;
    }

    info!("Starting tunsniff");

    // Build configuration from file and command line arguments
    let mut config = Config::load(matches.get_one::<String>("config").map(String::as_str))?;

    if let Some(interface) = matches.get_one::<String>("interface") {
        config.interface = Some(interface.to_string());
        info!("Using interface: {}", interface);
    }

    if let Some(fd) = matches.get_one::<i32>("fd") {
        config.tun_fd = Some(*fd);
        info!("Using inherited file descriptor: {}", fd);
    }

    if let Some(workers) = matches.get_one::<usize>("workers") {
        config.workers = *workers;
        info!("Using {} analysis workers", workers);
    }

    if let Some(depth) = matches.get_one::<usize>("queue-depth") {
        config.queue_depth = *depth;
    }

    if let Some(capacity) = matches.get_one::<usize>("store-capacity") {
        config.store_capacity = *capacity;
    }

    // Acquire the capture interface. This is the only fatal failure: the
    // loop never starts without a handle.
    let capture = CaptureConfig {
        interface: config.interface.clone(),
        tun_fd: config.tun_fd,
        mtu: config.mtu,
        ..CaptureConfig::default()
    };
    let io: Box<dyn FrameIo> = if let Some(fd) = capture.tun_fd {
        Box::new(TunInterface::from_fd(fd, capture.mtu, capture.timeout_ms)?)
    } else if let Some(name) = &capture.interface {
        Box::new(TunInterface::open(name, capture.mtu, capture.timeout_ms)?)
    } else {
        bail!("no capture interface: pass --interface <device> or --fd <fd>");
    };

    let store = Arc::new(MemoryStore::new(config.store_capacity));
    let pipeline = Pipeline::start(
        PipelineConfig {
            workers: config.workers,
            queue_depth: config.queue_depth,
        },
        io,
        store.clone(),
    )?;

    // Stop on Ctrl-C or after --duration seconds
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = shutdown.clone();
        ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))?;
    }
    let duration = matches.get_one::<u64>("duration").copied();
    let started = Instant::now();

    while !shutdown.load(Ordering::SeqCst) {
        if let Some(secs) = duration {
            if started.elapsed() >= Duration::from_secs(secs) {
                break;
            }
        }
        thread::sleep(Duration::from_millis(config.refresh_interval));

        let stats = pipeline.stats();
        let traffic = store.statistics();
        info!(
            "forwarded {} frames, analyzed {} ({} dropped); {} packets stored, {} vulnerable, encryption rate {}%",
            stats.frames_forwarded,
            stats.frames_analyzed,
            stats.analysis_dropped,
            traffic.total_packets,
            traffic.vulnerabilities,
            traffic.encryption_rate
        );
    }

    pipeline.stop();

    let traffic = store.statistics();
    println!(
        "Captured {} packets ({} HTTP, {} HTTPS), {} with findings, encryption rate {}%",
        traffic.total_packets,
        traffic.http_requests,
        traffic.https_requests,
        traffic.vulnerabilities,
        traffic.encryption_rate
    );

    info!("tunsniff shutting down");
    Ok(())
}

fn setup_logging(level: LevelFilter) -> Result<()> {
    // Create logs directory if it doesn't exist
    let log_dir = Path::new("logs");
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    // Create timestamped log file name
    let timestamp = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S");
    let log_file_path = log_dir.join(format!("tunsniff_{}.log", timestamp));

    // Initialize the logger
    WriteLogger::init(level, LogConfig::default(), File::create(log_file_path)?)?;

    Ok(())
}

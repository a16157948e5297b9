use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::Parser;
use minptp::{observability::ClientStatus, Client, ClockIdentity};
use minptp_linux::{
    clock::LinuxClock,
    config::{Config, LogLevel, PtpMode},
    network::linux::{LinuxInterface, Ports},
    observer::{self, MeasurementLogger},
    setup_logger,
};
use rand::{rngs::StdRng, SeedableRng};
use timestamped_socket::interface::InterfaceName;
use tokio::{sync::watch, time::MissedTickBehavior};

/// Time between two ticks of the client, below the fastest message rate
const TICK_INTERVAL: Duration = Duration::from_millis(50);

mod exitcode {
    /// An internal software error has been detected.
    pub const SOFTWARE: i32 = 70;

    /// Something was found in an unconfigured or misconfigured state.
    pub const CONFIG: i32 = 78;
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Configuration file to use
    #[clap(
        long = "config",
        short = 'c',
        default_value = "/etc/minptp/minptp.toml"
    )]
    config_file: PathBuf,

    /// Override the log level of the configuration file
    #[clap(short, long)]
    loglevel: Option<LogLevel>,

    /// Override the mode of the configuration file
    #[clap(short, long)]
    mode: Option<PtpMode>,

    /// Override the network device to run on
    #[clap(short, long, value_parser = parse_interface)]
    interface: Option<InterfaceName>,
}

fn parse_interface(name: &str) -> Result<InterfaceName, String> {
    InterfaceName::from_str(name).map_err(|_| format!("'{name}' is not a network device name"))
}

type LinuxClient<'a> = Client<'a, LinuxInterface, StdRng>;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match Config::from_file(&args.config_file).await {
        Ok(config) => config,
        Err(error) => {
            // logging is not set up yet
            eprintln!(
                "could not load config {}: {error}",
                args.config_file.display()
            );
            std::process::exit(exitcode::CONFIG);
        }
    };

    if let Some(loglevel) = args.loglevel {
        config.loglevel = loglevel;
    }
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(interface) = args.interface {
        config.interface = interface;
    }

    if let Err(error) = setup_logger(config.loglevel) {
        eprintln!("could not set up logging: {error}");
        std::process::exit(exitcode::SOFTWARE);
    }

    let clock = LinuxClock::realtime(config.utc_offset);
    let interface = match LinuxInterface::open(config.interface, Ports::default(), clock) {
        Ok(interface) => interface,
        Err(error) => {
            tracing::error!("could not open network interface: {error}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    let fallback_identity = ClockIdentity(rand::random());
    let client_config = config.client_config(fallback_identity);
    tracing::info!(
        identity = %client_config.clock_identity,
        mode = ?config.mode,
        "starting PTP client"
    );

    let logger = MeasurementLogger;
    let mut client = Client::new(
        interface,
        client_config,
        config.mode.into(),
        StdRng::from_entropy(),
    );
    if client.add_callback(&logger).is_err() {
        tracing::error!("could not register the measurement logger");
    }

    let (status_sender, status_receiver) = watch::channel(client.status());
    observer::spawn(&config.observability, status_receiver);

    run(&mut client, &status_sender).await;
}

async fn run(client: &mut LinuxClient<'_>, status: &watch::Sender<ClientStatus>) {
    let mut buffer = LinuxInterface::recv_buffer();

    let mut ticker = tokio::time::interval(TICK_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = tokio::time::Instant::now();

    loop {
        tokio::select! {
            received = client.interface_mut().recv(&mut buffer) => match received {
                Ok((length, timestamp)) => client.ptp_rcvd(&buffer[..length], timestamp),
                Err(error) => tracing::warn!("receiving failed: {error}"),
            },
            now = ticker.tick() => {
                client.tick(now - last_tick);
                last_tick = now;
            }
        }

        status.send_replace(client.status());
    }
}

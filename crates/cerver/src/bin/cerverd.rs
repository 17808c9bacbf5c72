//! CLI entry point for the balancer. Parses a `BalancerConfig` from
//! flags, starts a `Balancer`, installs signal handlers, and blocks
//! until teardown completes.

use std::time::Duration;

use cerver::{
    balancer::Balancer,
    config::{BalancerConfig, ServiceConfig, StartPolicy},
    lifecycle::install_signal_handlers,
};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "cerverd", about = "Front-end load balancer for pooled TCP back-ends")]
struct CliArgs {
    /// Display name for this balancer instance.
    #[arg(long, default_value = "cerver")]
    name: String,

    /// TCP port to listen on for clients.
    #[arg(long)]
    port: u16,

    /// Listen backlog for the accept socket.
    #[arg(long, default_value_t = 128)]
    backlog: i32,

    /// Back-end service, repeatable: ADDR:PORT[,wait=SECS][,name=STR]
    #[arg(long = "service", required = true, value_parser = parse_service)]
    services: Vec<ServiceConfig>,

    /// Balancing policy. `round-robin` is the only accepted value today.
    #[arg(long, default_value = "round-robin")]
    policy: String,

    /// Require every configured service to reach WORKING before starting,
    /// instead of the default "at least one".
    #[arg(long)]
    require_all_services: bool,

    /// Raise the default tracing verbosity.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_service(s: &str) -> Result<ServiceConfig, String> {
    let mut parts = s.split(',');
    let addr_port = parts.next().ok_or("expected ADDR:PORT")?;
    let (addr, port) = addr_port.rsplit_once(':').ok_or_else(|| format!("expected ADDR:PORT, got {addr_port}"))?;
    let port: u16 = port.parse().map_err(|_| format!("invalid port: {port}"))?;

    let mut config = ServiceConfig::new(addr, port);
    for kv in parts {
        let (key, value) = kv.split_once('=').ok_or_else(|| format!("expected key=value, got {kv}"))?;
        match key {
            "wait" => {
                let secs: u64 = value.parse().map_err(|_| format!("invalid wait seconds: {value}"))?;
                config = config.with_reconnect_wait(Duration::from_secs(secs));
            }
            "name" => config = config.with_name(value),
            other => return Err(format!("unknown service option: {other}")),
        }
    }
    Ok(config)
}

fn init_logging(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();
}

fn main() {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    if args.policy != "round-robin" {
        eprintln!("unsupported --policy {:?}; only 'round-robin' is accepted", args.policy);
        std::process::exit(2);
    }

    let mut config = BalancerConfig::new(args.name, args.port, args.backlog);
    for service in args.services {
        config = config.with_service(service);
    }
    if args.require_all_services {
        config = config.with_start_policy(StartPolicy::RequireAll);
    }

    let balancer = match Balancer::new(config) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(2);
        }
    };

    if let Err(e) = balancer.start("0.0.0.0") {
        eprintln!("failed to start balancer: {e}");
        std::process::exit(1);
    }

    install_signal_handlers(&balancer);

    while !balancer.is_stopping() {
        std::thread::sleep(Duration::from_millis(500));
    }

    balancer.join();
    std::process::exit(0);
}

use clap::{Arg, ArgAction, Command};
use colored::*;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process;

use deimos::{
    config::ScanConfig,
    network::ScanMode,
    output::{OutputConfig, OutputManager},
    scanner::{engine::ScanEngine, ScanResults},
    utils::ports::{apply_exclusions, parse_ports},
};

// Ulimit adjustment for Unix systems
#[cfg(unix)]
fn adjust_ulimit_size(ulimit: Option<u64>) {
    use rlimit::Resource;

    if let Some(limit) = ulimit {
        if Resource::NOFILE.set(limit, limit).is_ok() {
            println!(
                "{} {}",
                "[~] Raised NOFILE limit to".bright_blue(),
                limit.to_string().bright_cyan().bold()
            );
        } else {
            eprintln!("{}", "[!] Failed to raise NOFILE limit".bright_red());
        }
    }
}

#[cfg(not(unix))]
fn adjust_ulimit_size(_ulimit: Option<u64>) {}

fn build_cli() -> Command {
    Command::new("deimos")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Deimos: high-throughput TCP port scanner with SYN and connect modes")
        .arg(
            Arg::new("targets")
                .value_name("TARGET")
                .help("Targets to scan: IPs, CIDRs, hostnames, or files of those")
                .required(true)
                .num_args(1..),
        )
        .arg(
            Arg::new("ports")
                .short('p')
                .long("ports")
                .value_name("PORTS")
                .help("Ports to scan (e.g. 80,443,8000-8100, full, top-100, top-1000)")
                .default_value("top-100"),
        )
        .arg(
            Arg::new("exclude-ports")
                .short('x')
                .long("exclude-ports")
                .value_name("PORTS")
                .help("Comma-separated ports to drop from the port list")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("rate")
                .short('r')
                .long("rate")
                .value_name("PPS")
                .help("Packet rate cap; also bounds connect concurrency")
                .value_parser(clap::value_parser!(usize))
                .default_value("1000"),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .value_name("COUNT")
                .help("Additional passes over the search space")
                .value_parser(clap::value_parser!(usize))
                .default_value("3"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("MS")
                .help("Per-connect timeout in milliseconds")
                .value_parser(clap::value_parser!(u64))
                .default_value("1000"),
        )
        .arg(
            Arg::new("scan-type")
                .short('s')
                .long("scan-type")
                .value_name("TYPE")
                .help("Scan technique (syn requires root)")
                .value_parser(["syn", "connect"])
                .default_value("connect"),
        )
        .arg(
            Arg::new("source-ip")
                .long("source-ip")
                .value_name("IP")
                .help("Source address for raw-mode packets")
                .value_parser(clap::value_parser!(Ipv4Addr)),
        )
        .arg(
            Arg::new("interface")
                .short('i')
                .long("interface")
                .value_name("NAME")
                .help("Network interface for raw-mode packets"),
        )
        .arg(
            Arg::new("exclude-cdn")
                .long("exclude-cdn")
                .help("Restrict CDN-hosted addresses to ports 80 and 443")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("exclude-ips")
                .long("exclude-ips")
                .value_name("IPS")
                .help("Addresses to skip: IPs, ranges, or CIDRs")
                .value_delimiter(','),
        )
        .arg(
            Arg::new("verify")
                .long("verify")
                .help("Re-probe discovered ports via connect after the scan")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("warm-up-time")
                .long("warm-up-time")
                .value_name("SECONDS")
                .help("Post-scan sleep to collect late SYN/ACKs")
                .value_parser(clap::value_parser!(u64))
                .default_value("2"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Write results to a file as well as the stream")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Emit structured JSON records")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("progress")
                .long("progress")
                .help("Print scan statistics every five seconds")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("nmap-cli")
                .long("nmap-cli")
                .value_name("COMMAND")
                .help("Command to run against discovered ports after the scan"),
        )
        .arg(
            Arg::new("ulimit")
                .short('u')
                .long("ulimit")
                .value_name("LIMIT")
                .help("Raise the NOFILE limit to this value")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Verbose (debug) logging")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    let matches = build_cli().get_matches();

    let mut builder = env_logger::Builder::from_default_env();
    if matches.get_flag("verbose") {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();

    adjust_ulimit_size(matches.get_one::<u64>("ulimit").copied());

    let mut ports = match parse_ports(matches.get_one::<String>("ports").map(String::as_str).unwrap_or("top-100")) {
        Ok(ports) => ports,
        Err(e) => {
            eprintln!("{} {}", "[!]".bright_red(), e);
            process::exit(1);
        }
    };
    if let Some(excluded) = matches.get_many::<String>("exclude-ports") {
        let excluded: Vec<u16> = excluded.filter_map(|s| s.trim().parse().ok()).collect();
        apply_exclusions(&mut ports, &excluded);
    }

    let mode: ScanMode = match matches
        .get_one::<String>("scan-type")
        .map(String::as_str)
        .unwrap_or("connect")
        .parse()
    {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{} {}", "[!]".bright_red(), e);
            process::exit(1);
        }
    };

    let config = ScanConfig {
        targets: matches
            .get_many::<String>("targets")
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default(),
        ports,
        exclude_ips: matches
            .get_many::<String>("exclude-ips")
            .map(|vals| vals.cloned().collect())
            .unwrap_or_default(),
        rate: *matches.get_one::<usize>("rate").unwrap_or(&1000),
        retries: *matches.get_one::<usize>("retries").unwrap_or(&3),
        timeout: *matches.get_one::<u64>("timeout").unwrap_or(&1000),
        mode,
        verify: matches.get_flag("verify"),
        warm_up_time: *matches.get_one::<u64>("warm-up-time").unwrap_or(&2),
        exclude_cdn: matches.get_flag("exclude-cdn"),
        source_ip: matches.get_one::<Ipv4Addr>("source-ip").copied(),
        interface: matches.get_one::<String>("interface").cloned(),
        output: matches.get_one::<PathBuf>("output").cloned(),
        json: matches.get_flag("json"),
        progress: matches.get_flag("progress"),
        nmap_cli: matches.get_one::<String>("nmap-cli").cloned(),
    };

    println!(
        "{} {} | {} {} ports | {} {} | {} {} pps",
        "Starting deimos".bright_green().bold(),
        env!("CARGO_PKG_VERSION").bright_green(),
        "scanning".bright_yellow(),
        config.ports.len().to_string().bright_white().bold(),
        "mode".bright_yellow(),
        config.mode.name().bright_white().bold(),
        "rate".bright_yellow(),
        config.rate.to_string().bright_white().bold(),
    );

    let engine = match ScanEngine::new(config.clone()).await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("{} {}", "[!] Setup failed:".bright_red().bold(), e);
            process::exit(1);
        }
    };

    if let Err(e) = engine.run().await {
        eprintln!("{} {}", "[!] Scan failed:".bright_red().bold(), e);
        engine.close();
        process::exit(1);
    }

    let output_manager = OutputManager::new(OutputConfig {
        json: config.json,
        file: config.output.clone(),
    });
    if let Err(e) = output_manager.write_results(engine.results(), engine.targets()) {
        log::error!("could not emit results: {}", e);
    }

    if let Some(nmap_cli) = &config.nmap_cli {
        run_nmap(nmap_cli, engine.results());
    }

    engine.close();
}

/// Hand the discovered ports to an external command, naabu-style:
/// `<command> -p <ports> <hosts...>`.
fn run_nmap(nmap_cli: &str, results: &ScanResults) {
    use std::process::Command;

    if results.is_empty() {
        log::info!("skipping post-scan command, nothing was found");
        return;
    }

    let mut parts = nmap_cli.split_whitespace();
    let Some(program) = parts.next() else {
        return;
    };

    let all_ports: BTreeSet<u16> = results
        .snapshot()
        .iter()
        .flat_map(|(_, ports)| ports.iter().copied())
        .collect();
    let ports_arg = all_ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(",");
    let hosts: Vec<String> = results
        .snapshot()
        .iter()
        .map(|(ip, _)| ip.to_string())
        .collect();

    let mut cmd = Command::new(program);
    cmd.args(parts).arg("-p").arg(&ports_arg).args(&hosts);

    println!(
        "{} {} -p {} {}",
        "[~] Running".bright_blue(),
        program.bright_cyan(),
        ports_arg,
        hosts.join(" ")
    );

    match cmd.status() {
        Ok(status) if !status.success() => {
            eprintln!("{} exited with {}", program, status);
        }
        Ok(_) => {}
        Err(e) => {
            eprintln!("Failed to run {}: {}. Is it installed?", program, e);
        }
    }
}

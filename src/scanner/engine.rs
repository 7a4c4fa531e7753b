//! The scan orchestration engine
//!
//! Drives the retry-wrapped, shuffled, rate-limited enumeration of the
//! (host x port) space and owns both worker subsystems. The result store is
//! the only structure shared with producers.

use crate::config::ScanConfig;
use crate::network::protocol::RateLimiter;
use crate::network::{socket, ScanMode};
use crate::output::progress::{ProgressLabels, ProgressReporter};
use crate::scanner::connect;
use crate::scanner::results::ScanResults;
use crate::scanner::shuffle::BlackRock;
use crate::scanner::syn::SynScanner;
use crate::scanner::{RunnerPhase, ScanCounters, ScanState};
use crate::utils::cdn::{CdnFilter, CdnProvider, RangeCdnProvider};
use crate::utils::exclusions::AddressExclusions;
use crate::utils::targets::{TargetIndex, TargetLoader};
use crate::ScanError;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Fixed permutation key. Every retry pass replays the same traversal and
/// the result store's dedup absorbs duplicate successes.
const PERMUTATION_SEED: u64 = 43;

pub struct ScanEngine {
    config: ScanConfig,
    targets: TargetIndex,
    ports: Arc<Vec<u16>>,
    results: Arc<ScanResults>,
    state: Arc<ScanState>,
    counters: Arc<ScanCounters>,
    cdn: Arc<CdnFilter>,
    exclusions: Arc<AddressExclusions>,
    syn: Option<Arc<SynScanner>>,
}

impl ScanEngine {
    /// Create a new engine with the built-in CDN provider.
    pub async fn new(config: ScanConfig) -> crate::Result<Self> {
        Self::with_cdn_provider(config, Box::new(RangeCdnProvider::builtin())).await
    }

    /// Create a new engine with a caller-supplied CDN provider.
    ///
    /// Performs all fatal setup: configuration validation, raw handler and
    /// collector startup for SYN mode, source resolution, target ingest and
    /// coalescing, and filter construction.
    pub async fn with_cdn_provider(
        config: ScanConfig,
        provider: Box<dyn CdnProvider>,
    ) -> crate::Result<Self> {
        config.validate()?;

        let results = Arc::new(ScanResults::new());
        let state = Arc::new(ScanState::new());
        let counters = Arc::new(ScanCounters::default());

        let syn = if config.mode == ScanMode::Syn {
            if !socket::has_raw_socket_privilege() {
                return Err(ScanError::PermissionError(
                    "syn scan requires root; rerun with --scan-type connect".to_string(),
                ));
            }
            let scanner = Arc::new(SynScanner::new(config.source_ip, config.interface.clone())?);
            scanner.start_workers(Arc::clone(&results), Arc::clone(&state));
            log::info!(
                "raw handlers ready on {} (source {}:{})",
                scanner.interface(),
                scanner.source_ip(),
                scanner.source_port()
            );
            Some(scanner)
        } else {
            None
        };

        let mut targets = TargetLoader.load(&config.targets)?;
        targets.coalesce();
        if targets.count() == 0 {
            return Err(ScanError::InvalidTarget(
                "no scannable hosts after target ingest".to_string(),
            ));
        }

        let exclusions = Arc::new(AddressExclusions::parse(&config.exclude_ips)?);
        let cdn = Arc::new(CdnFilter::with_provider(config.exclude_cdn, provider));
        let ports = Arc::new(config.ports.clone());

        Ok(Self {
            config,
            targets,
            ports,
            results,
            state,
            counters,
            cdn,
            exclusions,
            syn,
        })
    }

    /// Run the enumeration flow: retry-wrapped shuffled dispatch, pool
    /// barrier, warm-up, state transition, optional verification.
    pub async fn run(&self) -> crate::Result<()> {
        self.state.advance(RunnerPhase::Scan);

        let hosts = self.targets.count();
        let port_count = self.ports.len() as u64;
        let space = hosts * port_count;
        let passes = self.config.retries as u64 + 1;

        let reporter = if self.config.progress {
            Some(ProgressReporter::start(
                ProgressLabels {
                    hosts,
                    ports: port_count,
                    retries: self.config.retries,
                    total: space * passes,
                },
                Arc::clone(&self.counters),
            ))
        } else {
            None
        };

        let limiter = RateLimiter::new(self.config.rate as u64);
        let pool_size = self.config.rate.min(u32::MAX as usize / 2) as u32;
        let pool = Arc::new(Semaphore::new(pool_size as usize));
        let timeout = self.config.timeout_duration();

        for attempt in 0..passes {
            log::debug!("starting pass {}/{} over {} pairs", attempt + 1, passes, space);
            let shuffler = BlackRock::new(space, PERMUTATION_SEED);

            for index in 0..space {
                let shuffled = shuffler.shuffle(index);
                let Some(ip) = self.targets.ip_of(shuffled / port_count) else {
                    continue;
                };
                let port = self.ports[(shuffled % port_count) as usize];
                if self.exclusions.is_excluded(ip) {
                    continue;
                }

                limiter.take().await;

                if let Some(syn) = &self.syn {
                    self.emit_syn(syn, ip, port);
                } else {
                    let permit = match Arc::clone(&pool).acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };
                    let results = Arc::clone(&self.results);
                    let cdn = Arc::clone(&self.cdn);
                    tokio::spawn(async move {
                        let _permit = permit;
                        handle_host_port(&results, &cdn, ip, port, timeout).await;
                    });
                }
                self.counters.add_packet();
            }
        }

        // Barrier: all permits home means the pool has drained
        if let Ok(drain) = pool.acquire_many(pool_size).await {
            drop(drain);
        }

        // Give stragglers a chance to land in the collector
        if self.config.warm_up_time > 0 {
            tokio::time::sleep(self.config.warm_up_duration()).await;
        }

        self.state.advance(RunnerPhase::Done);

        if self.config.verify {
            self.connect_verification().await;
        }

        if let Some(reporter) = reporter {
            reporter.stop();
        }

        Ok(())
    }

    /// Inline raw emission; per-packet failures never abort the pass.
    fn emit_syn(&self, syn: &SynScanner, ip: Ipv4Addr, port: u16) {
        if !self.cdn.allow(ip, port) {
            log::debug!("skipping cdn-restricted target {}:{}", ip, port);
            return;
        }
        if let Err(e) = syn.enqueue_syn(ip, port) {
            self.counters.add_error();
            log::debug!("syn emit {}:{} failed: {}", ip, port, e);
        }
    }

    /// Re-probe every discovered port over connect and keep only the
    /// verified subset. A fresh limiter paces this pass.
    async fn connect_verification(&self) {
        let limiter = RateLimiter::new(self.config.rate as u64);
        let timeout = self.config.timeout_duration();
        let mut tasks = tokio::task::JoinSet::new();

        for (ip, ports) in self.results.snapshot() {
            limiter.take().await;
            tasks.spawn(async move { (ip, connect::connect_verify(ip, ports, timeout).await) });
        }

        while let Some(res) = tasks.join_next().await {
            if let Ok((ip, verified)) = res {
                self.results.set_ports(ip, verified);
            }
        }
    }

    pub fn results(&self) -> &ScanResults {
        &self.results
    }

    pub fn targets(&self) -> &TargetIndex {
        &self.targets
    }

    pub fn packets_sent(&self) -> u64 {
        self.counters.packets()
    }

    pub fn state(&self) -> RunnerPhase {
        self.state.phase()
    }

    /// Release scan resources: stops and joins the SYN collector.
    pub fn close(&self) {
        if let Some(syn) = &self.syn {
            syn.shutdown();
        }
    }
}

/// Connect-mode worker body: CDN policy, dedup, probe, record.
async fn handle_host_port(
    results: &ScanResults,
    cdn: &CdnFilter,
    ip: Ipv4Addr,
    port: u16,
    timeout: Duration,
) {
    if !cdn.allow(ip, port) {
        log::debug!("skipping cdn-restricted target {}:{}", ip, port);
        return;
    }
    if results.has(ip, port) {
        return;
    }
    if connect::connect_port(ip, port, timeout).await {
        results.add(ip, port);
    }
}

//! Offline replay of recorded observations through a configured service.

use chrono::{DateTime, Utc};
use clap::Args;
use qos_core::{
    clock::ManualClock,
    config::AppConfig,
    metrics::{NoopMetrics, PrometheusMetrics, QosMetrics},
    EndpointAddr, Observation, ObservationBatch, QosRegistry, ServiceId,
};
use std::{collections::HashSet, sync::Arc};
use tracing::info;

use super::utils::{print_info, print_json, CliError, CliResult};

#[derive(Args, Debug)]
pub struct ReplayArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config/qos.toml")]
    pub config: String,

    /// Service to replay into
    #[arg(short, long)]
    pub service: String,

    /// JSON-lines file with one observation per line
    #[arg(short, long)]
    pub observations: String,

    /// Candidate endpoints, comma separated (defaults to every observed endpoint)
    #[arg(long, value_delimiter = ',')]
    pub candidates: Vec<String>,

    /// Number of endpoints to select
    #[arg(long, default_value = "1")]
    pub count: usize,

    /// Evaluate at this RFC 3339 instant (defaults to the latest observation)
    #[arg(long)]
    pub at: Option<DateTime<Utc>>,

    /// Print the Prometheus exposition after the replay
    #[arg(long)]
    pub metrics: bool,
}

/// Parses JSON-lines observations, skipping blank lines and `#` comments.
pub fn parse_observations(input: &str) -> CliResult<Vec<Observation>> {
    input
        .lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(index, line)| {
            serde_json::from_str(line)
                .map_err(|e| CliError::Replay(format!("line {}: {e}", index + 1)))
        })
        .collect()
}

/// Endpoints in first-seen order.
fn observed_endpoints(observations: &[Observation]) -> Vec<EndpointAddr> {
    let mut seen = HashSet::new();
    observations
        .iter()
        .filter(|o| seen.insert(o.endpoint.clone()))
        .map(|o| o.endpoint.clone())
        .collect()
}

pub fn handle_replay_command(args: ReplayArgs) -> CliResult<()> {
    let config = AppConfig::from_file(&args.config).map_err(|e| CliError::Config(e.to_string()))?;

    let input = std::fs::read_to_string(&args.observations)?;
    let observations = parse_observations(&input)?;
    print_info(&format!("Loaded {} observations from {}", observations.len(), args.observations));

    let at = args
        .at
        .or_else(|| observations.iter().map(|o| o.completed_at).max())
        .unwrap_or_else(Utc::now);

    let prometheus = (args.metrics && config.metrics.enabled).then(PrometheusMetrics::new);
    let metrics: Arc<dyn QosMetrics> = match &prometheus {
        Some(prometheus) => Arc::new(prometheus.clone()),
        None => Arc::new(NoopMetrics),
    };

    let registry = QosRegistry::from_config(&config, metrics, Arc::new(ManualClock::new(at)))?;
    let service_id = ServiceId::new(args.service.as_str());
    let service = registry
        .get(&service_id)
        .ok_or_else(|| CliError::Replay(format!("service {service_id} is not configured")))?;

    let candidates: Vec<EndpointAddr> = if args.candidates.is_empty() {
        observed_endpoints(&observations)
    } else {
        args.candidates.iter().map(|c| EndpointAddr::new(c.as_str())).collect()
    };

    let summary = service.apply_observations(&ObservationBatch::new(service_id.clone(), observations))?;
    info!(
        service_id = %service_id,
        changed = summary.changed_endpoints,
        perceived_block_height = summary.perceived_block_height,
        "replay applied"
    );

    print_json("Apply Summary", &summary)?;
    print_json("Perceived State", &*service.perceived_state())?;

    if candidates.is_empty() {
        print_info("No candidates to select from");
    } else {
        let report = service
            .select_with_metadata(&candidates)
            .map_err(|e| CliError::Replay(e.to_string()))?;
        print_json("Selection Report", &report)?;

        if args.count > 1 {
            let selected = service
                .select_multiple(&candidates, args.count)
                .map_err(|e| CliError::Replay(e.to_string()))?;
            print_json("Selected Endpoints", &selected)?;
        }
    }

    print_json("Disqualified Endpoints", &service.disqualified_endpoints())?;

    if let Some(prometheus) = prometheus {
        println!("\n[Metrics]");
        match prometheus.render() {
            Some(rendered) => println!("{rendered}"),
            None => println!("  (Prometheus recorder unavailable, metrics not rendered)"),
        }
    }

    Ok(())
}

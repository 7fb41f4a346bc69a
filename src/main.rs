//! OCS Capacity Manager
//!
//! Command-line entry point. `serve` runs the REST API and the storage
//! overview pollers; the other subcommands run a single operation against the cluster
//! and print the result as JSON.

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ocs_capacity::install::DiskType;
use ocs_capacity::{
    ApiServer, ApiServerConfig, AppState, CapacityService, ClusterApiRef, Config,
    DeviceDiscoveryService, ExpansionWorkflow, InstallRequest, InstallWorkflow, KubeClusterApi,
    LocalVolumeSetForm, MetricsSourceRef, NodeSelectionService, OverviewWatch, PrometheusClient,
    PvcCloneService, ResourceRef, Result, StorageClassSelector, WorkflowMetrics,
};

// =============================================================================
// CLI Arguments
// =============================================================================

/// OCS Capacity Manager - add and verify storage capacity
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file
    #[arg(long, env = "OCS_CONFIG")]
    config: Option<PathBuf>,

    /// StorageCluster namespace
    #[arg(long, env = "OCS_NAMESPACE")]
    namespace: Option<String>,

    /// StorageCluster name
    #[arg(long, env = "OCS_CLUSTER")]
    cluster: Option<String>,

    /// Prometheus base URL
    #[arg(long, env = "PROMETHEUS_URL")]
    prometheus_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the REST API and the storage overview pollers
    Serve {
        /// REST API bind address
        #[arg(long, env = "API_ADDR")]
        api_addr: Option<String>,
    },
    /// Add one replicated set of devices and verify the outcome
    AddCapacity {
        /// Storage class for the new devices; current class when omitted
        #[arg(long)]
        storage_class: Option<String>,
    },
    /// Show the add-capacity form data
    Capacity,
    /// List storage classes offered for expansion
    StorageClasses,
    /// List candidate storage nodes
    Nodes,
    /// Label (and optionally taint) storage nodes
    LabelNodes {
        #[arg(required = true)]
        nodes: Vec<String>,
        /// Also apply the storage taint
        #[arg(long)]
        taint: bool,
    },
    /// Prepare nodes and create the StorageCluster
    Install {
        #[arg(long, required = true, value_delimiter = ',')]
        nodes: Vec<String>,
        #[arg(long)]
        storage_class: String,
        /// Size of each device, e.g. 2Ti
        #[arg(long, default_value = "2Ti")]
        storage_size: String,
    },
    /// Enable disk discovery and create a LocalVolumeSet
    CreateLocalStorage {
        /// Volume set name; also the storage class name unless given
        #[arg(long)]
        name: String,
        #[arg(long, required = true, value_delimiter = ',')]
        nodes: Vec<String>,
        #[arg(long)]
        storage_class: Option<String>,
        /// Select rotational disks instead of SSDs
        #[arg(long)]
        hdd: bool,
        #[arg(long)]
        max_disks: Option<u32>,
        #[arg(long)]
        min_disk_size: Option<String>,
        #[arg(long)]
        max_disk_size: Option<String>,
    },
    /// Show devices discovered on nodes and their available capacity
    Devices {
        #[arg(long, required = true, value_delimiter = ',')]
        nodes: Vec<String>,
    },
    /// List nodes that carry local persistent volumes
    LocalVolumeNodes,
    /// Clone a PersistentVolumeClaim
    ClonePvc {
        /// Namespace of the source claim
        #[arg(long)]
        pvc_namespace: String,
        /// Source claim
        pvc: String,
        /// Clone name; `<pvc>-clone` when omitted
        #[arg(long)]
        name: Option<String>,
    },
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    let config = load_config(&args)?;
    info!(
        "{} {} targeting {}/{}",
        ocs_capacity::NAME,
        ocs_capacity::VERSION,
        config.namespace,
        config.cluster_name
    );

    let api: ClusterApiRef = Arc::new(KubeClusterApi::connect().await?);
    let target = ResourceRef::storage_cluster(&config.namespace, &config.cluster_name);

    match args.command {
        Command::Serve { api_addr } => {
            let mut config = config;
            if let Some(addr) = api_addr {
                config.api_addr = addr;
            }
            serve(config, api).await
        }
        Command::AddCapacity { storage_class } => {
            let workflow = ExpansionWorkflow::new(api, config.expansion());
            let outcome = workflow.run(&target, storage_class.as_deref()).await?;
            print_json(&outcome)?;
            if !outcome.passed() {
                for failure in outcome.report.failures() {
                    error!("{} failed: {}", failure.property, failure.detail);
                }
                std::process::exit(1);
            }
            Ok(())
        }
        Command::Capacity => {
            let metrics = prometheus(&config)?;
            print_json(&CapacityService::new(api, metrics).view(&target).await?)
        }
        Command::StorageClasses => print_json(&StorageClassSelector::new(api).list().await?),
        Command::Nodes => print_json(
            &NodeSelectionService::new(api, config.node_options())
                .list_candidates()
                .await?,
        ),
        Command::LabelNodes { nodes, taint } => {
            let mut options = config.node_options();
            if taint && options.taint.is_none() {
                options.taint = Some(Default::default());
            }
            let labelled = NodeSelectionService::new(api, options)
                .select_and_apply(&nodes)
                .await?;
            let names: Vec<String> = labelled.into_iter().filter_map(|n| n.metadata.name).collect();
            print_json(&names)
        }
        Command::Install {
            nodes,
            storage_class,
            storage_size,
        } => {
            let request = InstallRequest {
                nodes,
                storage_class,
                storage_size,
            };
            let outcome = InstallWorkflow::new(api, config.node_options())
                .run(&request)
                .await?;
            print_json(&outcome)
        }
        Command::CreateLocalStorage {
            name,
            nodes,
            storage_class,
            hdd,
            max_disks,
            min_disk_size,
            max_disk_size,
        } => {
            let form = LocalVolumeSetForm {
                volume_set_name: name,
                storage_class_name: storage_class,
                disk_type: if hdd { DiskType::Hdd } else { DiskType::Ssd },
                disk_mode: Default::default(),
                max_disk_limit: max_disks,
                node_names: nodes,
                min_disk_size,
                max_disk_size,
            };
            let outcome = InstallWorkflow::new(api, config.node_options())
                .create_local_storage(&form)
                .await?;
            print_json(&outcome)
        }
        Command::Devices { nodes } => {
            print_json(&DeviceDiscoveryService::new(api).discovered(&nodes).await?)
        }
        Command::LocalVolumeNodes => {
            print_json(&DeviceDiscoveryService::new(api).associated_nodes().await?)
        }
        Command::ClonePvc {
            pvc_namespace,
            pvc,
            name,
        } => {
            let metrics = prometheus(&config)?;
            let created = PvcCloneService::new(api, metrics)
                .clone_claim(&pvc_namespace, &pvc, name.as_deref())
                .await?;
            print_json(&created)
        }
    }
}

fn prometheus(config: &Config) -> Result<MetricsSourceRef> {
    Ok(Arc::new(PrometheusClient::new(&config.prometheus_url)?))
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(namespace) = &args.namespace {
        config.namespace = namespace.clone();
    }
    if let Some(cluster) = &args.cluster {
        config.cluster_name = cluster.clone();
    }
    if let Some(url) = &args.prometheus_url {
        config.prometheus_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// =============================================================================
// Serve
// =============================================================================

async fn serve(config: Config, api: ClusterApiRef) -> Result<()> {
    let rest_addr = config.socket_addr()?;
    let metrics_source = prometheus(&config)?;
    let workflow_metrics = Arc::new(WorkflowMetrics::new()?);

    info!("  REST API: {}", rest_addr);
    info!("  Prometheus: {}", config.prometheus_url);

    // Storage overview pollers
    let cancel = CancellationToken::new();
    let (poller_tasks, overview) =
        OverviewWatch::spawn(metrics_source.clone(), config.metrics_interval(), &cancel);
    info!("  Overview pollers: {}", poller_tasks.len());

    let state = AppState {
        api,
        metrics_source,
        workflow_metrics,
        expansion: config.expansion(),
        node_options: config.node_options(),
        namespace: config.namespace.clone(),
        overview,
    };
    let server = ApiServer::new(ApiServerConfig { rest_addr }, state);

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown signal received");
                let _ = shutdown.send(());
            }
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
    });

    let result = server.run().await;

    cancel.cancel();
    for result in futures::future::join_all(poller_tasks).await {
        if let Err(e) = result {
            warn!("Overview poller ended abnormally: {}", e);
        }
    }
    info!("Shutdown complete");
    result
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hyper=warn", "kube=info", "tower=warn", "axum=info", "reqwest=warn"] {
        if let Ok(d) = directive.parse() {
            filter = filter.add_directive(d);
        }
    }

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

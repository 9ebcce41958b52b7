// This file is part of Hopper.
//
// Hopper is free software: you can redistribute it and/or modify it under the
// terms of the GNU Lesser General Public License as published by the Free Software
// Foundation, either version 3 of the License, or (at your option) any later version.
//
// Hopper is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with Hopper.
// If not, see https://www.gnu.org/licenses/.

mod tracing;

use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use clap::Parser;
use ethers::types::{Address, U256};
use hopper_builder::{manual_bundle_channel, Bundler};
use hopper_db::Store;
use hopper_modules::{
    batch::{FilterUnderpriced, MaintainGasLimit, SortByNonce},
    checks::{ValidateGasFee, ValidatePendingOps, ValidateSender},
    entities::{CheckStatus, IncOpsIncluded, IncOpsSeen, ValidateOpLimit},
    expire::DropExpired,
    relay::Relayer,
    simulation::SimulateOp,
    BatchPipeline, UserOpPipeline,
};
use hopper_pool::{Mempool, ReputationTracker};
use hopper_provider::{
    EntryPointTransactor, GetBaseFee, GetCode, GetGasTip, GetStake, NodeProviders,
    NoopEntryPointTransactor, NoopGetBaseFee, NoopGetCode, NoopGetGasTip, NoopGetStake,
    NoopSimulateValidation, SimulateValidation,
};
use hopper_rpc::{DebugApi, EthApi};
use hopper_types::ReputationParams;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio_util::sync::CancellationToken;
use ::tracing::info;

#[derive(Debug, Parser)]
#[command(name = "hopper", about = "An ERC-4337 bundler node")]
struct Cli {
    /// Directory for the embedded database
    #[arg(long, env = "HOPPER_DATA_DIRECTORY", default_value = "/tmp/hopper")]
    data_directory: PathBuf,

    /// Chain id the bundler targets
    #[arg(long, env = "HOPPER_CHAIN_ID", default_value_t = 1)]
    chain_id: u64,

    /// Supported entry point addresses, in order of preference
    #[arg(
        long,
        env = "HOPPER_SUPPORTED_ENTRY_POINTS",
        value_delimiter = ',',
        default_value = "0x0576a174D229E3cFA37253523E645A78A0C91B57"
    )]
    supported_entry_points: Vec<Address>,

    /// Address the RPC server listens on
    #[arg(long, env = "HOPPER_RPC_LISTEN", default_value = "0.0.0.0:4337")]
    rpc_listen: SocketAddr,

    /// Ethereum node HTTP endpoint; chain reads fall back to noop
    /// implementations when unset
    #[arg(long, env = "HOPPER_NODE_HTTP")]
    node_http: Option<String>,

    /// Beneficiary address for bundle fees
    #[arg(long, env = "HOPPER_BENEFICIARY", default_value = "0x0000000000000000000000000000000000000000")]
    beneficiary: Address,

    /// Seconds between bundler iterations
    #[arg(long, env = "HOPPER_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,

    /// Max operations per bundle, zero for unlimited
    #[arg(long, env = "HOPPER_MAX_BATCH", default_value_t = 10)]
    max_batch: usize,

    /// Max cumulative gas per bundle
    #[arg(long, env = "HOPPER_MAX_BATCH_GAS_LIMIT", default_value_t = 18_000_000)]
    max_batch_gas_limit: u64,

    /// Seconds an operation may stay pending before it is dropped
    #[arg(long, env = "HOPPER_OP_TTL", default_value_t = 180)]
    op_ttl: u64,

    /// Prometheus exporter listen address
    #[arg(long, env = "HOPPER_METRICS_LISTEN", default_value = "0.0.0.0:9000")]
    metrics_listen: SocketAddr,

    /// Emit logs as JSON
    #[arg(long, env = "HOPPER_JSON_LOGS")]
    json_logs: bool,
}

struct ChainReads {
    get_code: Arc<dyn GetCode>,
    base_fee: Arc<dyn GetBaseFee>,
    gas_tip: Arc<dyn GetGasTip>,
    get_stake: Arc<dyn GetStake>,
    simulator: Arc<dyn SimulateValidation>,
    transactor: Arc<dyn EntryPointTransactor>,
}

impl ChainReads {
    fn from_args(args: &Cli) -> anyhow::Result<Self> {
        // Stake reads, simulation and submission need contract bindings and a
        // signer; those integrations are injected by the embedding deployment
        // and default to noop here.
        let (get_code, base_fee, gas_tip): (
            Arc<dyn GetCode>,
            Arc<dyn GetBaseFee>,
            Arc<dyn GetGasTip>,
        ) = match &args.node_http {
            Some(url) => {
                let node = NodeProviders::connect(url)?;
                (
                    Arc::new(node.clone()),
                    Arc::new(node.clone()),
                    Arc::new(node),
                )
            }
            None => (
                Arc::new(NoopGetCode),
                Arc::new(NoopGetBaseFee),
                Arc::new(NoopGetGasTip),
            ),
        };

        Ok(Self {
            get_code,
            base_fee,
            gas_tip,
            get_stake: Arc::new(NoopGetStake),
            simulator: Arc::new(NoopSimulateValidation),
            transactor: Arc::new(NoopEntryPointTransactor),
        })
    }
}

pub async fn run() -> anyhow::Result<()> {
    let args = Cli::parse();
    self::tracing::configure_logging(args.json_logs)?;

    PrometheusBuilder::new()
        .with_http_listener(args.metrics_listen)
        .install()
        .context("failed to start metrics exporter")?;

    let store = Arc::new(Store::open(&args.data_directory).context("failed to open database")?);
    let mempool =
        Arc::new(Mempool::new(store.clone()).context("failed to rebuild mempool from disk")?);
    let reputation = Arc::new(ReputationTracker::new(
        store.clone(),
        ReputationParams::default(),
    ));
    let chain = ChainReads::from_args(&args)?;

    let admission_pipeline = UserOpPipeline::new()
        .with(ValidatePendingOps)
        .with(ValidateSender::new(chain.get_code.clone()))
        .with(ValidateGasFee::new(chain.base_fee.clone()))
        .with(SimulateOp::new(chain.simulator.clone()))
        .with(CheckStatus::new(reputation.clone()))
        .with(ValidateOpLimit::new(reputation.clone()))
        .with(IncOpsSeen::new(reputation.clone()));

    let batch_pipeline = BatchPipeline::new()
        .with(DropExpired::new(Duration::from_secs(args.op_ttl)))
        .with(FilterUnderpriced)
        .with(SortByNonce)
        .with(MaintainGasLimit::new(U256::from(args.max_batch_gas_limit)))
        .with(Relayer::new(chain.transactor.clone(), args.beneficiary))
        .with(IncOpsIncluded::new(reputation.clone()));

    let bundler = Arc::new(Bundler::new(
        mempool.clone(),
        batch_pipeline,
        args.chain_id,
        args.supported_entry_points.clone(),
        chain.base_fee.clone(),
        chain.gas_tip.clone(),
        args.max_batch,
        Duration::from_secs(args.poll_interval),
    ));

    let eth_api = EthApi::new(
        mempool.clone(),
        admission_pipeline,
        chain.get_stake.clone(),
        args.chain_id,
        args.supported_entry_points.clone(),
    );
    let (bundler_handle, manual_rx) = manual_bundle_channel();
    let debug_api = DebugApi::new(mempool, reputation, bundler_handle);

    let shutdown = CancellationToken::new();
    let bundler_task = tokio::spawn(bundler.run(shutdown.clone(), manual_rx));
    let rpc_task = tokio::spawn(hopper_rpc::serve(
        args.rpc_listen,
        eth_api,
        debug_api,
        shutdown.clone(),
    ));

    info!(
        chain_id = args.chain_id,
        entry_points = ?args.supported_entry_points,
        "hopper started"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("received signal, shutting down");
    shutdown.cancel();

    bundler_task.await.context("bundler task panicked")?;
    rpc_task
        .await
        .context("rpc task panicked")?
        .context("rpc server error")?;
    Ok(())
}

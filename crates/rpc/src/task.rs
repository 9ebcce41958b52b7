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

use std::net::SocketAddr;

use anyhow::Context;
use jsonrpsee::server::Server;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{debug::DebugApiServer, eth::EthApiServer, DebugApi, EthApi};

/// Serve the eth and debug namespaces until the shutdown token fires.
pub async fn serve(
    addr: SocketAddr,
    eth: EthApi,
    debug: DebugApi,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let server = Server::builder()
        .build(addr)
        .await
        .context("failed to bind rpc server")?;

    let mut module = eth.into_rpc();
    module
        .merge(debug.into_rpc())
        .context("failed to merge debug namespace")?;

    let handle = server.start(module);
    info!(addr = %addr, "rpc server started");

    shutdown.cancelled().await;
    let _ = handle.stop();
    handle.stopped().await;
    info!("rpc server stopped");
    Ok(())
}

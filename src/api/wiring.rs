use crate::actor;
use crate::api::client::ReplicationServer;
use crate::api::options::{ReplicationOptions, ReplicationOptionsValidated};
use crate::contract::{ContractAckSink, ServerId};
use crate::directory::Directory;
use crate::execution::ExecutionContext;
use crate::query::OrderSource;
use crate::reactor::Reactor;
use crate::replicator::{InProcessTransport, ReplicatorTransport};
use crate::server::{self, GrpcTransport};
use crate::store::Store;
use crate::throttler::BackfillThrottler;
use crate::version::{BranchHistoryStore, VolatileBranchHistoryStore};
use std::convert::TryFrom;
use std::net::SocketAddr;
use std::sync::Arc;
use tonic::transport::Endpoint;

const REACTOR_QUEUE_SIZE: usize = 64;

pub struct ReplicationServerConfig {
    pub server_id: String,
    pub info_logger: slog::Logger,
    pub options: ReplicationOptions,
    pub store: Arc<dyn Store>,
    pub directory: Arc<dyn Directory>,
    pub ack_sink: Arc<dyn ContractAckSink>,
    /// Defaults to a volatile store, which only suits tests.
    pub branch_history: Option<Arc<dyn BranchHistoryStore>>,
    /// Without it, only primaries in the same process are reachable.
    pub rpc: Option<RpcConfig>,
}

pub struct RpcConfig {
    pub listen_addr: SocketAddr,
    /// Where other servers reach this one. Defaults to `http://{listen_addr}`.
    pub advertise_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplicationServerCreationError {
    #[error("Server id must not be empty")]
    EmptyServerId,
    #[error("Illegal options for configuring replication: {0}")]
    IllegalOptions(String),
    #[error("Invalid advertise url '{0}'")]
    InvalidAdvertiseUrl(String),
}

pub async fn try_create_replication_server(
    config: ReplicationServerConfig,
) -> Result<ReplicationServer, ReplicationServerCreationError> {
    if config.server_id.is_empty() {
        return Err(ReplicationServerCreationError::EmptyServerId);
    }

    let options = ReplicationOptionsValidated::try_from(config.options)
        .map_err(|e| ReplicationServerCreationError::IllegalOptions(e.to_string()))?;

    let root_logger = config
        .info_logger
        .new(slog::o!("Server" => config.server_id.clone()));

    let (transport, rpc_server) = match config.rpc {
        Some(rpc) => {
            let (listen_addr, advertise_url) = resolve_rpc_config(rpc)?;
            let transport = GrpcTransport::new(root_logger.clone(), advertise_url);
            let rpc_server = transport.rpc_server();
            let transport: Arc<dyn ReplicatorTransport> = Arc::new(transport);
            (transport, Some((listen_addr, rpc_server)))
        }
        None => {
            let transport: Arc<dyn ReplicatorTransport> = Arc::new(InProcessTransport);
            (transport, None)
        }
    };

    let branch_history = config
        .branch_history
        .unwrap_or_else(|| Arc::new(VolatileBranchHistoryStore::new()));

    let context = Arc::new(ExecutionContext {
        logger: root_logger.clone(),
        server_id: ServerId::new(&config.server_id),
        store: config.store,
        branch_history,
        directory: config.directory,
        transport,
        throttler: Arc::new(BackfillThrottler::new(root_logger.clone(), options.max_active_backfills)),
        ack_sink: config.ack_sink,
        options: options.execution_options(),
        backfill_priority: options.backfill_priority,
    });

    let (reactor_client, reactor_actor) = actor::create(
        REACTOR_QUEUE_SIZE,
        root_logger.clone(),
        Reactor::new(context.clone()),
    );
    let reactor_task = tokio::spawn(reactor_actor.run_event_loop());

    let rpc = rpc_server.map(|(listen_addr, rpc_server)| {
        let (shutdown_handle, shutdown_signal) = server::shutdown_signal();
        let task = tokio::spawn(rpc_server.run(listen_addr, shutdown_signal));
        (shutdown_handle, task)
    });

    Ok(ReplicationServer {
        logger: root_logger,
        context,
        reactor: reactor_client,
        order_source: OrderSource::new(),
        reactor_task,
        rpc,
    })
}

fn resolve_rpc_config(rpc: RpcConfig) -> Result<(SocketAddr, String), ReplicationServerCreationError> {
    let listen_addr = rpc.listen_addr;
    let advertise_url = rpc
        .advertise_url
        .unwrap_or_else(|| format!("http://{}", listen_addr));
    if Endpoint::from_shared(advertise_url.clone()).is_err() {
        return Err(ReplicationServerCreationError::InvalidAdvertiseUrl(advertise_url));
    }

    Ok((listen_addr, advertise_url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advertise_url_defaults_to_listen_addr() {
        let listen_addr = SocketAddr::from(([127, 0, 0, 1], 47320));

        let (addr, url) = resolve_rpc_config(RpcConfig {
            listen_addr,
            advertise_url: None,
        })
        .unwrap();

        assert_eq!(addr, listen_addr);
        assert_eq!(url, "http://127.0.0.1:47320");
    }

    #[test]
    fn explicit_advertise_url_is_validated() {
        let listen_addr = SocketAddr::from(([0, 0, 0, 0], 47320));

        let (_, url) = resolve_rpc_config(RpcConfig {
            listen_addr,
            advertise_url: Some("http://replica-1.internal:47320".to_string()),
        })
        .unwrap();
        let invalid = resolve_rpc_config(RpcConfig {
            listen_addr,
            advertise_url: Some("not a url".to_string()),
        });

        assert_eq!(url, "http://replica-1.internal:47320");
        assert!(matches!(
            invalid,
            Err(ReplicationServerCreationError::InvalidAdvertiseUrl(_))
        ));
    }
}

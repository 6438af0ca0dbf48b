//! Three replication servers in one process, sharing an in-memory directory. A tiny coordinator
//! loop turns the primary's branch request into a confirmed contract, then a few writes go
//! through the primary.
use bytes::Bytes;
use shard_replica::{
    AckConfig, BranchId, Contract, ContractAckState, ContractId, Directory, Durability, InMemoryDirectory,
    InMemoryStore, Key, PrimaryAssignment, Read, ReadMode, Region, ReplicationOptions, ReplicationServerConfig,
    ServerId, Write,
};
use slog::Drain;
use std::error::Error;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const SERVERS: [&str; 3] = ["alpha", "beta", "gamma"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let logger = create_root_logger();
    let directory: Arc<dyn Directory> = Arc::new(InMemoryDirectory::new());
    let (ack_sink, mut acks) = shard_replica::create_ack_channel();
    let ack_sink = Arc::new(ack_sink);

    let mut servers = Vec::new();
    for name in SERVERS.iter() {
        let server = shard_replica::try_create_replication_server(ReplicationServerConfig {
            server_id: name.to_string(),
            info_logger: logger.clone(),
            options: ReplicationOptions::default(),
            store: Arc::new(InMemoryStore::new(Region::universe())),
            directory: directory.clone(),
            ack_sink: ack_sink.clone(),
            branch_history: None,
            rpc: None,
        })
        .await?;
        servers.push(server);
    }

    let mut contract_id = 1;
    let mut contract = contract_for(BranchId::nil());
    for server in servers.iter() {
        server
            .update_blueprint(vec![(ContractId::new(contract_id), contract.clone())])
            .await;
    }

    // Coordinator: confirm the branch the primary asks for, stop once it is ready.
    while let Some((id, ack)) = acks.next().await {
        slog::info!(logger, "Ack for {:?}: {:?}", id, ack.state);
        match ack.state {
            ContractAckState::PrimaryNeedBranch if contract.branch.is_nil() => {
                contract = contract_for(ack.branch.expect("need-branch acks carry the branch"));
                contract_id += 1;
                for server in servers.iter() {
                    server
                        .update_blueprint(vec![(ContractId::new(contract_id), contract.clone())])
                        .await;
                }
            }
            ContractAckState::PrimaryReady if id == ContractId::new(contract_id) => break,
            _ => {}
        }
    }

    let primary = &servers[0];
    for i in 0..5 {
        let response = primary
            .write(Write::Put {
                key: Key::from(format!("key-{}", i)),
                value: Bytes::from(format!("value-{}", i)),
            })
            .await?;
        slog::info!(logger, "Wrote key-{}: {:?}", i, response);
    }

    let response = primary
        .read(
            Read::Get {
                key: Key::from("key-3"),
            },
            ReadMode::Majority,
            &CancellationToken::new(),
        )
        .await?;
    slog::info!(logger, "Majority read of key-3: {:?}", response);

    for server in servers {
        server.shutdown().await;
    }

    Ok(())
}

fn contract_for(branch: BranchId) -> Contract {
    Contract {
        region: Region::universe(),
        primary: Some(PrimaryAssignment {
            server: ServerId::new(SERVERS[0]),
            hand_over: None,
        }),
        replicas: SERVERS.iter().map(|s| ServerId::new(s)).collect(),
        temp_voters: None,
        branch,
        ack_config: AckConfig::majority(),
        durability: Durability::Hard,
    }
}

fn create_root_logger() -> slog::Logger {
    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, slog::o!())
}

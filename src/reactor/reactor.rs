use crate::contract::{Contract, ContractId, ServerId};
use crate::execution::{ExecutionContext, PrimaryExecution, SecondaryExecution};
use crate::region::{Key, Region};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Blueprint is every contract the cluster currently runs, one per region.
pub type Blueprint = Vec<(ContractId, Contract)>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Role {
    Primary,
    Secondary,
    Nothing,
}

impl Role {
    pub fn of(contract: &Contract, server: &ServerId) -> Self {
        if contract.is_primary(server) {
            Role::Primary
        } else if contract.is_voter(server) {
            Role::Secondary
        } else {
            Role::Nothing
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("No region this server is primary for holds the key")]
    NoPrimary,
    /// `update_blueprint` panics on overlapping regions before this can happen. Seeing it means
    /// the executions map went out of sync with the blueprint.
    #[error("More than one region claims the key")]
    TooManyPrimaries,
}

enum Execution {
    Primary(Arc<PrimaryExecution>),
    Secondary(Arc<SecondaryExecution>),
}

impl Execution {
    fn role(&self) -> Role {
        match self {
            Execution::Primary(_) => Role::Primary,
            Execution::Secondary(_) => Role::Secondary,
        }
    }
}

/// Reactor turns blueprints into running executions: one per region this server has a role in.
pub struct Reactor {
    logger: slog::Logger,
    ctx: Arc<ExecutionContext>,
    executions: BTreeMap<Region, Execution>,
    /// Executions on their way out, with a token cancelled once each is fully stopped.
    stopping: Vec<(Region, CancellationToken)>,
    stop_tasks: JoinSet<()>,
}

impl Reactor {
    pub fn new(ctx: Arc<ExecutionContext>) -> Self {
        Reactor {
            logger: ctx.logger.new(slog::o!("Component" => "Reactor")),
            ctx,
            executions: BTreeMap::new(),
            stopping: Vec::new(),
            stop_tasks: JoinSet::new(),
        }
    }

    pub fn context(&self) -> &Arc<ExecutionContext> {
        &self.ctx
    }

    /// Panics if two regions of the blueprint overlap.
    pub fn update_blueprint(&mut self, blueprint: Blueprint) {
        for (i, (_, a)) in blueprint.iter().enumerate() {
            for (_, b) in blueprint.iter().skip(i + 1) {
                assert!(
                    !a.region.overlaps(&b.region),
                    "Blueprint regions {:?} and {:?} overlap",
                    a.region,
                    b.region
                );
            }
        }

        while let Some(_) = self.stop_tasks.try_join_next() {}
        self.stopping.retain(|(_, stopped)| !stopped.is_cancelled());

        let mut previous = std::mem::take(&mut self.executions);
        let mut to_spawn = Vec::new();
        for (contract_id, contract) in blueprint {
            let role = Role::of(&contract, &self.ctx.server_id);
            match previous.remove(&contract.region) {
                Some(Execution::Primary(primary)) if role == Role::Primary => {
                    primary.update_contract(contract_id, contract);
                    self.executions
                        .insert(primary.region().clone(), Execution::Primary(primary));
                }
                Some(Execution::Secondary(secondary)) if role == Role::Secondary => {
                    secondary.update_contract(contract_id, contract);
                    self.executions
                        .insert(secondary.region().clone(), Execution::Secondary(secondary));
                }
                existing => {
                    if let Some(execution) = existing {
                        self.stop(contract.region.clone(), execution);
                    }
                    if role != Role::Nothing {
                        to_spawn.push((contract_id, contract, role));
                    }
                }
            }
        }

        // Whatever is left lost its role, or its region changed shape.
        for (region, execution) in previous {
            self.stop(region, execution);
        }

        for (contract_id, contract, role) in to_spawn {
            self.spawn(contract_id, contract, role);
        }
    }

    pub fn primary_for_key(&self, key: &Key) -> Result<Arc<PrimaryExecution>, RoutingError> {
        let mut matches = self.executions.iter().filter_map(|(region, execution)| match execution {
            Execution::Primary(primary) if region.contains_key(key) => Some(primary),
            _ => None,
        });

        let primary = matches.next().ok_or(RoutingError::NoPrimary)?;
        if matches.next().is_some() {
            return Err(RoutingError::TooManyPrimaries);
        }

        Ok(primary.clone())
    }

    pub fn roles(&self) -> Vec<(Region, Role)> {
        self.executions
            .iter()
            .map(|(region, execution)| (region.clone(), execution.role()))
            .collect()
    }

    /// Stops every execution and waits for all of them.
    pub async fn shutdown(&mut self) {
        for (region, execution) in std::mem::take(&mut self.executions) {
            self.stop(region, execution);
        }

        while let Some(_) = self.stop_tasks.join_next().await {}
        self.stopping.clear();
        slog::info!(self.logger, "Reactor shut down");
    }

    fn spawn(&mut self, contract_id: ContractId, contract: Contract, role: Role) {
        // A new execution must not touch the store before older ones on the same keys let go.
        let predecessors: Vec<CancellationToken> = self
            .stopping
            .iter()
            .filter(|(region, _)| region.overlaps(&contract.region))
            .map(|(_, stopped)| stopped.clone())
            .collect();

        slog::info!(
            self.logger,
            "Starting {:?} for {:?} under {:?}",
            role,
            contract.region,
            contract_id
        );
        let region = contract.region.clone();
        let execution = match role {
            Role::Primary => Execution::Primary(Arc::new(PrimaryExecution::spawn(
                self.ctx.clone(),
                contract_id,
                contract,
                predecessors,
            ))),
            Role::Secondary => Execution::Secondary(Arc::new(SecondaryExecution::spawn(
                self.ctx.clone(),
                contract_id,
                contract,
                predecessors,
            ))),
            Role::Nothing => return,
        };
        self.executions.insert(region, execution);
    }

    fn stop(&mut self, region: Region, execution: Execution) {
        slog::info!(self.logger, "Stopping {:?} for {:?}", execution.role(), region);

        let stopped = CancellationToken::new();
        self.stopping.push((region, stopped.clone()));
        self.stop_tasks.spawn(async move {
            match execution {
                Execution::Primary(primary) => primary.shutdown().await,
                Execution::Secondary(secondary) => secondary.shutdown().await,
            }
            stopped.cancel();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{create_ack_channel, ContractAckState};
    use crate::directory::InMemoryDirectory;
    use crate::execution::test_support::{context, contract, wait_for_ack};
    use crate::store::InMemoryStore;
    use crate::version::BranchId;

    fn split_contracts(primary: &str) -> Blueprint {
        let mut left = contract(primary, &["a", "b"], BranchId::nil());
        left.region = Region::from_key_range(Key::min(), Some(Key::from("m")));
        let mut right = contract("b", &["a", "b"], BranchId::nil());
        right.region = Region::from_key_range(Key::from("m"), None);

        vec![(ContractId::new(1), left), (ContractId::new(2), right)]
    }

    #[tokio::test]
    async fn roles_follow_the_blueprint() {
        // -- setup --
        let (sink, mut acks) = create_ack_channel();
        let store = Arc::new(InMemoryStore::new(Region::universe()));
        let ctx = context("a", store, Arc::new(InMemoryDirectory::new()), Arc::new(sink));
        let mut reactor = Reactor::new(ctx);

        // -- execute --
        reactor.update_blueprint(split_contracts("a"));

        // -- verify --
        let roles: Vec<Role> = reactor.roles().into_iter().map(|(_, role)| role).collect();
        assert_eq!(roles, vec![Role::Primary, Role::Secondary]);
        wait_for_ack(&mut acks, ContractId::new(1), ContractAckState::PrimaryNeedBranch).await;
        wait_for_ack(&mut acks, ContractId::new(2), ContractAckState::SecondaryNeedPrimary).await;
        assert!(reactor.primary_for_key(&Key::from("c")).is_ok());
        assert!(matches!(
            reactor.primary_for_key(&Key::from("x")),
            Err(RoutingError::NoPrimary)
        ));

        // Losing the primary role stops the execution.
        reactor.update_blueprint(split_contracts("b"));
        let roles: Vec<Role> = reactor.roles().into_iter().map(|(_, role)| role).collect();
        assert_eq!(roles, vec![Role::Secondary, Role::Secondary]);
        assert!(matches!(
            reactor.primary_for_key(&Key::from("c")),
            Err(RoutingError::NoPrimary)
        ));

        reactor.shutdown().await;
        assert!(reactor.roles().is_empty());
    }

    #[tokio::test]
    #[should_panic(expected = "overlap")]
    async fn overlapping_regions_panic() {
        let (sink, _acks) = create_ack_channel();
        let store = Arc::new(InMemoryStore::new(Region::universe()));
        let ctx = context("a", store, Arc::new(InMemoryDirectory::new()), Arc::new(sink));
        let mut reactor = Reactor::new(ctx);

        let blueprint = vec![
            (ContractId::new(1), contract("a", &["a"], BranchId::nil())),
            (ContractId::new(2), contract("b", &["a"], BranchId::nil())),
        ];
        reactor.update_blueprint(blueprint);
    }
}

use crate::dispatcher::Dispatchee;
use crate::replicator::RemoteReplicatorServer;
use crate::version::BranchId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

/// ReplicatorRegistry holds the replicators this server's primaries expose over rpc, keyed by
/// branch. A primary stays reachable as long as it holds on to its `RegistryEntry`.
pub(crate) struct ReplicatorRegistry {
    servers: Mutex<HashMap<BranchId, Arc<RemoteReplicatorServer>>>,
}

impl ReplicatorRegistry {
    pub fn new() -> Self {
        ReplicatorRegistry {
            servers: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(self: &Arc<Self>, branch: BranchId, server: Arc<RemoteReplicatorServer>) -> RegistryEntry {
        let replaced = self.lock_servers().insert(branch, server);
        assert!(replaced.is_none(), "Branch {:?} exposed twice", branch);

        RegistryEntry {
            registry: self.clone(),
            branch,
        }
    }

    pub fn get(&self, branch: &BranchId) -> Option<Arc<RemoteReplicatorServer>> {
        self.lock_servers().get(branch).cloned()
    }

    fn lock_servers(&self) -> MutexGuard<'_, HashMap<BranchId, Arc<RemoteReplicatorServer>>> {
        self.servers.lock().expect("ReplicatorRegistry mutex guard poison")
    }
}

pub(crate) struct RegistryEntry {
    registry: Arc<ReplicatorRegistry>,
    branch: BranchId,
}

impl Drop for RegistryEntry {
    fn drop(&mut self) {
        self.registry.lock_servers().remove(&self.branch);
    }
}

/// ReplicaRouter hands incoming `GrpcReplica` calls to the listener they were registered for.
pub(crate) struct ReplicaRouter {
    next_route: AtomicU64,
    routes: Mutex<HashMap<u64, Arc<dyn Dispatchee>>>,
}

impl ReplicaRouter {
    pub fn new() -> Self {
        ReplicaRouter {
            next_route: AtomicU64::new(1),
            routes: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, listener: Arc<dyn Dispatchee>) -> u64 {
        let route_id = self.next_route.fetch_add(1, Ordering::Relaxed);
        self.lock_routes().insert(route_id, listener);
        route_id
    }

    pub fn get(&self, route_id: u64) -> Option<Arc<dyn Dispatchee>> {
        self.lock_routes().get(&route_id).cloned()
    }

    pub fn remove(&self, route_id: u64) {
        self.lock_routes().remove(&route_id);
    }

    fn lock_routes(&self) -> MutexGuard<'_, HashMap<u64, Arc<dyn Dispatchee>>> {
        self.routes.lock().expect("ReplicaRouter mutex guard poison")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::Region;
    use crate::replicator::ListenerReplica;
    use crate::store::InMemoryStore;

    #[test]
    fn routes_are_never_reused() {
        // -- setup --
        let router = ReplicaRouter::new();
        let listener: Arc<dyn Dispatchee> = Arc::new(ListenerReplica::new(
            Arc::new(InMemoryStore::new(Region::universe())),
            Region::universe(),
            BranchId::nil(),
            10,
        ));

        // -- execute --
        let first = router.insert(listener.clone());
        router.remove(first);
        let second = router.insert(listener);

        // -- verify --
        assert_ne!(first, second);
        assert!(router.get(first).is_none());
        assert!(router.get(second).is_some());
    }
}

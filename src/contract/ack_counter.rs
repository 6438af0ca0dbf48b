use crate::contract::contract::{AckMode, Contract, ServerId};
use std::collections::{BTreeSet, HashSet};

/// Returns true if the servers in `acked` are enough for a write to count as safe under
/// `contract`.
///
/// The primary must always be among them. On top of that `AckMode::Single` wants one replica of
/// positive weight, while `AckMode::Majority` wants more than half of the replicas' weight (and
/// of the temporary voters' weight, when the contract has them).
///
/// Panics if the contract has no primary.
pub fn is_safe(contract: &Contract, acked: &HashSet<ServerId>) -> bool {
    let primary = contract
        .primary_server()
        .expect("AckCounter called for a contract without a primary");

    if !acked.contains(primary) {
        return false;
    }

    match contract.ack_config.mode {
        AckMode::Single => contract
            .replicas
            .iter()
            .chain(contract.temp_voters.iter().flatten())
            .any(|server| acked.contains(server) && contract.ack_config.weight(server) > 0),
        AckMode::Majority => {
            let replicas_ok = has_weighted_majority(contract, &contract.replicas, acked);
            let temp_voters_ok = match &contract.temp_voters {
                None => true,
                Some(voters) => has_weighted_majority(contract, voters, acked),
            };

            replicas_ok && temp_voters_ok
        }
    }
}

fn has_weighted_majority(contract: &Contract, voters: &BTreeSet<ServerId>, acked: &HashSet<ServerId>) -> bool {
    let mut total: u64 = 0;
    let mut acked_weight: u64 = 0;
    for voter in voters {
        let weight = contract.ack_config.weight(voter) as u64;
        total += weight;
        if acked.contains(voter) {
            acked_weight += weight;
        }
    }

    2 * acked_weight > total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::contract::{AckConfig, PrimaryAssignment};
    use crate::query::Durability;
    use crate::region::Region;
    use crate::version::BranchId;

    fn server(id: &str) -> ServerId {
        ServerId::new(id)
    }

    fn contract(ack_config: AckConfig, replicas: &[&str]) -> Contract {
        Contract {
            region: Region::universe(),
            primary: Some(PrimaryAssignment {
                server: server("a"),
                hand_over: None,
            }),
            replicas: replicas.iter().map(|r| server(r)).collect(),
            temp_voters: None,
            branch: BranchId::nil(),
            ack_config,
            durability: Durability::Hard,
        }
    }

    fn acked(servers: &[&str]) -> HashSet<ServerId> {
        servers.iter().map(|s| server(s)).collect()
    }

    #[test]
    fn primary_ack_is_required() {
        let c = contract(AckConfig::majority(), &["a", "b", "c"]);
        assert!(!is_safe(&c, &acked(&["b", "c"])));
        assert!(is_safe(&c, &acked(&["a", "b"])));
        assert!(!is_safe(&c, &acked(&["a"])));
    }

    #[test]
    fn single_mode_needs_one_weighted_replica() {
        let mut config = AckConfig::single();
        config.weights.insert(server("b"), 0);
        let c = contract(config, &["a", "b", "c"]);

        assert!(is_safe(&c, &acked(&["a"])));
        assert!(!is_safe(&c, &acked(&["b"])));
        assert!(is_safe(&c, &acked(&["a", "c"])));
    }

    #[test]
    fn majority_is_weighted() {
        let mut config = AckConfig::majority();
        config.weights.insert(server("c"), 3);
        let c = contract(config, &["a", "b", "c"]);

        // total 5; a + b = 2
        assert!(!is_safe(&c, &acked(&["a", "b"])));
        // a + c = 4
        assert!(is_safe(&c, &acked(&["a", "c"])));
    }

    #[test]
    fn temp_voters_must_also_agree() {
        let mut c = contract(AckConfig::majority(), &["a", "b", "c"]);
        c.temp_voters = Some(acked(&["a", "d", "e"]).into_iter().collect());

        assert!(!is_safe(&c, &acked(&["a", "b"])));
        assert!(is_safe(&c, &acked(&["a", "b", "d"])));
    }

    #[test]
    #[should_panic(expected = "without a primary")]
    fn missing_primary_panics() {
        let mut c = contract(AckConfig::majority(), &["a"]);
        c.primary = None;
        is_safe(&c, &acked(&["a"]));
    }
}

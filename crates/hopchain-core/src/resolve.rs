//! Hop address resolution
//!
//! Pure computation of each hop's bastion and forward addresses. The first
//! hop connects through its own declared host; every later hop connects
//! through the loopback port bound by its predecessor. Every hop except
//! the last forwards to the next hop's SSH endpoint; the last forwards to
//! the chain's final target.

use crate::error::ResolveError;
use crate::types::{Endpoint, HopSpec, ResolvedHop};

/// Host used to reach a predecessor hop's local listener.
const LOOPBACK_HOST: &str = "localhost";

/// Resolves bastion/forward address pairs for the hops of one chain.
///
/// Deterministic and side-effect free; borrows the chain description for
/// the duration of a start attempt.
pub struct ChainResolver<'a> {
    specs: &'a [HopSpec],
    final_target: &'a Endpoint,
    ssh_port: u16,
}

impl<'a> ChainResolver<'a> {
    /// Create a resolver over the given hop specs and final target.
    ///
    /// `ssh_port` is the chain-wide SSH port, consulted only for hops
    /// whose successor does not declare its own listen port; never for
    /// the final hop.
    pub fn new(specs: &'a [HopSpec], final_target: &'a Endpoint, ssh_port: u16) -> Self {
        Self {
            specs,
            final_target,
            ssh_port,
        }
    }

    /// Resolve the addresses for the hop at `index`.
    ///
    /// `bound_ports` holds the local bind ports of already-started hops,
    /// in start order; it must cover `index - 1` for any non-first hop.
    pub fn resolve(&self, index: usize, bound_ports: &[u16]) -> Result<ResolvedHop, ResolveError> {
        let len = self.specs.len();
        if index >= len {
            return Err(ResolveError::IndexOutOfRange { index, len });
        }

        let bastion = if index == 0 {
            let spec = &self.specs[0];
            Endpoint::new(spec.host.clone(), spec.port.unwrap_or(self.ssh_port))
        } else {
            let port = bound_ports
                .get(index - 1)
                .copied()
                .ok_or(ResolveError::PredecessorUnbound {
                    index,
                    predecessor: index - 1,
                })?;
            Endpoint::new(LOOPBACK_HOST, port)
        };

        let forward = if index == len - 1 {
            self.final_target.clone()
        } else {
            let next = &self.specs[index + 1];
            Endpoint::new(next.host.clone(), next.port.unwrap_or(self.ssh_port))
        };

        Ok(ResolvedHop { bastion, forward })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HopAuth;

    fn spec(host: &str) -> HopSpec {
        HopSpec::new(
            host,
            HopAuth::Password {
                password: "test".to_string(),
            },
        )
    }

    #[test]
    fn test_single_hop_forwards_to_final_target() {
        let specs = vec![spec("bastion1")];
        let target = Endpoint::new("10.0.0.5", 5432);

        // ssh_port must never be consulted for the final hop
        for ssh_port in [22, 2222, 1] {
            let resolver = ChainResolver::new(&specs, &target, ssh_port);
            let resolved = resolver.resolve(0, &[]).unwrap();
            assert_eq!(resolved.forward, target);
        }
    }

    #[test]
    fn test_first_hop_uses_own_declared_host() {
        let specs = vec![spec("bastion1"), spec("bastion2")];
        let target = Endpoint::new("127.0.0.1", 8080);
        let resolver = ChainResolver::new(&specs, &target, 22);

        let resolved = resolver.resolve(0, &[]).unwrap();
        assert_eq!(resolved.bastion, Endpoint::new("bastion1", 22));
        assert_eq!(resolved.forward, Endpoint::new("bastion2", 22));
    }

    #[test]
    fn test_middle_hop_connects_through_predecessor_port() {
        let specs = vec![spec("bastion1"), spec("bastion2"), spec("bastion3")];
        let target = Endpoint::new("db.internal", 5432);
        let resolver = ChainResolver::new(&specs, &target, 22);

        let resolved = resolver.resolve(1, &[42000]).unwrap();
        assert_eq!(resolved.bastion, Endpoint::new("localhost", 42000));
        assert_eq!(resolved.forward, Endpoint::new("bastion3", 22));
    }

    #[test]
    fn test_last_hop_forwards_to_final_target() {
        let specs = vec![spec("bastion1"), spec("bastion2")];
        let target = Endpoint::new("127.0.0.1", 8080);
        let resolver = ChainResolver::new(&specs, &target, 22);

        let resolved = resolver.resolve(1, &[42000]).unwrap();
        assert_eq!(resolved.bastion, Endpoint::new("localhost", 42000));
        assert_eq!(resolved.forward, target);
    }

    #[test]
    fn test_per_hop_port_overrides_chain_default() {
        let specs = vec![
            spec("bastion1").with_port(2201),
            spec("bastion2").with_port(2202),
        ];
        let target = Endpoint::new("127.0.0.1", 8080);
        let resolver = ChainResolver::new(&specs, &target, 22);

        let resolved = resolver.resolve(0, &[]).unwrap();
        assert_eq!(resolved.bastion, Endpoint::new("bastion1", 2201));
        assert_eq!(resolved.forward, Endpoint::new("bastion2", 2202));
    }

    #[test]
    fn test_index_out_of_range() {
        let specs = vec![spec("bastion1")];
        let target = Endpoint::new("127.0.0.1", 8080);
        let resolver = ChainResolver::new(&specs, &target, 22);

        assert_eq!(
            resolver.resolve(1, &[42000]),
            Err(ResolveError::IndexOutOfRange { index: 1, len: 1 })
        );
    }

    #[test]
    fn test_predecessor_unbound() {
        let specs = vec![spec("bastion1"), spec("bastion2")];
        let target = Endpoint::new("127.0.0.1", 8080);
        let resolver = ChainResolver::new(&specs, &target, 22);

        assert_eq!(
            resolver.resolve(1, &[]),
            Err(ResolveError::PredecessorUnbound {
                index: 1,
                predecessor: 0,
            })
        );
    }
}

//! Pool-scoped role membership.
//!
//! Membership is keyed by `(pool, role, account)`. The administrator is fixed at construction
//! and is the only identity allowed to grant or revoke roles.

use alloy::primitives::{Address, B256};
use otter_staking_contracts::DEFAULT_ADMIN_ROLE;
use std::collections::BTreeSet;
use tracing::info;

use crate::{
    error::{Result, StakingPoolError},
    types::PoolId,
};

#[derive(Debug, Clone)]
pub struct RolesAuth {
    admin: Address,
    members: BTreeSet<(PoolId, B256, Address)>,
}

impl RolesAuth {
    pub fn new(admin: Address) -> Self {
        Self {
            admin,
            members: BTreeSet::new(),
        }
    }

    pub const fn admin(&self) -> Address {
        self.admin
    }

    pub fn is_admin(&self, account: Address) -> bool {
        account == self.admin
    }

    pub fn ensure_admin(&self, caller: Address) -> Result<()> {
        if self.is_admin(caller) {
            Ok(())
        } else {
            Err(StakingPoolError::Unauthorized {
                caller,
                role: DEFAULT_ADMIN_ROLE,
            })
        }
    }

    pub fn has_role(&self, pool: PoolId, role: B256, account: Address) -> bool {
        self.members.contains(&(pool, role, account))
    }

    /// Capability check run at the top of every gated operation.
    pub fn ensure_role(&self, caller: Address, pool: PoolId, role: B256) -> Result<()> {
        if self.has_role(pool, role, caller) {
            Ok(())
        } else {
            Err(StakingPoolError::Unauthorized { caller, role })
        }
    }

    /// Grants `role` for `pool` to `account`. Returns `false` if it was already held.
    pub fn grant_role(
        &mut self,
        caller: Address,
        pool: PoolId,
        role: B256,
        account: Address,
    ) -> Result<bool> {
        self.ensure_admin(caller)?;
        let granted = self.members.insert((pool, role, account));
        if granted {
            info!(%pool, %role, %account, "Role granted");
        }
        Ok(granted)
    }

    /// Revokes `role` for `pool` from `account`. Returns `false` if it was not held.
    pub fn revoke_role(
        &mut self,
        caller: Address,
        pool: PoolId,
        role: B256,
        account: Address,
    ) -> Result<bool> {
        self.ensure_admin(caller)?;
        let revoked = self.members.remove(&(pool, role, account));
        if revoked {
            info!(%pool, %role, %account, "Role revoked");
        }
        Ok(revoked)
    }

    pub fn members(&self) -> impl Iterator<Item = &(PoolId, B256, Address)> {
        self.members.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otter_staking_contracts::NETWORK_POOL_ROLE;

    #[test]
    fn test_only_admin_grants() {
        let admin = Address::repeat_byte(0xad);
        let pool_addr = Address::repeat_byte(0x01);
        let mut roles = RolesAuth::new(admin);

        let err = roles
            .grant_role(pool_addr, PoolId(1), *NETWORK_POOL_ROLE, pool_addr)
            .unwrap_err();
        assert_eq!(
            err,
            StakingPoolError::Unauthorized {
                caller: pool_addr,
                role: DEFAULT_ADMIN_ROLE
            }
        );
        assert!(!roles.has_role(PoolId(1), *NETWORK_POOL_ROLE, pool_addr));

        assert!(
            roles
                .grant_role(admin, PoolId(1), *NETWORK_POOL_ROLE, pool_addr)
                .unwrap()
        );
        assert!(
            !roles
                .grant_role(admin, PoolId(1), *NETWORK_POOL_ROLE, pool_addr)
                .unwrap()
        );
        assert!(roles.has_role(PoolId(1), *NETWORK_POOL_ROLE, pool_addr));
    }

    #[test]
    fn test_roles_are_pool_scoped() {
        let admin = Address::repeat_byte(0xad);
        let account = Address::repeat_byte(0x01);
        let mut roles = RolesAuth::new(admin);
        roles
            .grant_role(admin, PoolId(0), *NETWORK_POOL_ROLE, account)
            .unwrap();

        assert!(roles.ensure_role(account, PoolId(0), *NETWORK_POOL_ROLE).is_ok());
        assert!(matches!(
            roles.ensure_role(account, PoolId(1), *NETWORK_POOL_ROLE),
            Err(StakingPoolError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_revoke() {
        let admin = Address::repeat_byte(0xad);
        let account = Address::repeat_byte(0x01);
        let mut roles = RolesAuth::new(admin);
        roles
            .grant_role(admin, PoolId(0), *NETWORK_POOL_ROLE, account)
            .unwrap();

        assert!(
            roles
                .revoke_role(admin, PoolId(0), *NETWORK_POOL_ROLE, account)
                .unwrap()
        );
        assert!(!roles.has_role(PoolId(0), *NETWORK_POOL_ROLE, account));
        assert!(
            !roles
                .revoke_role(admin, PoolId(0), *NETWORK_POOL_ROLE, account)
                .unwrap()
        );
    }
}

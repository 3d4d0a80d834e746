//! # Access Control
//!
//! Privileged handlers do not take a sender address. They take a
//! capability ([`AdminCap`] or [`KeeperCap`]) that only the checks in this
//! module can mint, so a handler cannot be reached without the sender
//! having been compared against the current role holder.
//!
//! The keeper capability is also where the vault's trust in the keeper
//! becomes explicit: no pending-withdrawal ledger exists, so whatever
//! amount and recipient a `KeeperCap` holder supplies is what gets paid.

use vault_protocol::config::DepositPolicy;
use vault_protocol::message::{AccessClass, Opcode};
use vault_protocol::Address;

use crate::error::VaultError;
use crate::state::VaultState;

/// Proof that the sender is the current admin.
#[derive(Debug)]
pub struct AdminCap {
    admin: Address,
}

impl AdminCap {
    /// The admin this capability was issued to.
    pub fn holder(&self) -> Address {
        self.admin
    }
}

/// Proof that the sender is the current keeper.
#[derive(Debug)]
pub struct KeeperCap {
    keeper: Address,
}

impl KeeperCap {
    /// The keeper this capability was issued to.
    pub fn holder(&self) -> Address {
        self.keeper
    }
}

/// Issues an [`AdminCap`] if `sender` is the current admin.
pub fn require_admin(state: &VaultState, sender: Address, op: Opcode) -> Result<AdminCap, VaultError> {
    if sender != state.admin {
        return Err(VaultError::Unauthorized {
            op: op.name(),
            sender,
        });
    }
    Ok(AdminCap { admin: sender })
}

/// Issues a [`KeeperCap`] if `sender` is the current keeper.
pub fn require_keeper(state: &VaultState, sender: Address, op: Opcode) -> Result<KeeperCap, VaultError> {
    if sender != state.keeper {
        return Err(VaultError::Unauthorized {
            op: op.name(),
            sender,
        });
    }
    Ok(KeeperCap { keeper: sender })
}

/// Checks a deposit notification's sender against the deposit policy.
pub fn require_token_account(
    state: &VaultState,
    policy: DepositPolicy,
    sender: Address,
) -> Result<(), VaultError> {
    match policy {
        DepositPolicy::Open => Ok(()),
        DepositPolicy::TokenAccountOnly if sender == state.token_account => Ok(()),
        DepositPolicy::TokenAccountOnly => Err(VaultError::Unauthorized {
            op: Opcode::DepositNotify.name(),
            sender,
        }),
    }
}

/// What the sender was cleared as, per the operation's access class.
#[derive(Debug)]
pub enum Grant {
    /// Anyone may send it.
    Open,
    /// Sent by the token account (or allowed by an open deposit policy).
    TokenAccount,
    /// Sent by the current admin.
    Admin(AdminCap),
    /// Sent by the current keeper.
    Keeper(KeeperCap),
}

/// Checks `sender` against the access class declared for `op`.
pub fn authorize(
    state: &VaultState,
    policy: DepositPolicy,
    sender: Address,
    op: Opcode,
) -> Result<Grant, VaultError> {
    match op.access_class() {
        AccessClass::Open => Ok(Grant::Open),
        AccessClass::TokenAccount => {
            require_token_account(state, policy, sender)?;
            Ok(Grant::TokenAccount)
        }
        AccessClass::Admin => require_admin(state, sender, op).map(Grant::Admin),
        AccessClass::Keeper => require_keeper(state, sender, op).map(Grant::Keeper),
    }
}

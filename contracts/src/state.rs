//! # Vault State
//!
//! The only persistent data the vault owns. Withdrawal requests are *not*
//! in here: a request lives as a forwarded review message until the keeper
//! answers it, and the keeper's own bookkeeping is what holds it in the
//! meantime.
//!
//! ## Pending Upgrades
//!
//! Governance changes wait in three independent slots (code, admin,
//! keeper). Each slot is a `(deadline, payload)` pair:
//!
//! - `deadline == 0` — idle; the payload is the neutral placeholder.
//! - `deadline != 0` — armed; the payload may be applied once
//!   `now >= deadline`.
//!
//! Arming a slot overwrites whatever it held. Applying or disarming it
//! resets both halves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vault_protocol::{Address, CodeCell};

use crate::error::VaultError;

/// Which of the three governance slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpgradeKind {
    /// Replacement of the vault's executable logic.
    Code,
    /// Rotation of the admin identity.
    Admin,
    /// Rotation of the keeper identity.
    Keeper,
}

impl fmt::Display for UpgradeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpgradeKind::Code => write!(f, "code"),
            UpgradeKind::Admin => write!(f, "admin"),
            UpgradeKind::Keeper => write!(f, "keeper"),
        }
    }
}

/// One timelocked governance slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSlot<T> {
    /// Unix timestamp (seconds) from which the payload may be applied.
    /// Zero means idle.
    pub deadline: u64,
    /// The change waiting to be applied.
    pub payload: T,
}

impl<T: Default> PendingSlot<T> {
    /// `true` while a change is armed.
    pub fn is_pending(&self) -> bool {
        self.deadline != 0
    }

    /// `true` when armed and the deadline has been reached.
    pub fn is_due(&self, now: u64) -> bool {
        self.deadline != 0 && now >= self.deadline
    }

    /// The deadline as a wall-clock time, if armed.
    pub fn deadline_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_pending() {
            return None;
        }
        DateTime::from_timestamp(i64::try_from(self.deadline).ok()?, 0)
    }

    /// Arms the slot with `payload`, due at `now + delay`, replacing any
    /// change already waiting. Returns the new deadline.
    ///
    /// # Errors
    ///
    /// [`VaultError::ArithmeticOverflow`] if the deadline does not fit,
    /// in which case the slot is left as it was.
    pub fn arm(&mut self, now: u64, delay: u64, payload: T) -> Result<u64, VaultError> {
        let deadline = now
            .checked_add(delay)
            .ok_or(VaultError::ArithmeticOverflow)?;
        self.deadline = deadline;
        self.payload = payload;
        Ok(deadline)
    }

    /// Resets the slot to idle. Returns whether anything was pending.
    pub fn disarm(&mut self) -> bool {
        let was_pending = self.is_pending();
        self.deadline = 0;
        self.payload = T::default();
        was_pending
    }

    /// If the slot is due, resets it and hands back the payload.
    pub fn take_due(&mut self, now: u64) -> Option<T> {
        if !self.is_due(now) {
            return None;
        }
        self.deadline = 0;
        Some(std::mem::take(&mut self.payload))
    }
}

/// The three governance slots. Fixed set, so plain fields rather than a map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpgrade {
    /// Pending replacement code.
    pub code: PendingSlot<CodeCell>,
    /// Pending admin.
    pub admin: PendingSlot<Address>,
    /// Pending keeper.
    pub keeper: PendingSlot<Address>,
}

impl PendingUpgrade {
    /// `true` if no slot is armed.
    pub fn is_idle(&self) -> bool {
        !self.code.is_pending() && !self.admin.is_pending() && !self.keeper.is_pending()
    }

    /// Deadline of the given slot (0 when idle).
    pub fn deadline(&self, kind: UpgradeKind) -> u64 {
        match kind {
            UpgradeKind::Code => self.code.deadline,
            UpgradeKind::Admin => self.admin.deadline,
            UpgradeKind::Keeper => self.keeper.deadline,
        }
    }
}

/// Persistent vault state. This is also exactly what the query surface
/// returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultState {
    /// Token account the vault currently directs.
    pub token_account: Address,
    /// Configuration and governance authority.
    pub admin: Address,
    /// Withdrawal authority.
    pub keeper: Address,
    /// In-flight governance changes.
    pub pending_upgrade: PendingUpgrade,
}

impl VaultState {
    /// Fresh state with no pending upgrades.
    ///
    /// The token account may still be the hole (the vault is often
    /// deployed before its token account exists). Admin and keeper may not.
    pub fn new(token_account: Address, admin: Address, keeper: Address) -> Result<Self, VaultError> {
        let state = Self {
            token_account,
            admin,
            keeper,
            pending_upgrade: PendingUpgrade::default(),
        };
        state.check_invariants()?;
        Ok(state)
    }

    /// Admin and keeper must both be real accounts.
    pub(crate) fn check_invariants(&self) -> Result<(), VaultError> {
        if self.admin.is_hole() {
            return Err(VaultError::InvalidAddress("admin must not be the hole address"));
        }
        if self.keeper.is_hole() {
            return Err(VaultError::InvalidAddress("keeper must not be the hole address"));
        }
        Ok(())
    }

    /// Compact binary snapshot for persistence.
    pub fn to_bytes(&self) -> Result<Vec<u8>, VaultError> {
        bincode::serialize(self).map_err(|e| VaultError::Serialization(e.to_string()))
    }

    /// Restores a snapshot, re-checking the admin/keeper invariant.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let state: Self =
            bincode::deserialize(bytes).map_err(|e| VaultError::Serialization(e.to_string()))?;
        state.check_invariants()?;
        Ok(state)
    }

    /// JSON rendering for operators.
    pub fn to_json(&self) -> Result<String, VaultError> {
        serde_json::to_string_pretty(self).map_err(|e| VaultError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> VaultState {
        VaultState::new(
            Address::HOLE,
            Address::from_seed("admin"),
            Address::from_seed("keeper"),
        )
        .unwrap()
    }

    #[test]
    fn new_state_has_idle_slots() {
        let s = state();
        assert!(s.pending_upgrade.is_idle());
        assert_eq!(s.pending_upgrade.admin.payload, Address::HOLE);
        assert!(s.pending_upgrade.code.payload.is_empty());
    }

    #[test]
    fn hole_admin_or_keeper_rejected() {
        let k = Address::from_seed("keeper");
        assert!(VaultState::new(Address::HOLE, Address::HOLE, k).is_err());
        assert!(VaultState::new(Address::HOLE, k, Address::HOLE).is_err());
    }

    #[test]
    fn arm_sets_future_deadline() {
        let mut slot = PendingSlot::<Address>::default();
        let deadline = slot.arm(1_000, 50, Address::from_seed("x")).unwrap();
        assert_eq!(deadline, 1_050);
        assert!(slot.is_pending());
        assert!(!slot.is_due(1_049));
        assert!(slot.is_due(1_050));
    }

    #[test]
    fn arm_overflow_leaves_slot_alone() {
        let mut slot = PendingSlot::<Address>::default();
        assert!(matches!(
            slot.arm(u64::MAX, 1, Address::from_seed("x")),
            Err(VaultError::ArithmeticOverflow)
        ));
        assert!(!slot.is_pending());
        assert_eq!(slot.payload, Address::HOLE);
    }

    #[test]
    fn rearm_overwrites() {
        let mut slot = PendingSlot::<Address>::default();
        slot.arm(100, 10, Address::from_seed("first")).unwrap();
        slot.arm(105, 10, Address::from_seed("second")).unwrap();
        assert_eq!(slot.deadline, 115);
        assert_eq!(slot.payload, Address::from_seed("second"));
    }

    #[test]
    fn take_due_resets() {
        let mut slot = PendingSlot::<Address>::default();
        slot.arm(0, 10, Address::from_seed("x")).unwrap();
        assert_eq!(slot.take_due(9), None);
        assert_eq!(slot.take_due(10), Some(Address::from_seed("x")));
        assert_eq!(slot, PendingSlot::default());
        assert_eq!(slot.take_due(10), None);
    }

    #[test]
    fn disarm_reports_previous_state() {
        let mut slot = PendingSlot::<CodeCell>::default();
        assert!(!slot.disarm());
        slot.arm(0, 10, CodeCell::new(vec![1])).unwrap();
        assert!(slot.disarm());
        assert!(slot.payload.is_empty());
    }

    #[test]
    fn deadline_renders_as_utc() {
        let mut slot = PendingSlot::<Address>::default();
        assert!(slot.deadline_at().is_none());
        slot.arm(1_700_000_000, 172_800, Address::from_seed("x")).unwrap();
        let at = slot.deadline_at().unwrap();
        assert_eq!(at.timestamp(), 1_700_172_800);
    }

    #[test]
    fn binary_snapshot_restores() {
        let mut s = state();
        s.pending_upgrade
            .keeper
            .arm(10, 20, Address::from_seed("k2"))
            .unwrap();
        let restored = VaultState::from_bytes(&s.to_bytes().unwrap()).unwrap();
        assert_eq!(restored, s);
        assert!(s.to_json().unwrap().contains("pending_upgrade"));
    }
}

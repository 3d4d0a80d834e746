//! # Timelocked Upgrades
//!
//! Admin-only governance over three independent slots:
//!
//! | Slot   | Payload      | Delay (default) |
//! |--------|--------------|-----------------|
//! | code   | [`CodeCell`] | 7 days          |
//! | admin  | [`Address`]  | 2 days          |
//! | keeper | [`Address`]  | 2 days          |
//!
//! `init_*` arms a slot (overwriting), `cancel` disarms it at any time
//! before finalization, and `finalize` applies every slot that is due in a
//! single pass. Until finalization the *current* admin stays fully in
//! charge; a pending admin has no power at all.

use tracing::{debug, info};
use vault_protocol::config::VaultConfig;
use vault_protocol::{Address, CodeCell};

use crate::auth::AdminCap;
use crate::error::VaultError;
use crate::state::{UpgradeKind, VaultState};
use crate::vault::VaultEvent;

/// The configured delay for a slot.
pub fn delay_for(config: &VaultConfig, kind: UpgradeKind) -> u64 {
    match kind {
        UpgradeKind::Code => config.code_upgrade_delay_secs,
        UpgradeKind::Admin => config.admin_upgrade_delay_secs,
        UpgradeKind::Keeper => config.keeper_upgrade_delay_secs,
    }
}

/// Arms the code slot with replacement logic.
///
/// # Errors
///
/// [`VaultError::InvalidCode`] for empty code: it is indistinguishable
/// from the idle placeholder and would leave the vault without logic.
pub fn init_code_upgrade(
    state: &mut VaultState,
    _admin: &AdminCap,
    config: &VaultConfig,
    now: u64,
    code: CodeCell,
) -> Result<VaultEvent, VaultError> {
    if code.is_empty() {
        return Err(VaultError::InvalidCode("replacement code must not be empty"));
    }
    let code_hash = code.hash_hex();
    let deadline = state.pending_upgrade.code.arm(
        now,
        delay_for(config, UpgradeKind::Code),
        code,
    )?;
    info!(deadline, code_hash = %code_hash, "code upgrade scheduled");
    Ok(VaultEvent::UpgradeScheduled {
        kind: UpgradeKind::Code,
        deadline,
    })
}

/// Arms the admin slot.
///
/// # Errors
///
/// [`VaultError::InvalidAddress`] for the hole address: finalizing it
/// would leave the vault without an admin.
pub fn init_admin_upgrade(
    state: &mut VaultState,
    _admin: &AdminCap,
    config: &VaultConfig,
    now: u64,
    new_admin: Address,
) -> Result<VaultEvent, VaultError> {
    if new_admin.is_hole() {
        return Err(VaultError::InvalidAddress("new admin must not be the hole address"));
    }
    let deadline = state.pending_upgrade.admin.arm(
        now,
        delay_for(config, UpgradeKind::Admin),
        new_admin,
    )?;
    info!(deadline, new_admin = %new_admin, "admin rotation scheduled");
    Ok(VaultEvent::UpgradeScheduled {
        kind: UpgradeKind::Admin,
        deadline,
    })
}

/// Arms the keeper slot.
///
/// # Errors
///
/// [`VaultError::InvalidAddress`] for the hole address.
pub fn init_keeper_upgrade(
    state: &mut VaultState,
    _admin: &AdminCap,
    config: &VaultConfig,
    now: u64,
    new_keeper: Address,
) -> Result<VaultEvent, VaultError> {
    if new_keeper.is_hole() {
        return Err(VaultError::InvalidAddress("new keeper must not be the hole address"));
    }
    let deadline = state.pending_upgrade.keeper.arm(
        now,
        delay_for(config, UpgradeKind::Keeper),
        new_keeper,
    )?;
    info!(deadline, new_keeper = %new_keeper, "keeper rotation scheduled");
    Ok(VaultEvent::UpgradeScheduled {
        kind: UpgradeKind::Keeper,
        deadline,
    })
}

/// Disarms a slot, due or not. Cancelling an idle slot is a no-op.
pub fn cancel_upgrade(state: &mut VaultState, _admin: &AdminCap, kind: UpgradeKind) -> VaultEvent {
    let pending = &mut state.pending_upgrade;
    let deadline = pending.deadline(kind);
    let was_pending = match kind {
        UpgradeKind::Code => pending.code.disarm(),
        UpgradeKind::Admin => pending.admin.disarm(),
        UpgradeKind::Keeper => pending.keeper.disarm(),
    };
    if was_pending {
        info!(%kind, deadline, "upgrade cancelled");
    } else {
        debug!(%kind, "cancel on idle slot ignored");
    }
    VaultEvent::UpgradeCancelled { kind, was_pending }
}

/// Applies every due slot and returns which ones were applied, in
/// code, admin, keeper order. Slots not yet due are left untouched.
///
/// `code` is the vault's active logic, replaced in place when the code
/// slot is due.
pub fn finalize_upgrades(
    state: &mut VaultState,
    code: &mut CodeCell,
    _admin: &AdminCap,
    now: u64,
) -> Vec<UpgradeKind> {
    let mut applied = Vec::new();

    if let Some(new_code) = state.pending_upgrade.code.take_due(now) {
        info!(
            previous = %code.hash_hex(),
            current = %new_code.hash_hex(),
            "code replaced"
        );
        *code = new_code;
        applied.push(UpgradeKind::Code);
    }

    if let Some(new_admin) = state.pending_upgrade.admin.take_due(now) {
        info!(previous = %state.admin, current = %new_admin, "admin rotated");
        state.admin = new_admin;
        applied.push(UpgradeKind::Admin);
    }

    if let Some(new_keeper) = state.pending_upgrade.keeper.take_due(now) {
        info!(previous = %state.keeper, current = %new_keeper, "keeper rotated");
        state.keeper = new_keeper;
        applied.push(UpgradeKind::Keeper);
    }

    if applied.is_empty() {
        debug!(now, "finalize found nothing due");
    }
    applied
}

//! Operation tags.
//!
//! The numeric values are the ones already in use by deployed clients, so
//! they are frozen. Never renumber a variant.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::codec::CodecError;

/// Opcode of the transfer instruction the vault sends to its token account.
pub const TOKEN_TRANSFER_OP: u32 = 0x0f8a_7ea5;

/// First four bytes of every bounced body.
pub const BOUNCE_PREFIX: u32 = 0xffff_ffff;

/// Who may send a given operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessClass {
    /// Any sender.
    Open,
    /// The paired token account (subject to the deposit policy).
    TokenAccount,
    /// The current keeper only.
    Keeper,
    /// The current admin only.
    Admin,
}

/// Operations the vault accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u32)]
pub enum Opcode {
    /// Token account reports an incoming deposit.
    DepositNotify = 0x7362_d09c,
    /// A user asks for a withdrawal to be reviewed.
    RequestWithdrawal = 0x25d4_fcff,
    /// Keeper rejects a withdrawal request.
    RefuseWithdrawal = 0xe659_c222,
    /// Keeper approves and executes a withdrawal.
    ApproveWithdrawal = 0xb5de_5f9e,
    /// Admin re-pairs the vault with a token account.
    SetTokenAccount = 0xed10_5058,
    /// Admin arms the code slot.
    InitCodeUpgrade = 0xdf1e_233d,
    /// Admin arms the admin slot.
    InitAdminUpgrade = 0x2fb9_4384,
    /// Admin arms the keeper slot.
    InitKeeperUpgrade = 0x8349_e5be,
    /// Admin disarms the code slot.
    CancelCodeUpgrade = 0x357c_cc67,
    /// Admin disarms the admin slot.
    CancelAdminUpgrade = 0xa4ed_9981,
    /// Admin disarms the keeper slot.
    CancelKeeperUpgrade = 0xf3a8_45eb,
    /// Admin applies every slot whose deadline has passed.
    FinalizeUpgrades = 0x6378_509f,
}

impl Opcode {
    /// All opcodes, in table order.
    pub const ALL: [Opcode; 12] = [
        Opcode::DepositNotify,
        Opcode::RequestWithdrawal,
        Opcode::RefuseWithdrawal,
        Opcode::ApproveWithdrawal,
        Opcode::SetTokenAccount,
        Opcode::InitCodeUpgrade,
        Opcode::InitAdminUpgrade,
        Opcode::InitKeeperUpgrade,
        Opcode::CancelCodeUpgrade,
        Opcode::CancelAdminUpgrade,
        Opcode::CancelKeeperUpgrade,
        Opcode::FinalizeUpgrades,
    ];

    /// The 32-bit wire tag.
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// The authorization class the vault enforces for this operation.
    pub const fn access_class(self) -> AccessClass {
        match self {
            Opcode::DepositNotify => AccessClass::TokenAccount,
            Opcode::RequestWithdrawal => AccessClass::Open,
            Opcode::RefuseWithdrawal | Opcode::ApproveWithdrawal => AccessClass::Keeper,
            Opcode::SetTokenAccount
            | Opcode::InitCodeUpgrade
            | Opcode::InitAdminUpgrade
            | Opcode::InitKeeperUpgrade
            | Opcode::CancelCodeUpgrade
            | Opcode::CancelAdminUpgrade
            | Opcode::CancelKeeperUpgrade
            | Opcode::FinalizeUpgrades => AccessClass::Admin,
        }
    }

    /// Short snake_case name for logs.
    pub const fn name(self) -> &'static str {
        match self {
            Opcode::DepositNotify => "deposit_notify",
            Opcode::RequestWithdrawal => "request_withdrawal",
            Opcode::RefuseWithdrawal => "refuse_withdrawal",
            Opcode::ApproveWithdrawal => "approve_withdrawal",
            Opcode::SetTokenAccount => "set_token_account",
            Opcode::InitCodeUpgrade => "init_code_upgrade",
            Opcode::InitAdminUpgrade => "init_admin_upgrade",
            Opcode::InitKeeperUpgrade => "init_keeper_upgrade",
            Opcode::CancelCodeUpgrade => "cancel_code_upgrade",
            Opcode::CancelAdminUpgrade => "cancel_admin_upgrade",
            Opcode::CancelKeeperUpgrade => "cancel_keeper_upgrade",
            Opcode::FinalizeUpgrades => "finalize_upgrades",
        }
    }
}

impl TryFrom<u32> for Opcode {
    type Error = CodecError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.code() == value)
            .ok_or(CodecError::UnknownOpcode(value))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn opcodes_are_distinct() {
        let codes: HashSet<u32> = Opcode::ALL.iter().map(|op| op.code()).collect();
        assert_eq!(codes.len(), Opcode::ALL.len());
        assert!(!codes.contains(&TOKEN_TRANSFER_OP));
        assert!(!codes.contains(&BOUNCE_PREFIX));
    }

    #[test]
    fn every_opcode_resolves_from_its_tag() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::try_from(op.code()).unwrap(), op);
        }
        assert_eq!(
            Opcode::try_from(0xdead_beef),
            Err(CodecError::UnknownOpcode(0xdead_beef))
        );
    }

    #[test]
    fn access_classes_partition_the_table() {
        let admin = Opcode::ALL
            .iter()
            .filter(|op| op.access_class() == AccessClass::Admin)
            .count();
        let keeper = Opcode::ALL
            .iter()
            .filter(|op| op.access_class() == AccessClass::Keeper)
            .count();
        assert_eq!(admin, 8);
        assert_eq!(keeper, 2);
        assert_eq!(Opcode::RequestWithdrawal.access_class(), AccessClass::Open);
        assert_eq!(Opcode::DepositNotify.access_class(), AccessClass::TokenAccount);
    }
}

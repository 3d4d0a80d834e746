//! Messages the vault accepts.
//!
//! An empty body is a plain top-up. A body flagged as bounced by the
//! transport is a [`BouncedMessage`], whatever its contents. Everything
//! else must start with a known [`Opcode`].

use bytes::Bytes;

use super::codec::{BodyReader, BodyWriter, CodecError};
use super::opcode::{Opcode, BOUNCE_PREFIX, TOKEN_TRANSFER_OP};
use crate::address::Address;
use crate::code::{CodeCell, MAX_CODE_SIZE};
use crate::Coins;

/// Largest forward payload accepted on a deposit notification.
pub const MAX_FORWARD_PAYLOAD_SIZE: usize = 4 * 1024;

/// How many bytes of the original body survive in a bounce.
pub const BOUNCE_PAYLOAD_LIMIT: usize = 32;

/// A decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Empty body. Value is simply kept.
    TopUp,
    /// The token account reports that `amount` tokens arrived from `depositor`.
    DepositNotify {
        query_id: u64,
        amount: Coins,
        depositor: Address,
        forward_payload: Bytes,
    },
    /// Ask the keeper to review a withdrawal of `amount` tokens to `user`.
    RequestWithdrawal {
        query_id: u64,
        amount: Coins,
        user: Address,
    },
    /// Keeper declines a request; the attached value goes back to `user`.
    RefuseWithdrawal {
        query_id: u64,
        amount: Coins,
        user: Address,
    },
    /// Keeper approves a request; `amount` tokens go to `user`.
    ApproveWithdrawal {
        query_id: u64,
        amount: Coins,
        user: Address,
        forward_value: Coins,
    },
    SetTokenAccount {
        query_id: u64,
        token_account: Address,
    },
    InitCodeUpgrade {
        query_id: u64,
        code: CodeCell,
    },
    InitAdminUpgrade {
        query_id: u64,
        admin: Address,
    },
    InitKeeperUpgrade {
        query_id: u64,
        keeper: Address,
    },
    CancelCodeUpgrade {
        query_id: u64,
    },
    CancelAdminUpgrade {
        query_id: u64,
    },
    CancelKeeperUpgrade {
        query_id: u64,
    },
    FinalizeUpgrades {
        query_id: u64,
    },
    /// One of the vault's own outbound messages came back undelivered.
    Bounced(BouncedMessage),
}

impl InboundMessage {
    /// The operation, or `None` for top-ups and bounces.
    pub fn opcode(&self) -> Option<Opcode> {
        Some(match self {
            InboundMessage::TopUp | InboundMessage::Bounced(_) => return None,
            InboundMessage::DepositNotify { .. } => Opcode::DepositNotify,
            InboundMessage::RequestWithdrawal { .. } => Opcode::RequestWithdrawal,
            InboundMessage::RefuseWithdrawal { .. } => Opcode::RefuseWithdrawal,
            InboundMessage::ApproveWithdrawal { .. } => Opcode::ApproveWithdrawal,
            InboundMessage::SetTokenAccount { .. } => Opcode::SetTokenAccount,
            InboundMessage::InitCodeUpgrade { .. } => Opcode::InitCodeUpgrade,
            InboundMessage::InitAdminUpgrade { .. } => Opcode::InitAdminUpgrade,
            InboundMessage::InitKeeperUpgrade { .. } => Opcode::InitKeeperUpgrade,
            InboundMessage::CancelCodeUpgrade { .. } => Opcode::CancelCodeUpgrade,
            InboundMessage::CancelAdminUpgrade { .. } => Opcode::CancelAdminUpgrade,
            InboundMessage::CancelKeeperUpgrade { .. } => Opcode::CancelKeeperUpgrade,
            InboundMessage::FinalizeUpgrades { .. } => Opcode::FinalizeUpgrades,
        })
    }

    /// The caller-chosen correlation id (0 for top-ups).
    pub fn query_id(&self) -> u64 {
        match self {
            InboundMessage::TopUp => 0,
            InboundMessage::Bounced(b) => b.query_id,
            InboundMessage::DepositNotify { query_id, .. }
            | InboundMessage::RequestWithdrawal { query_id, .. }
            | InboundMessage::RefuseWithdrawal { query_id, .. }
            | InboundMessage::ApproveWithdrawal { query_id, .. }
            | InboundMessage::SetTokenAccount { query_id, .. }
            | InboundMessage::InitCodeUpgrade { query_id, .. }
            | InboundMessage::InitAdminUpgrade { query_id, .. }
            | InboundMessage::InitKeeperUpgrade { query_id, .. }
            | InboundMessage::CancelCodeUpgrade { query_id }
            | InboundMessage::CancelAdminUpgrade { query_id }
            | InboundMessage::CancelKeeperUpgrade { query_id }
            | InboundMessage::FinalizeUpgrades { query_id } => *query_id,
        }
    }

    /// Decodes a body. `bounced` is the transport's bounce flag.
    pub fn decode(body: &[u8], bounced: bool) -> Result<Self, CodecError> {
        if bounced {
            return BouncedMessage::decode(body).map(InboundMessage::Bounced);
        }
        if body.is_empty() {
            return Ok(InboundMessage::TopUp);
        }

        let mut r = BodyReader::new(body);
        let op = Opcode::try_from(r.u32("op")?)?;
        let query_id = r.u64("query_id")?;

        let msg = match op {
            Opcode::DepositNotify => InboundMessage::DepositNotify {
                query_id,
                amount: r.coins("amount")?,
                depositor: r.address("depositor")?,
                forward_payload: r.blob("forward_payload", MAX_FORWARD_PAYLOAD_SIZE)?,
            },
            Opcode::RequestWithdrawal => InboundMessage::RequestWithdrawal {
                query_id,
                amount: r.coins("amount")?,
                user: r.address("user")?,
            },
            Opcode::RefuseWithdrawal => InboundMessage::RefuseWithdrawal {
                query_id,
                amount: r.coins("amount")?,
                user: r.address("user")?,
            },
            Opcode::ApproveWithdrawal => InboundMessage::ApproveWithdrawal {
                query_id,
                amount: r.coins("amount")?,
                user: r.address("user")?,
                forward_value: r.coins("forward_value")?,
            },
            Opcode::SetTokenAccount => InboundMessage::SetTokenAccount {
                query_id,
                token_account: r.address("token_account")?,
            },
            Opcode::InitCodeUpgrade => InboundMessage::InitCodeUpgrade {
                query_id,
                code: CodeCell::new(r.blob("code", MAX_CODE_SIZE)?.to_vec()),
            },
            Opcode::InitAdminUpgrade => InboundMessage::InitAdminUpgrade {
                query_id,
                admin: r.address("admin")?,
            },
            Opcode::InitKeeperUpgrade => InboundMessage::InitKeeperUpgrade {
                query_id,
                keeper: r.address("keeper")?,
            },
            Opcode::CancelCodeUpgrade => InboundMessage::CancelCodeUpgrade { query_id },
            Opcode::CancelAdminUpgrade => InboundMessage::CancelAdminUpgrade { query_id },
            Opcode::CancelKeeperUpgrade => InboundMessage::CancelKeeperUpgrade { query_id },
            Opcode::FinalizeUpgrades => InboundMessage::FinalizeUpgrades { query_id },
        };

        r.finish()?;
        Ok(msg)
    }

    /// Encodes the body. Bounces encode to their bounced form.
    pub fn encode(&self) -> Bytes {
        let header = |op: Opcode| BodyWriter::new(op.code(), self.query_id());
        match self {
            InboundMessage::TopUp => Bytes::new(),
            InboundMessage::Bounced(b) => b.encode(),
            InboundMessage::DepositNotify {
                amount,
                depositor,
                forward_payload,
                ..
            } => header(Opcode::DepositNotify)
                .coins(*amount)
                .address(depositor)
                .blob(forward_payload)
                .finish(),
            InboundMessage::RequestWithdrawal { amount, user, .. } => {
                header(Opcode::RequestWithdrawal)
                    .coins(*amount)
                    .address(user)
                    .finish()
            }
            InboundMessage::RefuseWithdrawal { amount, user, .. } => {
                header(Opcode::RefuseWithdrawal)
                    .coins(*amount)
                    .address(user)
                    .finish()
            }
            InboundMessage::ApproveWithdrawal {
                amount,
                user,
                forward_value,
                ..
            } => header(Opcode::ApproveWithdrawal)
                .coins(*amount)
                .address(user)
                .coins(*forward_value)
                .finish(),
            InboundMessage::SetTokenAccount { token_account, .. } => {
                header(Opcode::SetTokenAccount)
                    .address(token_account)
                    .finish()
            }
            InboundMessage::InitCodeUpgrade { code, .. } => header(Opcode::InitCodeUpgrade)
                .blob(code.as_bytes())
                .finish(),
            InboundMessage::InitAdminUpgrade { admin, .. } => header(Opcode::InitAdminUpgrade)
                .address(admin)
                .finish(),
            InboundMessage::InitKeeperUpgrade { keeper, .. } => {
                header(Opcode::InitKeeperUpgrade)
                    .address(keeper)
                    .finish()
            }
            InboundMessage::CancelCodeUpgrade { .. } => header(Opcode::CancelCodeUpgrade).finish(),
            InboundMessage::CancelAdminUpgrade { .. } => {
                header(Opcode::CancelAdminUpgrade).finish()
            }
            InboundMessage::CancelKeeperUpgrade { .. } => {
                header(Opcode::CancelKeeperUpgrade).finish()
            }
            InboundMessage::FinalizeUpgrades { .. } => header(Opcode::FinalizeUpgrades).finish(),
        }
    }
}

/// A negative acknowledgement: one of the vault's outbound messages could
/// not be delivered or executed and its value came back.
///
/// Only the head of the original body survives a bounce, so every field
/// past the prefix is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BouncedMessage {
    /// Opcode of the message that bounced, if it survived.
    pub original_op: Option<u32>,
    /// Query id of the message that bounced (0 if it did not survive).
    pub query_id: u64,
    /// Token amount, when the bounced message was a token transfer.
    pub amount: Option<Coins>,
}

impl BouncedMessage {
    /// Builds the bounced form of `original`: the prefix followed by at
    /// most [`BOUNCE_PAYLOAD_LIMIT`] bytes of the original body.
    pub fn wrap(original: &[u8]) -> Bytes {
        let kept = original.len().min(BOUNCE_PAYLOAD_LIMIT);
        BodyWriter::raw()
            .u32(BOUNCE_PREFIX)
            .bytes(&original[..kept])
            .finish()
    }

    /// Decodes a bounced body. Only a missing prefix is an error.
    pub fn decode(body: &[u8]) -> Result<Self, CodecError> {
        let mut r = BodyReader::new(body);
        if r.u32("bounce_prefix")? != BOUNCE_PREFIX {
            return Err(CodecError::BadBouncePrefix);
        }

        let original_op = r.u32("op").ok();
        let query_id = r.u64("query_id").unwrap_or(0);
        let amount = match original_op {
            Some(TOKEN_TRANSFER_OP) => r.coins("amount").ok(),
            _ => None,
        };

        Ok(Self {
            original_op,
            query_id,
            amount,
        })
    }

    /// Re-encodes the surviving fields in bounced form.
    pub fn encode(&self) -> Bytes {
        let mut w = BodyWriter::raw().u32(BOUNCE_PREFIX);
        if let Some(op) = self.original_op {
            w = w.u32(op).u64(self.query_id);
            if let Some(amount) = self.amount {
                w = w.coins(amount);
            }
        }
        w.finish()
    }

    /// `true` when the bounced message was a token transfer.
    pub fn is_token_transfer(&self) -> bool {
        self.original_op == Some(TOKEN_TRANSFER_OP)
    }
}

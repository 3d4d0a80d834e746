//! # Vault State Machine
//!
//! [`Vault`] owns the persistent [`VaultState`] plus the currently active
//! code, and processes one inbound message at a time to completion.
//!
//! ## Processing Model
//!
//! 1. The transport delivers `(sender, value, now, bounced, body)`.
//! 2. [`Vault::receive`] decodes the body; [`Vault::handle`] checks the
//!    sender against the operation's authorization class.
//! 3. The handler validates everything it needs, *then* mutates state.
//!    A rejected message leaves the state exactly as it was.
//! 4. The returned [`Receipt`] lists what happened and which messages the
//!    transport must send. The vault never waits on them.
//!
//! Bounces are ordinary inbound messages with the bounce flag set. They go
//! through the same pipeline and are always accepted.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use vault_protocol::config::VaultConfig;
use vault_protocol::message::{InboundMessage, Opcode, OutboundMessage};
use vault_protocol::{Address, CodeCell, Coins};

use crate::auth::{self, Grant};
use crate::bounce;
use crate::error::VaultError;
use crate::state::{UpgradeKind, VaultState};
use crate::timelock;
use crate::withdrawal::{self, Forward, WithdrawalTicket};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Transport metadata for one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageContext {
    /// Who sent it.
    pub sender: Address,
    /// Native value attached.
    pub value: Coins,
    /// Current time, unix seconds.
    pub now: u64,
    /// Set by the transport on returned messages.
    pub bounced: bool,
}

impl MessageContext {
    /// A regular (non-bounced) message.
    pub fn new(sender: Address, value: Coins, now: u64) -> Self {
        Self {
            sender,
            value,
            now,
            bounced: false,
        }
    }

    /// Marks the message as bounced.
    pub fn bounced(mut self) -> Self {
        self.bounced = true;
        self
    }
}

/// Something the vault did while processing a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultEvent {
    /// Plain value top-up.
    ToppedUp { from: Address, value: Coins },
    /// The token account reported a deposit.
    Deposited { depositor: Address, amount: Coins },
    /// A review notice went to the keeper.
    WithdrawalRequested {
        requester: Address,
        user: Address,
        amount: Coins,
        forwarded: Coins,
    },
    /// The keeper declined; value went back to the user.
    WithdrawalRefused {
        user: Address,
        amount: Coins,
        refunded: Coins,
    },
    /// The keeper approved; a transfer instruction went to the token account.
    WithdrawalApproved {
        user: Address,
        amount: Coins,
        forward_value: Coins,
    },
    /// The vault was re-paired with a token account.
    TokenAccountChanged { previous: Address, current: Address },
    /// A governance slot was armed.
    UpgradeScheduled { kind: UpgradeKind, deadline: u64 },
    /// A governance slot was disarmed (or already idle).
    UpgradeCancelled { kind: UpgradeKind, was_pending: bool },
    /// A governance slot was applied.
    UpgradeApplied { kind: UpgradeKind },
    /// One of the vault's outbound messages came back.
    TransferBounced {
        query_id: u64,
        original_op: Option<u32>,
        amount: Option<Coins>,
    },
}

/// Outcome of an accepted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Operation processed (`None` for top-ups and bounces).
    pub op: Option<Opcode>,
    /// Correlation id of the inbound message.
    pub query_id: u64,
    /// What happened, in order.
    pub events: Vec<VaultEvent>,
    /// Messages for the transport to send.
    pub outbound: Vec<OutboundMessage>,
}

impl Receipt {
    fn new(op: Option<Opcode>, query_id: u64) -> Self {
        Self {
            op,
            query_id,
            events: Vec::new(),
            outbound: Vec::new(),
        }
    }

    fn forward(&mut self, fwd: Forward) {
        self.events.push(fwd.event);
        self.outbound.push(fwd.message);
    }

    /// Total native value leaving the vault.
    pub fn outbound_value(&self) -> Coins {
        self.outbound.iter().map(|m| m.value).sum()
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// The vault: configuration, persistent state, and active code.
#[derive(Debug, Clone)]
pub struct Vault {
    config: VaultConfig,
    state: VaultState,
    code: CodeCell,
}

impl Vault {
    /// Deploys a vault with idle upgrade slots.
    ///
    /// # Errors
    ///
    /// [`VaultError::Config`] for an invalid config,
    /// [`VaultError::InvalidAddress`] for a hole admin or keeper.
    pub fn new(
        config: VaultConfig,
        token_account: Address,
        admin: Address,
        keeper: Address,
        code: CodeCell,
    ) -> Result<Self, VaultError> {
        let state = VaultState::new(token_account, admin, keeper)?;
        Self::from_state(config, state, code)
    }

    /// Resumes a vault from persisted state.
    ///
    /// # Errors
    ///
    /// Same as [`Vault::new`]: the state's admin and keeper are re-checked.
    pub fn from_state(config: VaultConfig, state: VaultState, code: CodeCell) -> Result<Self, VaultError> {
        config.validate()?;
        state.check_invariants()?;
        Ok(Self { config, state, code })
    }

    /// Active configuration.
    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Borrow the persistent state.
    pub fn state(&self) -> &VaultState {
        &self.state
    }

    /// The query surface: `(token_account, admin, keeper, pending_upgrade)`
    /// verbatim.
    pub fn vault_data(&self) -> VaultState {
        self.state.clone()
    }

    /// Currently active logic.
    pub fn code(&self) -> &CodeCell {
        &self.code
    }

    /// BLAKE3 digest of the active logic.
    pub fn code_hash(&self) -> [u8; 32] {
        self.code.hash()
    }

    /// Decodes and processes a raw inbound body.
    ///
    /// Bounced messages are accepted even when their body is unreadable.
    pub fn receive(&mut self, ctx: &MessageContext, body: &[u8]) -> Result<Receipt, VaultError> {
        let msg = match InboundMessage::decode(body, ctx.bounced) {
            Ok(msg) => msg,
            Err(err) if ctx.bounced => {
                let mut receipt = Receipt::new(None, 0);
                receipt.events.push(bounce::absorb_unreadable(ctx, &err));
                return Ok(receipt);
            }
            Err(err) => {
                warn!(sender = %ctx.sender, value = ctx.value, error = %err, "malformed message rejected");
                return Err(err.into());
            }
        };
        self.handle(ctx, msg)
    }

    /// Processes an already-decoded message.
    pub fn handle(&mut self, ctx: &MessageContext, msg: InboundMessage) -> Result<Receipt, VaultError> {
        let op = msg.opcode();
        let result = self.dispatch(ctx, msg);

        match &result {
            Ok(receipt) => {
                debug_assert!(receipt.outbound_value() <= ctx.value);
                if let Some(op) = op {
                    info!(
                        %op,
                        sender = %ctx.sender,
                        query_id = receipt.query_id,
                        outbound = receipt.outbound.len(),
                        "message accepted"
                    );
                }
            }
            Err(err) => {
                warn!(
                    op = op.map(|o| o.name()).unwrap_or("none"),
                    sender = %ctx.sender,
                    value = ctx.value,
                    error = %err,
                    "message rejected"
                );
            }
        }
        result
    }

    fn dispatch(&mut self, ctx: &MessageContext, msg: InboundMessage) -> Result<Receipt, VaultError> {
        let mut receipt = Receipt::new(msg.opcode(), msg.query_id());
        let grant = match msg.opcode() {
            Some(op) => auth::authorize(&self.state, self.config.deposit_policy, ctx.sender, op)?,
            None => Grant::Open,
        };

        match (grant, msg) {
            (Grant::Open, InboundMessage::TopUp) => {
                receipt.events.push(VaultEvent::ToppedUp {
                    from: ctx.sender,
                    value: ctx.value,
                });
            }

            (Grant::Open, InboundMessage::Bounced(bounced)) => {
                receipt.events.push(bounce::absorb(ctx, &bounced));
            }

            (Grant::TokenAccount, InboundMessage::DepositNotify { amount, depositor, .. }) => {
                info!(depositor = %depositor, amount, "deposit received");
                receipt.events.push(VaultEvent::Deposited { depositor, amount });
            }

            // --- Withdrawals ---
            (
                Grant::Open,
                InboundMessage::RequestWithdrawal {
                    query_id,
                    amount,
                    user,
                },
            ) => {
                let ticket = WithdrawalTicket {
                    query_id,
                    amount,
                    user,
                };
                receipt.forward(withdrawal::request_withdrawal(
                    &self.state,
                    &self.config,
                    ctx,
                    ticket,
                )?);
            }

            (
                Grant::Keeper(keeper),
                InboundMessage::RefuseWithdrawal {
                    query_id,
                    amount,
                    user,
                },
            ) => {
                let ticket = WithdrawalTicket {
                    query_id,
                    amount,
                    user,
                };
                receipt.forward(withdrawal::refuse_withdrawal(
                    &keeper,
                    &self.config,
                    ctx,
                    ticket,
                )?);
            }

            (
                Grant::Keeper(keeper),
                InboundMessage::ApproveWithdrawal {
                    query_id,
                    amount,
                    user,
                    forward_value,
                },
            ) => {
                let ticket = WithdrawalTicket {
                    query_id,
                    amount,
                    user,
                };
                receipt.forward(withdrawal::approve_withdrawal(
                    &self.state,
                    &keeper,
                    &self.config,
                    ctx,
                    ticket,
                    forward_value,
                )?);
            }

            // --- Configuration ---
            (Grant::Admin(_), InboundMessage::SetTokenAccount { token_account, .. }) => {
                if token_account.is_hole() {
                    return Err(VaultError::InvalidAddress("token account must not be the hole address"));
                }
                let previous = std::mem::replace(&mut self.state.token_account, token_account);
                info!(previous = %previous, current = %token_account, "token account changed");
                receipt.events.push(VaultEvent::TokenAccountChanged {
                    previous,
                    current: token_account,
                });
            }

            // --- Governance ---
            (Grant::Admin(admin), InboundMessage::InitCodeUpgrade { code, .. }) => {
                receipt.events.push(timelock::init_code_upgrade(
                    &mut self.state,
                    &admin,
                    &self.config,
                    ctx.now,
                    code,
                )?);
            }

            (Grant::Admin(admin), InboundMessage::InitAdminUpgrade { admin: new_admin, .. }) => {
                receipt.events.push(timelock::init_admin_upgrade(
                    &mut self.state,
                    &admin,
                    &self.config,
                    ctx.now,
                    new_admin,
                )?);
            }

            (Grant::Admin(admin), InboundMessage::InitKeeperUpgrade { keeper, .. }) => {
                receipt.events.push(timelock::init_keeper_upgrade(
                    &mut self.state,
                    &admin,
                    &self.config,
                    ctx.now,
                    keeper,
                )?);
            }

            (Grant::Admin(admin), InboundMessage::CancelCodeUpgrade { .. }) => {
                receipt
                    .events
                    .push(timelock::cancel_upgrade(&mut self.state, &admin, UpgradeKind::Code));
            }

            (Grant::Admin(admin), InboundMessage::CancelAdminUpgrade { .. }) => {
                receipt
                    .events
                    .push(timelock::cancel_upgrade(&mut self.state, &admin, UpgradeKind::Admin));
            }

            (Grant::Admin(admin), InboundMessage::CancelKeeperUpgrade { .. }) => {
                receipt
                    .events
                    .push(timelock::cancel_upgrade(&mut self.state, &admin, UpgradeKind::Keeper));
            }

            (Grant::Admin(admin), InboundMessage::FinalizeUpgrades { .. }) => {
                let applied =
                    timelock::finalize_upgrades(&mut self.state, &mut self.code, &admin, ctx.now);
                receipt
                    .events
                    .extend(applied.into_iter().map(|kind| VaultEvent::UpgradeApplied { kind }));
            }

            // Grant and message disagree: the access table no longer matches
            // a handler. Refuse rather than guess.
            (_, msg) => {
                return Err(VaultError::Unauthorized {
                    op: msg.opcode().map(Opcode::name).unwrap_or("none"),
                    sender: ctx.sender,
                });
            }
        }

        Ok(receipt)
    }
}

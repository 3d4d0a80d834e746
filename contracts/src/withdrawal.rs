//! # Withdrawal Protocol
//!
//! A withdrawal is a conversation, not a record:
//!
//! 1. **Request** — anyone sends `RequestWithdrawal`. The vault forwards a
//!    review notice to the keeper along with the requester's leftover value.
//!    Nothing is reserved; the request is purely advisory.
//! 2. **Decide** — the keeper, off-vault, decides.
//! 3. **Refuse** — `RefuseWithdrawal` sends the keeper's leftover value to
//!    the user. No tokens move.
//! 4. **Approve** — `ApproveWithdrawal` instructs the token account to pay
//!    the user. Fire-and-forget: if the token account can't honor it, the
//!    instruction bounces back (see [`crate::bounce`]).
//!
//! Every message pays its own way. The vault keeps a fixed processing
//! reserve and forwards the rest; its own balance never funds a reply.
//!
//! None of these handlers mutate [`VaultState`]. They only read it to find
//! out where messages go.

use vault_protocol::config::VaultConfig;
use vault_protocol::message::{OutboundBody, OutboundMessage};
use vault_protocol::{Address, Coins};

use crate::auth::KeeperCap;
use crate::error::VaultError;
use crate::state::VaultState;
use crate::vault::{MessageContext, VaultEvent};

/// The parameters shared by all three withdrawal messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WithdrawalTicket {
    /// Correlation id, echoed into every outbound message.
    pub query_id: u64,
    /// Token amount.
    pub amount: Coins,
    /// Who receives the tokens (or the refund).
    pub user: Address,
}

/// Result of a withdrawal step: what happened and what to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forward {
    /// Event to record on the receipt.
    pub event: VaultEvent,
    /// Message to hand to the transport.
    pub message: OutboundMessage,
}

/// Value left after the processing reserve, or `InsufficientValue`.
pub fn residual_value(attached: Coins, reserve: Coins) -> Result<Coins, VaultError> {
    attached
        .checked_sub(reserve)
        .ok_or(VaultError::InsufficientValue {
            required: reserve,
            attached,
        })
}

fn require_user(user: Address) -> Result<(), VaultError> {
    if user.is_hole() {
        return Err(VaultError::InvalidAddress("withdrawal user must not be the hole address"));
    }
    Ok(())
}

/// Forwards a withdrawal request to the keeper for review.
///
/// Open to any sender.
///
/// # Errors
///
/// - [`VaultError::InvalidAddress`] if `user` is the hole.
/// - [`VaultError::InsufficientValue`] if the attached value does not
///   cover the processing reserve.
pub fn request_withdrawal(
    state: &VaultState,
    config: &VaultConfig,
    ctx: &MessageContext,
    ticket: WithdrawalTicket,
) -> Result<Forward, VaultError> {
    require_user(ticket.user)?;
    let forwarded = residual_value(ctx.value, config.processing_reserve)?;

    Ok(Forward {
        event: VaultEvent::WithdrawalRequested {
            requester: ctx.sender,
            user: ticket.user,
            amount: ticket.amount,
            forwarded,
        },
        message: OutboundMessage {
            to: state.keeper,
            value: forwarded,
            bounce: false,
            body: OutboundBody::WithdrawalReview {
                query_id: ticket.query_id,
                amount: ticket.amount,
                user: ticket.user,
            },
        },
    })
}

/// Declines a withdrawal and returns the keeper's leftover value to the user.
///
/// # Errors
///
/// Same as [`request_withdrawal`].
pub fn refuse_withdrawal(
    _keeper: &KeeperCap,
    config: &VaultConfig,
    ctx: &MessageContext,
    ticket: WithdrawalTicket,
) -> Result<Forward, VaultError> {
    require_user(ticket.user)?;
    let refunded = residual_value(ctx.value, config.processing_reserve)?;

    Ok(Forward {
        event: VaultEvent::WithdrawalRefused {
            user: ticket.user,
            amount: ticket.amount,
            refunded,
        },
        message: OutboundMessage {
            to: ticket.user,
            value: refunded,
            bounce: false,
            body: OutboundBody::WithdrawalRefused {
                query_id: ticket.query_id,
                amount: ticket.amount,
            },
        },
    })
}

/// Instructs the token account to pay `ticket.amount` tokens to the user.
///
/// The leftover value goes to the token account; `forward_value` of it is
/// passed on to the user with the tokens. Whether the transfer succeeds is
/// not known here.
///
/// # Errors
///
/// - [`VaultError::InvalidAddress`] if `user` is the hole or no token
///   account has been configured yet.
/// - [`VaultError::InsufficientValue`] if the attached value does not
///   cover the reserve, the forward value, and the token account's gas.
pub fn approve_withdrawal(
    state: &VaultState,
    _keeper: &KeeperCap,
    config: &VaultConfig,
    ctx: &MessageContext,
    ticket: WithdrawalTicket,
    forward_value: Coins,
) -> Result<Forward, VaultError> {
    require_user(ticket.user)?;
    if state.token_account.is_hole() {
        return Err(VaultError::InvalidAddress("token account is not configured"));
    }

    let required = config
        .processing_reserve
        .checked_add(forward_value)
        .and_then(|v| v.checked_add(config.token_transfer_gas))
        .ok_or(VaultError::ArithmeticOverflow)?;
    if ctx.value < required {
        return Err(VaultError::InsufficientValue {
            required,
            attached: ctx.value,
        });
    }
    let value = residual_value(ctx.value, config.processing_reserve)?;

    Ok(Forward {
        event: VaultEvent::WithdrawalApproved {
            user: ticket.user,
            amount: ticket.amount,
            forward_value,
        },
        message: OutboundMessage {
            to: state.token_account,
            value,
            bounce: true,
            body: OutboundBody::TokenTransfer {
                query_id: ticket.query_id,
                amount: ticket.amount,
                destination: ticket.user,
                response_destination: ticket.user,
                forward_value,
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::require_keeper;
    use vault_protocol::config::COIN;
    use vault_protocol::message::Opcode;

    fn state() -> VaultState {
        VaultState::new(
            Address::from_seed("token-account"),
            Address::from_seed("admin"),
            Address::from_seed("keeper"),
        )
        .unwrap()
    }

    fn ticket() -> WithdrawalTicket {
        WithdrawalTicket {
            query_id: 11,
            amount: COIN,
            user: Address::from_seed("user"),
        }
    }

    #[test]
    fn residual_subtracts_reserve() {
        assert_eq!(residual_value(10, 3).unwrap(), 7);
        assert_eq!(residual_value(3, 3).unwrap(), 0);
        assert!(matches!(
            residual_value(2, 3),
            Err(VaultError::InsufficientValue {
                required: 3,
                attached: 2
            })
        ));
    }

    #[test]
    fn request_goes_to_keeper_with_leftover_value() {
        let s = state();
        let config = VaultConfig::default();
        let ctx = MessageContext::new(Address::from_seed("user"), COIN / 10, 0);
        let fwd = request_withdrawal(&s, &config, &ctx, ticket()).unwrap();
        assert_eq!(fwd.message.to, s.keeper);
        assert_eq!(fwd.message.value, COIN / 10 - config.processing_reserve);
        assert_eq!(fwd.message.body.query_id(), 11);
    }

    #[test]
    fn refuse_refunds_user() {
        let s = state();
        let config = VaultConfig::default();
        let ctx = MessageContext::new(s.keeper, COIN / 20, 0);
        let cap = require_keeper(&s, s.keeper, Opcode::RefuseWithdrawal).unwrap();
        let fwd = refuse_withdrawal(&cap, &config, &ctx, ticket()).unwrap();
        assert_eq!(fwd.message.to, ticket().user);
        assert!(!fwd.message.bounce);
    }

    #[test]
    fn approve_needs_room_for_forward_value() {
        let s = state();
        let config = VaultConfig::default();
        let cap = require_keeper(&s, s.keeper, Opcode::ApproveWithdrawal).unwrap();
        let forward_value = COIN / 100;
        let required = config.processing_reserve + forward_value + config.token_transfer_gas;

        let short = MessageContext::new(s.keeper, required - 1, 0);
        assert!(matches!(
            approve_withdrawal(&s, &cap, &config, &short, ticket(), forward_value),
            Err(VaultError::InsufficientValue { .. })
        ));

        let enough = MessageContext::new(s.keeper, required, 0);
        let fwd = approve_withdrawal(&s, &cap, &config, &enough, ticket(), forward_value).unwrap();
        assert_eq!(fwd.message.to, s.token_account);
        assert!(fwd.message.bounce);
        assert_eq!(fwd.message.value, required - config.processing_reserve);
    }

    #[test]
    fn approve_without_token_account_rejected() {
        let s = VaultState::new(
            Address::HOLE,
            Address::from_seed("admin"),
            Address::from_seed("keeper"),
        )
        .unwrap();
        let cap = require_keeper(&s, s.keeper, Opcode::ApproveWithdrawal).unwrap();
        let ctx = MessageContext::new(s.keeper, COIN, 0);
        assert!(matches!(
            approve_withdrawal(&s, &cap, &VaultConfig::default(), &ctx, ticket(), 0),
            Err(VaultError::InvalidAddress(_))
        ));
    }

    #[test]
    fn hole_user_rejected() {
        let s = state();
        let ctx = MessageContext::new(Address::from_seed("user"), COIN, 0);
        let t = WithdrawalTicket {
            user: Address::HOLE,
            ..ticket()
        };
        assert!(request_withdrawal(&s, &VaultConfig::default(), &ctx, t).is_err());
    }
}

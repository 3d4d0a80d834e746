//! # Bounce Handling
//!
//! When an outbound message can't be honored downstream (token account
//! short on balance, bad recipient, ...) the transport hands it back with
//! the bounce flag set. The vault's answer is always the same: record it
//! and move on.
//!
//! A bounce never changes state, never triggers a retry, and never fails.
//! Re-issuing a failed withdrawal is the keeper's call.

use tracing::warn;
use vault_protocol::message::{BouncedMessage, CodecError};

use crate::vault::{MessageContext, VaultEvent};

/// Absorbs a decoded bounce.
pub fn absorb(ctx: &MessageContext, bounced: &BouncedMessage) -> VaultEvent {
    if bounced.is_token_transfer() {
        warn!(
            from = %ctx.sender,
            query_id = bounced.query_id,
            amount = ?bounced.amount,
            returned_value = ctx.value,
            "token transfer bounced; withdrawal not executed"
        );
    } else {
        warn!(
            from = %ctx.sender,
            query_id = bounced.query_id,
            original_op = ?bounced.original_op.map(|op| format!("0x{op:08x}")),
            returned_value = ctx.value,
            "outbound message bounced"
        );
    }

    VaultEvent::TransferBounced {
        query_id: bounced.query_id,
        original_op: bounced.original_op,
        amount: bounced.amount,
    }
}

/// Absorbs a bounce whose body could not even be read.
pub fn absorb_unreadable(ctx: &MessageContext, err: &CodecError) -> VaultEvent {
    warn!(from = %ctx.sender, error = %err, "unreadable bounce absorbed");
    absorb(ctx, &BouncedMessage::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use vault_protocol::message::TOKEN_TRANSFER_OP;
    use vault_protocol::Address;

    #[test]
    fn transfer_bounce_keeps_correlation() {
        let ctx = MessageContext::new(Address::from_seed("token-account"), 1_000, 0).bounced();
        let event = absorb(
            &ctx,
            &BouncedMessage {
                original_op: Some(TOKEN_TRANSFER_OP),
                query_id: 5,
                amount: Some(42),
            },
        );
        assert_eq!(
            event,
            VaultEvent::TransferBounced {
                query_id: 5,
                original_op: Some(TOKEN_TRANSFER_OP),
                amount: Some(42)
            }
        );
    }

    #[test]
    fn unreadable_bounce_still_absorbed() {
        let ctx = MessageContext::new(Address::from_seed("x"), 0, 0).bounced();
        let event = absorb_unreadable(&ctx, &CodecError::BadBouncePrefix);
        assert!(matches!(
            event,
            VaultEvent::TransferBounced {
                original_op: None,
                ..
            }
        ));
    }
}

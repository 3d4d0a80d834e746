//! Messages the vault emits.
//!
//! The vault never waits for a reply. Each outbound message is handed to
//! the transport and forgotten; a failed token transfer comes back later
//! as a bounce.

use bytes::Bytes;

use super::codec::{BodyReader, BodyWriter, CodecError};
use super::opcode::{Opcode, TOKEN_TRANSFER_OP};
use crate::address::Address;
use crate::Coins;

/// An instruction or notification leaving the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Recipient.
    pub to: Address,
    /// Native value carried along.
    pub value: Coins,
    /// Whether the transport should return the value if delivery fails.
    pub bounce: bool,
    /// Body.
    pub body: OutboundBody,
}

impl OutboundMessage {
    /// Encodes the body for the transport.
    pub fn encode_body(&self) -> Bytes {
        self.body.encode()
    }
}

/// Outbound message bodies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundBody {
    /// Sent to the keeper: someone asked for `amount` tokens to go to `user`.
    WithdrawalReview {
        query_id: u64,
        amount: Coins,
        user: Address,
    },
    /// Sent to the user: the keeper declined the request.
    WithdrawalRefused { query_id: u64, amount: Coins },
    /// Sent to the token account: move `amount` tokens to `destination`.
    TokenTransfer {
        query_id: u64,
        amount: Coins,
        destination: Address,
        response_destination: Address,
        forward_value: Coins,
    },
}

impl OutboundBody {
    /// The 32-bit opcode this body is sent with.
    pub fn op(&self) -> u32 {
        match self {
            OutboundBody::WithdrawalReview { .. } => Opcode::RequestWithdrawal.code(),
            OutboundBody::WithdrawalRefused { .. } => Opcode::RefuseWithdrawal.code(),
            OutboundBody::TokenTransfer { .. } => TOKEN_TRANSFER_OP,
        }
    }

    /// Correlation id echoed from the inbound message.
    pub fn query_id(&self) -> u64 {
        match self {
            OutboundBody::WithdrawalReview { query_id, .. }
            | OutboundBody::WithdrawalRefused { query_id, .. }
            | OutboundBody::TokenTransfer { query_id, .. } => *query_id,
        }
    }

    pub fn encode(&self) -> Bytes {
        let w = BodyWriter::new(self.op(), self.query_id());
        match self {
            OutboundBody::WithdrawalReview { amount, user, .. } => {
                w.coins(*amount).address(user).finish()
            }
            OutboundBody::WithdrawalRefused { amount, .. } => w.coins(*amount).finish(),
            OutboundBody::TokenTransfer {
                amount,
                destination,
                response_destination,
                forward_value,
                ..
            } => w
                .coins(*amount)
                .address(destination)
                .address(response_destination)
                .coins(*forward_value)
                .finish(),
        }
    }

    /// Decodes a body previously produced by [`encode`](Self::encode).
    /// Counterparties (and the test sandbox) use this to read what the
    /// vault sent them.
    pub fn decode(body: &[u8]) -> Result<Self, CodecError> {
        let mut r = BodyReader::new(body);
        let op = r.u32("op")?;
        let query_id = r.u64("query_id")?;

        let msg = if op == TOKEN_TRANSFER_OP {
            OutboundBody::TokenTransfer {
                query_id,
                amount: r.coins("amount")?,
                destination: r.address("destination")?,
                response_destination: r.address("response_destination")?,
                forward_value: r.coins("forward_value")?,
            }
        } else {
            match Opcode::try_from(op)? {
                Opcode::RequestWithdrawal => OutboundBody::WithdrawalReview {
                    query_id,
                    amount: r.coins("amount")?,
                    user: r.address("user")?,
                },
                Opcode::RefuseWithdrawal => OutboundBody::WithdrawalRefused {
                    query_id,
                    amount: r.coins("amount")?,
                },
                _ => return Err(CodecError::UnknownOpcode(op)),
            }
        };

        r.finish()?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_transfer_uses_transfer_opcode() {
        let user = Address::from_seed("user");
        let body = OutboundBody::TokenTransfer {
            query_id: 3,
            amount: 1_000,
            destination: user,
            response_destination: user,
            forward_value: 10,
        };
        let encoded = body.encode();
        assert_eq!(&encoded[..4], &TOKEN_TRANSFER_OP.to_be_bytes());
        assert_eq!(OutboundBody::decode(&encoded).unwrap(), body);
    }

    #[test]
    fn review_reuses_request_opcode() {
        let body = OutboundBody::WithdrawalReview {
            query_id: 1,
            amount: 5,
            user: Address::from_seed("user"),
        };
        assert_eq!(body.op(), Opcode::RequestWithdrawal.code());
    }

    #[test]
    fn admin_opcodes_are_not_outbound_bodies() {
        let body = BodyWriter::new(Opcode::FinalizeUpgrades.code(), 0).finish();
        assert_eq!(
            OutboundBody::decode(&body),
            Err(CodecError::UnknownOpcode(Opcode::FinalizeUpgrades.code()))
        );
    }
}

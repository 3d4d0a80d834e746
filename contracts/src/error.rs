//! Error types for the vault state machine.
//!
//! Every rejected message maps to exactly one [`VaultError`]. A rejected
//! message never changes vault state; the transport returns whatever value
//! it carried to the sender.
//!
//! Two conditions are deliberately *not* errors:
//!
//! - A bounced transfer is absorbed and reported as
//!   [`VaultEvent::TransferBounced`](crate::vault::VaultEvent::TransferBounced).
//! - Cancelling or finalizing an idle slot is a silent no-op.

use thiserror::Error;
use vault_protocol::message::CodecError;
use vault_protocol::{Address, Coins, ConfigError};

/// Errors that reject an inbound message.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The sender is not in the operation's authorization class.
    #[error("unauthorized: {sender} may not call {op}")]
    Unauthorized {
        /// Operation name.
        op: &'static str,
        /// Who tried.
        sender: Address,
    },

    /// The attached value does not cover the processing reserve and
    /// whatever must be forwarded.
    #[error("insufficient value: required {required}, attached {attached}")]
    InsufficientValue {
        /// Minimum value the operation needs.
        required: Coins,
        /// Value that came with the message.
        attached: Coins,
    },

    /// An address argument is unusable (the hole, where a real account
    /// is required).
    #[error("invalid address: {0}")]
    InvalidAddress(&'static str),

    /// Replacement code is unusable (empty, like an idle slot's payload).
    #[error("invalid code: {0}")]
    InvalidCode(&'static str),

    /// A deadline or value computation overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,

    /// The body could not be decoded.
    #[error("malformed message: {0}")]
    Codec(#[from] CodecError),

    /// The vault was constructed with an invalid configuration.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted state could not be encoded or decoded.
    #[error("state serialization failed: {0}")]
    Serialization(String),
}

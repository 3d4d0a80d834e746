//! # Vault Messages
//!
//! Every interaction with the vault is a message: a sender, some attached
//! value, and an opcode-tagged body. This module defines what those bodies
//! contain and how they are laid out on the wire.
//!
//! - [`opcode`] — 32-bit operation tags and their authorization classes.
//! - [`codec`] — big-endian body reader/writer shared by all messages.
//! - [`inbound`] — what the vault accepts, including bounced transfers.
//! - [`outbound`] — what the vault emits to the keeper, users, and the
//!   token account.

pub mod codec;
pub mod inbound;
pub mod opcode;
pub mod outbound;

pub use codec::{BodyReader, BodyWriter, CodecError};
pub use inbound::{BouncedMessage, InboundMessage};
pub use opcode::{AccessClass, Opcode, BOUNCE_PREFIX, TOKEN_TRANSFER_OP};
pub use outbound::{OutboundBody, OutboundMessage};

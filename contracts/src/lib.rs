//! # Custody Vault Contracts
//!
//! The vault itself: a custodial holder of a single fungible token, run
//! by two roles.
//!
//! - **Admin** — governance. Pairs the vault with its token account and
//!   schedules timelocked replacements of the code, the admin, and the
//!   keeper.
//! - **Keeper** — operations. Approves or refuses withdrawal requests,
//!   which anyone may file.
//!
//! Modules:
//!
//! - [`vault`] — the state machine and message dispatch.
//! - [`withdrawal`] — request, refuse, and approve handlers.
//! - [`timelock`] — the three pending-upgrade slots.
//! - [`bounce`] — absorbing returned messages.
//! - [`auth`] — sender checks that mint capability tokens.
//! - [`state`] — persistent state and its serialization.
//! - [`sandbox`] — in-memory transport for exercising whole flows.
//!
//! ## Design Principles
//!
//! 1. Validate first, mutate last. A rejected message leaves no trace.
//! 2. All deadline and value arithmetic is checked.
//! 3. Every reply is funded by the value of the message that caused it.
//! 4. Bounces are absorbed, never retried, never fatal.

pub mod auth;
pub mod bounce;
pub mod error;
pub mod sandbox;
pub mod state;
pub mod timelock;
pub mod vault;
pub mod withdrawal;

pub use error::VaultError;
pub use sandbox::{Sandbox, SandboxError, TxRecord};
pub use state::{PendingSlot, PendingUpgrade, UpgradeKind, VaultState};
pub use vault::{MessageContext, Receipt, Vault, VaultEvent};

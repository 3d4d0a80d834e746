// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Custody Vault — Protocol Library
//!
//! Everything the vault and its counterparties need to agree on before a
//! single coin moves: who is who, what a message looks like on the wire,
//! and how long governance changes have to sit before they bite.
//!
//! ## Architecture
//!
//! - **address** — Account addresses and the all-zero "hole" placeholder.
//! - **code** — Opaque references to the vault's executable logic.
//! - **message** — Opcodes, typed inbound/outbound messages, binary codec.
//! - **config** — Timelock delays, value reserves, deposit policy.
//! - **logging** — `tracing` subscriber setup for hosts and tests.
//!
//! The state machine itself lives in the `vault-contracts` crate. This crate
//! deliberately knows nothing about it.

pub mod address;
pub mod code;
pub mod config;
pub mod logging;
pub mod message;

/// Native value and token amounts, in the smallest indivisible unit.
///
/// One whole coin is `1_000_000_000` units (see [`config::COIN`]).
pub type Coins = u64;

pub use address::{Address, AddressError};
pub use code::CodeCell;
pub use config::{ConfigError, DepositPolicy, VaultConfig};

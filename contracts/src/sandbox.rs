//! # Sandbox Transport
//!
//! An in-memory stand-in for the network the vault runs on. It exists so
//! that the full message flow (including refunds and bounces) can be
//! exercised in tests without a chain:
//!
//! - **Wallets** — named accounts with native balances.
//! - **Clock** — settable wall-clock time handed to the vault as `now`.
//! - **Delivery** — FIFO; every message a handler emits is delivered after
//!   the current one finishes, one at a time.
//! - **Refunds** — a rejected bounceable message returns its value, minus
//!   [`BOUNCE_FEE`], to the sender as a bounced message.
//! - **Token account** — [`MockTokenAccount`] custodies token balances and
//!   bounces any transfer it can't honor.
//!
//! Every delivery is recorded as a [`TxRecord`].

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;
use vault_protocol::config::VaultConfig;
use vault_protocol::message::{BouncedMessage, InboundMessage, OutboundBody};
use vault_protocol::{Address, CodeCell, Coins};

use crate::error::VaultError;
use crate::vault::{MessageContext, Vault};

/// Value the transport keeps when it returns a rejected message.
pub const BOUNCE_FEE: Coins = 1_000_000;

/// Value the mock token account keeps for executing a transfer.
pub const TOKEN_ACCOUNT_FEE: Coins = 5_000_000;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised by the sandbox itself (not by the vault's handlers, which
/// show up as aborted transactions instead).
#[derive(Debug, Error)]
pub enum SandboxError {
    /// A wallet tried to send more than it has.
    #[error("insufficient balance: {address} has {balance}, needs {required}")]
    InsufficientBalance {
        /// The sending wallet.
        address: Address,
        /// Its balance.
        balance: Coins,
        /// What it tried to send.
        required: Coins,
    },

    /// A holder tried to move more tokens than it has.
    #[error("insufficient tokens: {holder} has {balance}, needs {required}")]
    InsufficientTokens {
        /// The token holder.
        holder: Address,
        /// Its token balance.
        balance: Coins,
        /// What it tried to move.
        required: Coins,
    },

    /// The vault could not be deployed.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One delivered message.
#[derive(Debug, Clone)]
pub struct TxRecord {
    /// Unique id of this delivery.
    pub id: Uuid,
    /// Sender.
    pub from: Address,
    /// Recipient.
    pub to: Address,
    /// Value carried.
    pub value: Coins,
    /// First four body bytes (`0xffffffff` for bounces), if present.
    pub op: Option<u32>,
    /// The message was a returned (bounced) one.
    pub in_message_bounced: bool,
    /// The recipient accepted it.
    pub success: bool,
    /// The recipient rejected it.
    pub aborted: bool,
    /// Rejection reason.
    pub error: Option<String>,
    /// Delivery time.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct Envelope {
    from: Address,
    to: Address,
    value: Coins,
    bounce: bool,
    bounced: bool,
    body: Bytes,
}

impl Envelope {
    fn op(&self) -> Option<u32> {
        let head: [u8; 4] = self.body.get(..4)?.try_into().ok()?;
        Some(u32::from_be_bytes(head))
    }
}

// ---------------------------------------------------------------------------
// MockTokenAccount
// ---------------------------------------------------------------------------

/// A token account that holds balances for several holders and executes
/// transfers on its owner's instruction.
#[derive(Debug, Clone)]
pub struct MockTokenAccount {
    address: Address,
    owner: Address,
    balances: HashMap<Address, Coins>,
    frozen: bool,
}

impl MockTokenAccount {
    /// A token account at `address`, taking instructions from `owner`.
    pub fn new(address: Address, owner: Address) -> Self {
        Self {
            address,
            owner,
            balances: HashMap::new(),
            frozen: false,
        }
    }

    /// Its address.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Credits `amount` tokens to `holder` out of thin air.
    pub fn mint(&mut self, holder: Address, amount: Coins) {
        let balance = self.balances.entry(holder).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    /// Token balance of `holder`.
    pub fn balance_of(&self, holder: Address) -> Coins {
        self.balances.get(&holder).copied().unwrap_or(0)
    }

    /// While frozen every transfer is rejected.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    fn move_tokens(&mut self, from: Address, to: Address, amount: Coins) -> Result<(), SandboxError> {
        let balance = self.balance_of(from);
        if balance < amount {
            return Err(SandboxError::InsufficientTokens {
                holder: from,
                balance,
                required: amount,
            });
        }
        self.balances.insert(from, balance - amount);
        self.mint(to, amount);
        Ok(())
    }

    /// Executes a transfer instruction. On success returns the follow-up
    /// messages (notification to the recipient, excess to the response
    /// destination); on failure the caller bounces the instruction.
    fn execute(&mut self, env: &Envelope) -> Result<Vec<Envelope>, String> {
        let body = OutboundBody::decode(&env.body).map_err(|e| e.to_string())?;
        let op = body.op();
        let OutboundBody::TokenTransfer {
            query_id,
            amount,
            destination,
            response_destination,
            forward_value,
        } = body
        else {
            return Err(format!("unsupported op 0x{op:08x}"));
        };

        if env.from != self.owner {
            return Err(format!("{} is not the owner", env.from));
        }
        if self.frozen {
            return Err("token account frozen".into());
        }
        let required = forward_value.saturating_add(TOKEN_ACCOUNT_FEE);
        if env.value < required {
            return Err(format!("not enough value: {} < {}", env.value, required));
        }
        self.move_tokens(self.owner, destination, amount)
            .map_err(|e| e.to_string())?;

        let mut out = Vec::new();
        if forward_value > 0 {
            out.push(Envelope {
                from: self.address,
                to: destination,
                value: forward_value,
                bounce: false,
                bounced: false,
                body: InboundMessage::DepositNotify {
                    query_id,
                    amount,
                    depositor: self.owner,
                    forward_payload: Bytes::new(),
                }
                .encode(),
            });
        }
        let excess = env.value - required;
        if excess > 0 {
            out.push(Envelope {
                from: self.address,
                to: response_destination,
                value: excess,
                bounce: false,
                bounced: false,
                body: Bytes::new(),
            });
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Sandbox
// ---------------------------------------------------------------------------

/// A vault, its token account, and a set of wallets on a simulated network.
#[derive(Debug)]
pub struct Sandbox {
    now: DateTime<Utc>,
    vault_address: Address,
    vault: Vault,
    token_account: MockTokenAccount,
    balances: HashMap<Address, Coins>,
    trace: Vec<TxRecord>,
}

impl Sandbox {
    /// Deploys a vault the way it is deployed for real: unpaired (token
    /// account = hole), with the given admin and keeper. The mock token
    /// account exists already; pair it with [`Sandbox::pair_token_account`].
    pub fn deploy(
        config: VaultConfig,
        admin: Address,
        keeper: Address,
        now: DateTime<Utc>,
    ) -> Result<Self, SandboxError> {
        let vault_address = Address::from_seed("vault");
        let vault = Vault::new(config, Address::HOLE, admin, keeper, CodeCell::new(b"vault-v1".to_vec()))?;
        let token_account = MockTokenAccount::new(Address::from_seed("vault-token-account"), vault_address);

        Ok(Self {
            now,
            vault_address,
            vault,
            token_account,
            balances: HashMap::new(),
            trace: Vec::new(),
        })
    }

    /// Creates (or tops up) a wallet derived from `seed`.
    pub fn wallet(&mut self, seed: &str, balance: Coins) -> Address {
        let address = Address::from_seed(seed);
        self.credit(address, balance);
        address
    }

    fn credit(&mut self, address: Address, value: Coins) {
        let balance = self.balances.entry(address).or_insert(0);
        *balance = balance.saturating_add(value);
    }

    fn debit(&mut self, address: Address, value: Coins) -> Result<(), SandboxError> {
        let balance = self.balance(address);
        if balance < value {
            return Err(SandboxError::InsufficientBalance {
                address,
                balance,
                required: value,
            });
        }
        self.balances.insert(address, balance - value);
        Ok(())
    }

    /// Native balance of any account, the vault included.
    pub fn balance(&self, address: Address) -> Coins {
        self.balances.get(&address).copied().unwrap_or(0)
    }

    /// Current time.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    /// Sets the clock.
    pub fn set_now(&mut self, now: DateTime<Utc>) {
        self.now = now;
    }

    /// Moves the clock forward.
    pub fn advance(&mut self, by: Duration) {
        self.now += by;
    }

    fn now_secs(&self) -> u64 {
        u64::try_from(self.now.timestamp()).unwrap_or(0)
    }

    /// The vault under test.
    pub fn vault(&self) -> &Vault {
        &self.vault
    }

    /// The vault's address.
    pub fn vault_address(&self) -> Address {
        self.vault_address
    }

    /// The mock token account.
    pub fn token_account(&self) -> &MockTokenAccount {
        &self.token_account
    }

    /// Mutable access to the mock token account (minting, freezing).
    pub fn token_account_mut(&mut self) -> &mut MockTokenAccount {
        &mut self.token_account
    }

    /// Every delivery so far.
    pub fn trace(&self) -> &[TxRecord] {
        &self.trace
    }

    /// Sends `msg` from wallet `from` to the vault and runs delivery until
    /// the network is quiet. Returns the deliveries this caused.
    pub fn send(
        &mut self,
        from: Address,
        value: Coins,
        msg: &InboundMessage,
    ) -> Result<Vec<TxRecord>, SandboxError> {
        self.send_raw(from, self.vault_address, value, msg.encode())
    }

    /// Sends an arbitrary body to an arbitrary address.
    pub fn send_raw(
        &mut self,
        from: Address,
        to: Address,
        value: Coins,
        body: Bytes,
    ) -> Result<Vec<TxRecord>, SandboxError> {
        self.debit(from, value)?;
        Ok(self.run(Envelope {
            from,
            to,
            value,
            bounce: true,
            bounced: false,
            body,
        }))
    }

    /// Pairs the vault with the mock token account (admin-signed).
    pub fn pair_token_account(&mut self, value: Coins) -> Result<Vec<TxRecord>, SandboxError> {
        let admin = self.vault.state().admin;
        let msg = InboundMessage::SetTokenAccount {
            query_id: 0,
            token_account: self.token_account.address(),
        };
        self.send(admin, value, &msg)
    }

    /// `depositor` moves `amount` of its tokens into the vault's custody;
    /// the token account notifies the vault, attaching `value` paid by the
    /// depositor.
    pub fn deposit_tokens(
        &mut self,
        depositor: Address,
        amount: Coins,
        value: Coins,
    ) -> Result<Vec<TxRecord>, SandboxError> {
        self.debit(depositor, value)?;
        self.token_account
            .move_tokens(depositor, self.vault_address, amount)?;
        let notify = InboundMessage::DepositNotify {
            query_id: 0,
            amount,
            depositor,
            forward_payload: Bytes::new(),
        };
        Ok(self.run(Envelope {
            from: self.token_account.address(),
            to: self.vault_address,
            value,
            bounce: false,
            bounced: false,
            body: notify.encode(),
        }))
    }

    fn run(&mut self, first: Envelope) -> Vec<TxRecord> {
        let mut queue = VecDeque::from([first]);
        let mut records = Vec::new();

        while let Some(env) = queue.pop_front() {
            let outcome = if env.to == self.vault_address {
                self.deliver_to_vault(&env)
            } else if env.to == self.token_account.address() {
                self.deliver_to_token_account(&env)
            } else {
                self.credit(env.to, env.value);
                Ok(Vec::new())
            };

            let record = match outcome {
                Ok(follow_ups) => {
                    queue.extend(follow_ups);
                    self.record(&env, None)
                }
                Err(reason) => {
                    if let Some(refund) = self.refund(&env) {
                        queue.push_back(refund);
                    }
                    self.record(&env, Some(reason))
                }
            };
            records.push(record);
        }

        self.trace.extend(records.iter().cloned());
        records
    }

    fn deliver_to_vault(&mut self, env: &Envelope) -> Result<Vec<Envelope>, String> {
        let mut ctx = MessageContext::new(env.from, env.value, self.now_secs());
        if env.bounced {
            ctx = ctx.bounced();
        }
        let receipt = self.vault.receive(&ctx, &env.body).map_err(|e| e.to_string())?;

        self.credit(self.vault_address, env.value);
        let mut out = Vec::with_capacity(receipt.outbound.len());
        for msg in &receipt.outbound {
            // Handlers never forward more than they were given, so this
            // cannot dip into the vault's own balance.
            let vault_balance = self.balance(self.vault_address);
            self.balances
                .insert(self.vault_address, vault_balance.saturating_sub(msg.value));
            out.push(Envelope {
                from: self.vault_address,
                to: msg.to,
                value: msg.value,
                bounce: msg.bounce,
                bounced: false,
                body: msg.encode_body(),
            });
        }
        Ok(out)
    }

    fn deliver_to_token_account(&mut self, env: &Envelope) -> Result<Vec<Envelope>, String> {
        let out = self.token_account.execute(env)?;
        let forwarded: Coins = out.iter().map(|e| e.value).sum();
        self.credit(self.token_account.address(), env.value.saturating_sub(forwarded));
        Ok(out)
    }

    fn refund(&self, env: &Envelope) -> Option<Envelope> {
        if !env.bounce || env.bounced {
            return None;
        }
        let value = env.value.saturating_sub(BOUNCE_FEE);
        if value == 0 {
            return None;
        }
        debug!(to = %env.from, value, "returning rejected message");
        Some(Envelope {
            from: env.to,
            to: env.from,
            value,
            bounce: false,
            bounced: true,
            body: BouncedMessage::wrap(&env.body),
        })
    }

    fn record(&self, env: &Envelope, error: Option<String>) -> TxRecord {
        TxRecord {
            id: Uuid::new_v4(),
            from: env.from,
            to: env.to,
            value: env.value,
            op: env.op(),
            in_message_bounced: env.bounced,
            success: error.is_none(),
            aborted: error.is_some(),
            error,
            at: self.now,
        }
    }
}

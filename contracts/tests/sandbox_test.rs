//! End-to-end tests on the sandbox transport.
//!
//! Whole message chains: value forwarding, transport refunds of rejected
//! messages, token transfers through the mock token account, and bounces
//! coming back to the vault.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use vault_contracts::sandbox::{BOUNCE_FEE, TOKEN_ACCOUNT_FEE};
use vault_contracts::{Sandbox, TxRecord};
use vault_protocol::config::{VaultConfig, COIN, PROCESSING_RESERVE};
use vault_protocol::message::{InboundMessage, Opcode, BOUNCE_PREFIX, TOKEN_TRANSFER_OP};
use vault_protocol::Address;

struct World {
    sb: Sandbox,
    admin: Address,
    keeper: Address,
    user: Address,
}

fn start() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

/// Helper: a deployed and paired vault with funded admin, keeper, and user.
fn world() -> World {
    vault_protocol::logging::init_test_logging();
    let mut sb = Sandbox::deploy(
        VaultConfig::default(),
        Address::from_seed("admin"),
        Address::from_seed("keeper"),
        start(),
    )
    .unwrap();
    let admin = sb.wallet("admin", 100 * COIN);
    let keeper = sb.wallet("keeper", 100 * COIN);
    let user = sb.wallet("user", 100 * COIN);
    let records = sb.pair_token_account(COIN / 10).unwrap();
    assert!(records[0].success);
    World {
        sb,
        admin,
        keeper,
        user,
    }
}

fn ok(records: &[TxRecord]) -> bool {
    records.iter().all(|r| r.success)
}

// ---------------------------------------------------------------------------
// Withdrawal Flows
// ---------------------------------------------------------------------------

#[test]
fn request_forwards_value_to_keeper() {
    let mut w = world();
    let keeper_before = w.sb.balance(w.keeper);

    let records = w
        .sb
        .send(
            w.user,
            COIN,
            &InboundMessage::RequestWithdrawal {
                query_id: 1,
                amount: 300,
                user: w.user,
            },
        )
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(ok(&records));
    assert_eq!(records[1].from, w.sb.vault_address());
    assert_eq!(records[1].to, w.keeper);
    assert_eq!(records[1].op, Some(Opcode::RequestWithdrawal.code()));
    assert_eq!(w.sb.balance(w.keeper), keeper_before + COIN - PROCESSING_RESERVE);
}

#[test]
fn refuse_from_stranger_is_refunded_by_transport() {
    let mut w = world();
    let before = w.sb.balance(w.user);
    let vault_data = w.sb.vault().vault_data();

    let records = w
        .sb
        .send(
            w.user,
            COIN,
            &InboundMessage::RefuseWithdrawal {
                query_id: 2,
                amount: 300,
                user: w.user,
            },
        )
        .unwrap();

    assert_eq!(records.len(), 2);
    assert!(records[0].aborted);
    assert!(records[0].error.as_deref().unwrap().contains("unauthorized"));
    assert!(records[1].in_message_bounced);
    assert_eq!(records[1].to, w.user);
    assert_eq!(records[1].op, Some(BOUNCE_PREFIX));
    assert_eq!(w.sb.balance(w.user), before - BOUNCE_FEE);
    assert_eq!(w.sb.vault().vault_data(), vault_data);
}

#[test]
fn refuse_from_keeper_returns_value_to_user() {
    let mut w = world();
    let before = w.sb.balance(w.user);

    let records = w
        .sb
        .send(
            w.keeper,
            COIN,
            &InboundMessage::RefuseWithdrawal {
                query_id: 2,
                amount: 300,
                user: w.user,
            },
        )
        .unwrap();

    assert!(ok(&records));
    assert_eq!(w.sb.balance(w.user), before + COIN - PROCESSING_RESERVE);
}

#[test]
fn approved_withdrawal_moves_tokens() {
    let mut w = world();
    let vault = w.sb.vault_address();
    w.sb.token_account_mut().mint(vault, 1_000);
    let before = w.sb.balance(w.user);

    let records = w
        .sb
        .send(
            w.keeper,
            COIN,
            &InboundMessage::ApproveWithdrawal {
                query_id: 3,
                amount: 400,
                user: w.user,
                forward_value: COIN / 10,
            },
        )
        .unwrap();

    assert!(ok(&records));
    assert_eq!(records[1].op, Some(TOKEN_TRANSFER_OP));
    assert_eq!(w.sb.token_account().balance_of(vault), 600);
    assert_eq!(w.sb.token_account().balance_of(w.user), 400);
    // Forward value plus the excess both land with the user.
    assert_eq!(
        w.sb.balance(w.user),
        before + COIN - PROCESSING_RESERVE - TOKEN_ACCOUNT_FEE
    );
}

#[test]
fn rejected_transfer_bounces_back_and_vault_keeps_working() {
    let mut w = world();
    let vault = w.sb.vault_address();

    let records = w
        .sb
        .send(
            w.keeper,
            COIN,
            &InboundMessage::ApproveWithdrawal {
                query_id: 4,
                amount: 400,
                user: w.user,
                forward_value: 0,
            },
        )
        .unwrap();

    assert_eq!(records.len(), 3);
    assert!(records[0].success);
    assert!(records[1].aborted);
    assert_eq!(records[1].to, w.sb.token_account().address());
    assert!(records[2].in_message_bounced);
    assert_eq!(records[2].to, vault);
    assert!(records[2].success);
    assert_eq!(w.sb.token_account().balance_of(w.user), 0);

    // Still answering queries and still processing messages.
    let data = w.sb.vault().vault_data();
    assert_eq!(data.keeper, w.keeper);
    let records = w
        .sb
        .send(
            w.user,
            COIN,
            &InboundMessage::RequestWithdrawal {
                query_id: 5,
                amount: 1,
                user: w.user,
            },
        )
        .unwrap();
    assert!(ok(&records));
}

#[test]
fn frozen_token_account_bounces_transfer() {
    let mut w = world();
    let vault = w.sb.vault_address();
    w.sb.token_account_mut().mint(vault, 1_000);
    w.sb.token_account_mut().set_frozen(true);

    let records = w
        .sb
        .send(
            w.keeper,
            COIN,
            &InboundMessage::ApproveWithdrawal {
                query_id: 6,
                amount: 10,
                user: w.user,
                forward_value: 0,
            },
        )
        .unwrap();

    assert!(records[1].aborted);
    assert!(records[2].in_message_bounced && records[2].success);
    assert_eq!(w.sb.token_account().balance_of(vault), 1_000);
}

// ---------------------------------------------------------------------------
// Deposits
// ---------------------------------------------------------------------------

#[test]
fn deposit_through_token_account() {
    let mut w = world();
    let vault = w.sb.vault_address();
    w.sb.token_account_mut().mint(w.user, 500);

    let records = w.sb.deposit_tokens(w.user, 200, COIN / 10).unwrap();
    assert!(ok(&records));
    assert_eq!(records[0].from, w.sb.token_account().address());
    assert_eq!(records[0].op, Some(Opcode::DepositNotify.code()));
    assert_eq!(w.sb.token_account().balance_of(vault), 200);
    assert_eq!(w.sb.token_account().balance_of(w.user), 300);
}

#[test]
fn deposit_notification_from_stranger_rejected() {
    let mut w = world();
    let forged = InboundMessage::DepositNotify {
        query_id: 0,
        amount: 1_000_000,
        depositor: w.user,
        forward_payload: Bytes::new(),
    };
    let records = w.sb.send(w.user, COIN, &forged).unwrap();
    assert!(records[0].aborted);
    assert!(records[1].in_message_bounced);
}

// ---------------------------------------------------------------------------
// Governance & Transport
// ---------------------------------------------------------------------------

#[test]
fn admin_rotation_across_the_clock() {
    let mut w = world();
    let b = w.sb.wallet("admin-b", 10 * COIN);

    w.sb
        .send(w.admin, COIN, &InboundMessage::InitAdminUpgrade { query_id: 0, admin: b })
        .unwrap();

    w.sb.advance(Duration::days(2) - Duration::seconds(1));
    w.sb
        .send(w.admin, COIN, &InboundMessage::FinalizeUpgrades { query_id: 0 })
        .unwrap();
    assert_eq!(w.sb.vault().state().admin, w.admin);

    w.sb.advance(Duration::seconds(1));
    w.sb
        .send(w.admin, COIN, &InboundMessage::FinalizeUpgrades { query_id: 0 })
        .unwrap();
    assert_eq!(w.sb.vault().state().admin, b);
}

#[test]
fn top_up_stays_in_vault() {
    let mut w = world();
    let vault = w.sb.vault_address();
    let before = w.sb.balance(vault);
    let records = w.sb.send_raw(w.user, vault, COIN, Bytes::new()).unwrap();
    assert!(ok(&records));
    assert_eq!(w.sb.balance(vault), before + COIN);
}

#[test]
fn garbage_body_is_refunded() {
    let mut w = world();
    let vault = w.sb.vault_address();
    let records = w
        .sb
        .send_raw(w.user, vault, COIN, Bytes::from_static(&[0xde, 0xad, 0xbe, 0xef, 0, 0, 0, 0, 0, 0, 0, 1]))
        .unwrap();
    assert!(records[0].aborted);
    assert_eq!(records[1].value, COIN - BOUNCE_FEE);
}

#[test]
fn trace_accumulates_unique_records() {
    let mut w = world();
    w.sb
        .send(
            w.user,
            COIN,
            &InboundMessage::RequestWithdrawal {
                query_id: 1,
                amount: 1,
                user: w.user,
            },
        )
        .unwrap();
    let trace = w.sb.trace();
    // Pairing plus request plus review notice.
    assert_eq!(trace.len(), 3);
    let mut ids: Vec<_> = trace.iter().map(|r| r.id).collect();
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 3);
    assert!(trace.iter().all(|r| r.at >= start()));
}

//! Integration tests for the vault wire format and config loading.
//!
//! These pin the byte layout that already-deployed clients produce, and
//! check that a config file on disk ends up as a validated `VaultConfig`.

use std::io::Write;

use vault_protocol::config::{DepositPolicy, VaultConfig, CODE_UPGRADE_DELAY_SECS};
use vault_protocol::message::{
    BodyWriter, BouncedMessage, CodecError, InboundMessage, Opcode, OutboundBody,
};
use vault_protocol::{Address, CodeCell};

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

#[test]
fn client_built_request_decodes() {
    let user = Address::from_seed("alice");
    // Built field by field, the way a client library would.
    let body = BodyWriter::new(0x25d4_fcff, 42)
        .coins(1_000_000_000)
        .address(&user)
        .finish();

    let msg = InboundMessage::decode(&body, false).unwrap();
    assert_eq!(
        msg,
        InboundMessage::RequestWithdrawal {
            query_id: 42,
            amount: 1_000_000_000,
            user,
        }
    );
    assert_eq!(msg.opcode(), Some(Opcode::RequestWithdrawal));
}

#[test]
fn admin_messages_survive_encoding() {
    let messages = [
        InboundMessage::SetTokenAccount {
            query_id: 1,
            token_account: Address::from_seed("token-account"),
        },
        InboundMessage::InitCodeUpgrade {
            query_id: 2,
            code: CodeCell::new(vec![0xde, 0xad, 0xbe, 0xef]),
        },
        InboundMessage::InitAdminUpgrade {
            query_id: 3,
            admin: Address::from_seed("new-admin"),
        },
        InboundMessage::InitKeeperUpgrade {
            query_id: 4,
            keeper: Address::from_seed("new-keeper"),
        },
        InboundMessage::CancelCodeUpgrade { query_id: 5 },
        InboundMessage::CancelAdminUpgrade { query_id: 6 },
        InboundMessage::CancelKeeperUpgrade { query_id: 7 },
        InboundMessage::FinalizeUpgrades { query_id: 8 },
    ];

    for msg in messages {
        let decoded = InboundMessage::decode(&msg.encode(), false).unwrap();
        assert_eq!(decoded, msg);
    }
}

#[test]
fn header_only_message_rejects_trailing_garbage() {
    let body = BodyWriter::new(Opcode::FinalizeUpgrades.code(), 0)
        .u32(0xabad_1dea)
        .finish();
    assert_eq!(
        InboundMessage::decode(&body, false),
        Err(CodecError::TrailingBytes(4))
    );
}

#[test]
fn oversized_code_rejected() {
    let code = CodeCell::new(vec![0u8; 64 * 1024 + 1]);
    let body = InboundMessage::InitCodeUpgrade { query_id: 0, code }.encode();
    assert!(matches!(
        InboundMessage::decode(&body, false),
        Err(CodecError::PayloadTooLarge { .. })
    ));
}

#[test]
fn bounced_transfer_keeps_correlation() {
    let user = Address::from_seed("bob");
    let transfer = OutboundBody::TokenTransfer {
        query_id: 1_234,
        amount: 7_000,
        destination: user,
        response_destination: user,
        forward_value: 10_000_000,
    };
    let bounced = BouncedMessage::wrap(&transfer.encode());

    match InboundMessage::decode(&bounced, true).unwrap() {
        InboundMessage::Bounced(b) => {
            assert!(b.is_token_transfer());
            assert_eq!(b.query_id, 1_234);
            assert_eq!(b.amount, Some(7_000));
        }
        other => panic!("expected bounce, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Config Files
// ---------------------------------------------------------------------------

#[test]
fn config_loads_from_disk() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "admin_upgrade_delay_secs": 3600, "keeper_upgrade_delay_secs": 3600, "deposit_policy": "open" }}"#
    )
    .unwrap();

    let config = VaultConfig::load(file.path()).unwrap();
    assert_eq!(config.admin_upgrade_delay_secs, 3600);
    assert_eq!(config.code_upgrade_delay_secs, CODE_UPGRADE_DELAY_SECS);
    assert_eq!(config.deposit_policy, DepositPolicy::Open);
}

#[test]
fn missing_config_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = VaultConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(err.to_string().starts_with("failed to read config"));
}

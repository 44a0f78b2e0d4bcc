mod common;

use autotrust::autotrust::file;
use autotrust::autotrust::{KeyState, TrustAnchorStore};
use autotrust::dns::{Name, TextRecordParser};
use autotrust::dnssec::RingVerifier;
use autotrust::dnssec::constants::ROOT_KSK_KEY_TAG;
use autotrust::{AutotrustConfig, AutotrustError};
use common::{T0, TestKey, anchor_line};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

const ROOT_KSK: &str = ".\t172800\tIN\tDNSKEY\t257 3 8 AwEAAaz/tAm8yTn4Mfeh5eyI96WSVexTBAvkMgJzkKTOiW1vkIbzxeF3+/4RgWOq7HrxRixHlFlExOLAJr5emLvN7SWXgnLh4+B5xQlNVz8Og8kvArMtNROxVQuCaSnIDdD5LKyWbRd2n9WGe2R8PzgCmr3EgVLrjyBxWezF0jLHwVN8efS3rCj/EWgvIWgb9tarpVUDK/b58Da+sqqls3eNbuv7pr+eoZG+SrDK6nWeL3c6H5Apxz7LjVc1uTIdsIXxuOLYA4/ilBmSVIzuDWfdRUfhHdY6+cn8HFRm+2hM8AnXGXws9555KrUB5qihylGa8subX2Nn6UwNR1AkUTV74bU=";

fn store() -> TrustAnchorStore {
    TrustAnchorStore::new(AutotrustConfig::default(), Arc::new(RingVerifier::new()))
}

#[test]
fn test_state_comment_parsed() {
    let parser = TextRecordParser::new();
    let line = format!("{} ;state=2 count=0 lastchange=1000000000", ROOT_KSK);
    let entry = file::parse_line(&line, T0, &parser).unwrap().unwrap();

    assert_eq!(entry.state, KeyState::Valid);
    assert_eq!(entry.pending_count, 0);
    assert_eq!(entry.last_change, 1_000_000_000);
    assert_eq!(entry.key_tag(), ROOT_KSK_KEY_TAG);
}

#[test]
fn test_plain_record_defaults() {
    let parser = TextRecordParser::new();
    let entry = file::parse_line(ROOT_KSK, T0, &parser).unwrap().unwrap();

    assert_eq!(entry.state, KeyState::Valid);
    assert_eq!(entry.pending_count, 0);
    assert_eq!(entry.last_change, T0);
}

#[test]
fn test_undefined_state_is_start() {
    let parser = TextRecordParser::new();
    let line = format!("{} ;state=9", ROOT_KSK);
    let entry = file::parse_line(&line, T0, &parser).unwrap().unwrap();
    assert_eq!(entry.state, KeyState::Start);
}

#[test]
fn test_ds_anchor_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("root.ds");
    fs::write(
        &path,
        "; root trust anchor\n\
         . IN DS 20326 8 2 E06D44B80B8F1D39A95C0B0D7C65D08458E880409BBC683457104237C7F8EC8D\n",
    )
    .unwrap();

    let store = store();
    let point = store.load_file(&path, T0).unwrap();
    assert!(point.name().is_root());

    let data = point.lock();
    assert_eq!(data.keys.len(), 1);
    assert_eq!(data.valid, 1);
    assert!(data.ds_set.is_some());
    assert!(data.dnskey_set.is_none());
    // No next_probe_time header: probe right away
    assert_eq!(data.next_probe_time, T0);
}

#[test]
fn test_malformed_line_skipped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("root.key");
    fs::write(
        &path,
        format!("{}\n. IN DNSKEY 257 3 8 !!!not-base64!!!\n. IN DS 1 8\n", ROOT_KSK),
    )
    .unwrap();

    let point = store().load_file(&path, T0).unwrap();
    assert_eq!(point.lock().keys.len(), 1);
}

#[test]
fn test_token_without_value_skips_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("root.key");
    let other = TestKey::ksk();
    fs::write(
        &path,
        format!(
            "{}\n{}\n",
            anchor_line(&other.rr(&Name::root()), "state=1 count="),
            ROOT_KSK
        ),
    )
    .unwrap();

    let point = store().load_file(&path, T0).unwrap();
    let data = point.lock();
    assert_eq!(data.keys.len(), 1);
    assert_eq!(data.keys[0].key_tag(), ROOT_KSK_KEY_TAG);
}

#[test]
fn test_zone_mismatch_registers_nothing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("mixed.key");
    let key = TestKey::ksk();
    let other: Name = "example.".parse().unwrap();
    fs::write(
        &path,
        format!("{}\n{}\n", ROOT_KSK, anchor_line(&key.rr(&other), "state=2")),
    )
    .unwrap();

    let store = store();
    let err = store.load_file(&path, T0).unwrap_err();
    assert!(matches!(err, AutotrustError::ZoneMismatch { .. }));
    assert!(store.is_empty());
    assert!(store.is_consistent());
}

#[test]
fn test_empty_file_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.key");
    fs::write(&path, "; nothing here\n\n").unwrap();

    let err = store().load_file(&path, T0).unwrap_err();
    assert!(matches!(err, AutotrustError::EmptyAnchorFile(_)));
}

#[test]
fn test_save_and_reload_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("example.key");
    let zone: Name = "example.".parse().unwrap();
    let valid = TestKey::ksk();
    let pending = TestKey::ksk();
    let missing = TestKey::ksk();
    fs::write(
        &path,
        format!(
            "{}\n{}\n{}\n",
            anchor_line(&valid.rr(&zone), "state=2 count=0 lastchange=1600000000"),
            anchor_line(&pending.rr(&zone), "state=1 count=7 lastchange=1650000000"),
            anchor_line(&missing.rr(&zone), "state=3 count=0 lastchange=1690000000"),
        ),
    )
    .unwrap();

    let point = store().load_file(&path, T0).unwrap();
    {
        let mut data = point.lock();
        data.next_probe_time = T0 + 1234;
        data.query_failed = 2;
        data.retry_time = 7200;
    }
    file::save(&point).unwrap();
    assert!(!path.with_extension("key.tmp").exists());

    let reloaded = store().load_file(&path, T0 + 99).unwrap();
    let before = point.lock().clone();
    let after = reloaded.lock().clone();

    assert_eq!(after.keys, before.keys);
    assert_eq!(after.next_probe_time, T0 + 1234);
    assert_eq!(after.query_failed, 2);
    assert_eq!(after.retry_time, 7200);
    assert_eq!(after.valid, 1);
    assert_eq!(after.missing, 1);
    assert_eq!(after.keys[1].pending_count, 7);
}

#[test]
fn test_second_file_merges_into_trust_point() {
    let dir = tempdir().unwrap();
    let zone: Name = "example.".parse().unwrap();
    let a = TestKey::ksk();
    let b = TestKey::ksk();
    let first = dir.path().join("a.key");
    let second = dir.path().join("b.key");
    fs::write(&first, anchor_line(&a.rr(&zone), "state=2")).unwrap();
    fs::write(&second, anchor_line(&b.rr(&zone), "state=2")).unwrap();

    let store = store();
    let p1 = store.load_file(&first, T0).unwrap();
    let p2 = store.load_file(&second, T0).unwrap();
    assert_eq!(p1.id(), p2.id());
    assert_eq!(store.len(), 1);
    assert_eq!(p1.lock().valid, 2);
}

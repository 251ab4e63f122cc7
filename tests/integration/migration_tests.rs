// ===================================
// tests/integration/migration_tests.rs
// ===================================
//! Batch credential migration over a populated store
use std::collections::HashSet;

use backend_lib::auth::{Credential, CredentialManager, CredentialStatus, EncodedHash, VerificationOutcome};
use backend_lib::storage::UserStore;
use crate::test_utils::{imported_record, setup_with_records, test_settings};

const ZERO_DIGEST: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";

#[tokio::test]
async fn test_mixed_batch_reports_each_class() {
    let mut records: Vec<_> = (0..7)
        .map(|i| {
            imported_record(
                &format!("user{i}@x.com"),
                &format!("user{i}"),
                Credential::Legacy(format!("legacy-pass-{i}")),
            )
        })
        .collect();
    let malformed = [
        Credential::Hashed(EncodedHash::new("$argon2id$v=19$m=64")),
        Credential::Hashed(EncodedHash::new("$$$")),
        Credential::Legacy(String::new()),
    ];
    for (i, credential) in malformed.into_iter().enumerate() {
        records.push(imported_record(
            &format!("broken{i}@x.com"),
            &format!("broken{i}"),
            credential,
        ));
    }
    let broken_ids: HashSet<_> = records[7..].iter().map(|r| r.id).collect();
    let (state, _) = setup_with_records(records);
    let accounts = &state.accounts;

    let summary = accounts.migrate_all().await.unwrap();
    assert_eq!(summary.total, 10);
    assert_eq!(summary.rehashed, 7);
    assert_eq!(summary.already_current, 0);
    assert!(summary.failed.is_empty());
    assert_eq!(summary.reset_required.iter().copied().collect::<HashSet<_>>(), broken_ids);

    for i in 0..7 {
        let record = accounts
            .store()
            .find_by_email(&format!("user{i}@x.com"))
            .await
            .unwrap()
            .unwrap();
        assert!(record.credential.is_hashed());
        assert_eq!(
            accounts.credentials().verify(&record.credential, &format!("legacy-pass-{i}")),
            VerificationOutcome::Match
        );
    }

    // unrecoverable values are left for a reset, not wrapped in a hash
    for id in &broken_ids {
        let record = accounts.store().get(*id).await.unwrap().unwrap();
        assert_eq!(record.version, 1);
    }
}

#[tokio::test]
async fn test_migration_is_idempotent() {
    let records = vec![
        imported_record("a@x.com", "alice", Credential::Legacy("hunter2".into())),
        imported_record("b@x.com", "bob", Credential::Legacy("letmein".into())),
    ];
    let (state, _) = setup_with_records(records);

    let first = state.accounts.migrate_all().await.unwrap();
    assert_eq!(first.rehashed, 2);

    let second = state.accounts.migrate_all().await.unwrap();
    assert_eq!(second.rehashed, 0);
    assert_eq!(second.already_current, 2);
}

#[tokio::test]
async fn test_outdated_hashes_wait_for_login() {
    let mut weaker = test_settings();
    weaker.hashing.memory_kib = 32;
    let old_manager = CredentialManager::new(&weaker.hashing).unwrap();
    let old_hash = old_manager.hash("Secret123").unwrap();

    let scrypt = Credential::Hashed(EncodedHash::new(format!(
        "$scrypt$ln=4,r=8,p=1$c2FsdHNhbHQ${ZERO_DIGEST}"
    )));

    let records = vec![
        imported_record("a@x.com", "alice", old_hash.clone()),
        imported_record("s@x.com", "scrypt", scrypt),
    ];
    let (state, _) = setup_with_records(records);
    let accounts = &state.accounts;

    let summary = accounts.migrate_all().await.unwrap();
    assert_eq!(summary.pending_upgrade, 2);
    assert_eq!(summary.rehashed, 0);

    let alice = accounts.store().find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(alice.credential, old_hash);
    assert_eq!(accounts.credentials().inspect(&alice.credential), CredentialStatus::Outdated);

    accounts
        .authenticate(usermgmt_common::AuthenticateRequest {
            email: "a@x.com".into(),
            password: "Secret123".into(),
        })
        .await
        .unwrap();
    let alice = accounts.store().find_by_email("a@x.com").await.unwrap().unwrap();
    assert_eq!(accounts.credentials().inspect(&alice.credential), CredentialStatus::Current);
}

#[tokio::test]
async fn test_untagged_dollar_plaintext_is_migrated() {
    let credential: Credential = serde_json::from_str(r#""$uperSecret1""#).unwrap();
    assert_eq!(credential, Credential::Legacy("$uperSecret1".into()));

    let (state, _) = setup_with_records(vec![imported_record("d@x.com", "dollar", credential)]);
    let accounts = &state.accounts;

    let summary = accounts.migrate_all().await.unwrap();
    assert_eq!(summary.rehashed, 1);
    assert!(summary.reset_required.is_empty());

    accounts
        .authenticate(usermgmt_common::AuthenticateRequest {
            email: "d@x.com".into(),
            password: "$uperSecret1".into(),
        })
        .await
        .unwrap();
}

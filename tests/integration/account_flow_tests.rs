// ======================================
// tests/integration/account_flow_tests.rs
// ======================================
//! End-to-end account flows through the account service
use backend_lib::auth::{Credential, CredentialStatus, EncodedHash, VerificationOutcome};
use backend_lib::error::AppError;
use backend_lib::storage::UserStore;
use usermgmt_common::{
    AuthenticateRequest, ChangePasswordRequest, CreateUserRequest, ForgotPasswordRequest,
    UpdateUserRequest,
};
use crate::test_utils::{imported_record, setup_file_env, setup_test_env, setup_with_records};

fn create(email: &str, username: &str, password: &str) -> CreateUserRequest {
    CreateUserRequest {
        email: email.to_string(),
        username: username.to_string(),
        password: password.to_string(),
    }
}

fn change(email: &str, old: &str, new: &str) -> ChangePasswordRequest {
    ChangePasswordRequest {
        email: email.to_string(),
        old_password: old.to_string(),
        new_password: new.to_string(),
    }
}

fn login(email: &str, password: &str) -> AuthenticateRequest {
    AuthenticateRequest {
        email: email.to_string(),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_change_password_flow() {
    let (state, _) = setup_test_env();
    let accounts = &state.accounts;
    accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();

    accounts
        .change_password(change("a@x.com", "Secret123", "Better456"))
        .await
        .unwrap();

    assert!(accounts.authenticate(login("a@x.com", "Better456")).await.is_ok());
    assert!(matches!(
        accounts.authenticate(login("a@x.com", "Secret123")).await,
        Err(AppError::InvalidPassword)
    ));
}

#[tokio::test]
async fn test_wrong_old_password_changes_nothing() {
    let (state, _) = setup_test_env();
    let accounts = &state.accounts;
    let view = accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();
    let before = accounts.store().get(view.id).await.unwrap().unwrap();

    let result = accounts
        .change_password(change("a@x.com", "NotMyPassword1", "Better456"))
        .await;
    assert!(matches!(result, Err(AppError::InvalidPassword)));

    let after = accounts.store().get(view.id).await.unwrap().unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_change_password_edge_cases() {
    let (state, _) = setup_test_env();
    let accounts = &state.accounts;
    accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();

    assert!(matches!(
        accounts.change_password(change("nobody@x.com", "Secret123", "Better456")).await,
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        accounts.change_password(change("a@x.com", "Secret123", "weak")).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        accounts.change_password(change("a@x.com", "", "Better456")).await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_concurrent_password_changes_do_not_both_win() {
    let (state, _) = setup_test_env();
    let accounts = &state.accounts;
    accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();

    let (first, second) = tokio::join!(
        accounts.change_password(change("a@x.com", "Secret123", "FirstNew1")),
        accounts.change_password(change("a@x.com", "Secret123", "SecondNew2")),
    );

    let wins = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(wins, 1);
    let loser = if first.is_ok() { second } else { first };
    assert!(matches!(loser, Err(AppError::InvalidPassword)));
}

#[tokio::test]
async fn test_duplicate_account_is_rejected() {
    let (state, _) = setup_test_env();
    let accounts = &state.accounts;
    accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();

    assert!(matches!(
        accounts.create_account(create("A@X.com", "alice2", "Secret123")).await,
        Err(AppError::Conflict(_))
    ));
    assert!(matches!(
        accounts.create_account(create("b@x.com", "alice", "Secret123")).await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(accounts.store().list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_user_conflict_changes_nothing() {
    let (state, _) = setup_test_env();
    let accounts = &state.accounts;
    accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();
    accounts.create_account(create("b@x.com", "bob", "Secret123")).await.unwrap();
    let before = accounts.store().list().await.unwrap();

    let result = accounts
        .update_user(UpdateUserRequest {
            current_email: "a@x.com".into(),
            current_username: "alice".into(),
            new_email: "b@x.com".into(),
            new_username: "alice2".into(),
        })
        .await;
    assert!(matches!(result, Err(AppError::Conflict(msg)) if msg.contains("Email")));

    let result = accounts
        .update_user(UpdateUserRequest {
            current_email: "a@x.com".into(),
            current_username: "alice".into(),
            new_email: "a2@x.com".into(),
            new_username: "bob".into(),
        })
        .await;
    assert!(matches!(result, Err(AppError::Conflict(msg)) if msg.contains("Username")));

    assert_eq!(accounts.store().list().await.unwrap(), before);
}

#[tokio::test]
async fn test_update_user_success() {
    let (state, _) = setup_test_env();
    let accounts = &state.accounts;
    accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();

    let response = accounts
        .update_user(UpdateUserRequest {
            current_email: "a@x.com".into(),
            current_username: "alice".into(),
            new_email: "alice@x.com".into(),
            new_username: "alice.b".into(),
        })
        .await
        .unwrap();
    assert!(response.success);

    let record = accounts.store().find_by_email("alice@x.com").await.unwrap().unwrap();
    assert_eq!(record.username, "alice.b");
    assert!(accounts.authenticate(login("alice@x.com", "Secret123")).await.is_ok());

    // both current identifiers have to match
    let result = accounts
        .update_user(UpdateUserRequest {
            current_email: "alice@x.com".into(),
            current_username: "alice".into(),
            new_email: "c@x.com".into(),
            new_username: "carol".into(),
        })
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_forgot_password_delivers_secret_out_of_band() {
    let (state, outbox) = setup_test_env();
    let accounts = &state.accounts;
    let view = accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();

    let response = accounts
        .forgot_password(ForgotPasswordRequest { email: "a@x.com".into() })
        .await
        .unwrap();

    let notice = outbox.last_for("a@x.com").unwrap();
    assert_eq!(notice.account_id, view.id);
    assert_eq!(notice.secret.chars().count(), 10);
    assert!(!response.message.contains(notice.secret.as_str()));

    let record = accounts.store().get(view.id).await.unwrap().unwrap();
    assert!(record.credential.is_hashed());
    assert_eq!(
        accounts.credentials().verify(&record.credential, &notice.secret),
        VerificationOutcome::Match
    );
    assert!(matches!(
        accounts.authenticate(login("a@x.com", "Secret123")).await,
        Err(AppError::InvalidPassword)
    ));
}

#[tokio::test]
async fn test_forgot_password_errors() {
    let (state, outbox) = setup_test_env();
    let accounts = &state.accounts;

    assert!(matches!(
        accounts.forgot_password(ForgotPasswordRequest { email: String::new() }).await,
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        accounts.forgot_password(ForgotPasswordRequest { email: "nobody@x.com".into() }).await,
        Err(AppError::NotFound(_))
    ));
    assert!(outbox.is_empty());
}

#[tokio::test]
async fn test_legacy_login_upgrades_credential() {
    let legacy = imported_record("old@x.com", "oldtimer", Credential::Legacy("hunter2".into()));
    let id = legacy.id;
    let (state, _) = setup_with_records(vec![legacy]);
    let accounts = &state.accounts;

    assert!(matches!(
        accounts.authenticate(login("old@x.com", "hunter3")).await,
        Err(AppError::InvalidPassword)
    ));
    let untouched = accounts.store().get(id).await.unwrap().unwrap();
    assert_eq!(untouched.credential, Credential::Legacy("hunter2".into()));

    accounts.authenticate(login("old@x.com", "hunter2")).await.unwrap();

    let upgraded = accounts.store().get(id).await.unwrap().unwrap();
    assert_eq!(accounts.credentials().inspect(&upgraded.credential), CredentialStatus::Current);
    assert_eq!(upgraded.version, 2);
    assert!(accounts.authenticate(login("old@x.com", "hunter2")).await.is_ok());
}

#[tokio::test]
async fn test_malformed_credential_is_reported() {
    let broken = imported_record(
        "broken@x.com",
        "broken",
        Credential::Hashed(EncodedHash::new("$argon2id$v=19$m=64,t=1,p=1$c2FsdHNhbHQ")),
    );
    let (state, _) = setup_with_records(vec![broken]);
    let accounts = &state.accounts;

    assert!(matches!(
        accounts.authenticate(login("broken@x.com", "anything")).await,
        Err(AppError::MalformedCredential(_))
    ));
    assert!(matches!(
        accounts.change_password(change("broken@x.com", "anything", "Better456")).await,
        Err(AppError::MalformedCredential(_))
    ));

    // a reset is the way out
    accounts
        .forgot_password(ForgotPasswordRequest { email: "broken@x.com".into() })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_flat_file_state_persists_and_queues_reset() {
    let (state, temp_dir) = setup_file_env();
    let accounts = &state.accounts;
    accounts.create_account(create("a@x.com", "alice", "Secret123")).await.unwrap();
    accounts
        .forgot_password(ForgotPasswordRequest { email: "a@x.com".into() })
        .await
        .unwrap();

    let users = std::fs::read_to_string(temp_dir.path().join("users.json")).unwrap();
    assert!(users.contains("\"format\": \"hashed\""));
    assert!(!users.contains("Secret123"));

    let outbox: Vec<_> = std::fs::read_dir(temp_dir.path().join("outbox"))
        .unwrap()
        .collect();
    assert_eq!(outbox.len(), 1);
}

#[tokio::test]
async fn test_mixed_case_imported_email_is_reachable() {
    let imported = imported_record("Old@X.com", "oldtimer", Credential::Legacy("hunter2".into()));
    let id = imported.id;
    let (state, outbox) = setup_with_records(vec![imported]);
    let accounts = &state.accounts;

    let view = accounts.authenticate(login("Old@X.com", "hunter2")).await.unwrap();
    assert_eq!(view.id, id);

    assert!(matches!(
        accounts
            .create_account(create("old@x.com", "newcomer", "Secret123"))
            .await,
        Err(AppError::Conflict(_))
    ));
    assert_eq!(accounts.store().list().await.unwrap().len(), 1);

    accounts
        .forgot_password(ForgotPasswordRequest { email: "OLD@x.com".into() })
        .await
        .unwrap();
    assert_eq!(outbox.last_for("Old@X.com").unwrap().account_id, id);
}

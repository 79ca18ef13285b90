//! Integration tests for credential persistence.
//!
//! These tests verify that the credential and impersonation stores:
//! - Persist across store instances when file-backed
//! - Keep tokens and the impersonation target independent
//! - Start empty on a missing file and refuse to open a corrupted one

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use tempfile::TempDir;
use wealthpulse_core::{
    CredentialStore, FileStore, ImpersonationStore, SecretStore, TokenPair, UserId,
};

fn jwt_expiring_in(delta: Duration) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = format!(r#"{{"sub":"1","exp":{}}}"#, (Utc::now() + delta).timestamp());
    format!("{}.{}.signature", header, URL_SAFE_NO_PAD.encode(claims))
}

fn open(dir: &TempDir) -> Arc<dyn SecretStore> {
    Arc::new(FileStore::open(dir.path().join("credentials.json")).unwrap())
}

#[test]
fn test_tokens_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let access = jwt_expiring_in(Duration::hours(1));

    {
        let creds = CredentialStore::new(open(&dir));
        creds.store_pair(&TokenPair::new(access.clone(), "R1")).unwrap();
        assert!(creds.is_authenticated());
    }

    let creds = CredentialStore::new(open(&dir));
    assert_eq!(creds.access_token().unwrap().expose(), access);
    assert_eq!(creds.refresh_token().unwrap().expose(), "R1");
    assert!(creds.is_authenticated());
}

#[test]
fn test_logout_persists() {
    let dir = TempDir::new().unwrap();

    let creds = CredentialStore::new(open(&dir));
    creds.store_pair(&TokenPair::new("A1", "R1")).unwrap();
    creds.clear_tokens();

    let reopened = CredentialStore::new(open(&dir));
    assert!(reopened.record().is_empty());
}

#[test]
fn test_impersonation_survives_logout_and_reopen() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);

    let creds = CredentialStore::new(store.clone());
    let impersonation = ImpersonationStore::new(store);
    creds.store_pair(&TokenPair::new("A1", "R1")).unwrap();
    impersonation.set_acting_as(UserId(17)).unwrap();
    creds.clear_tokens();

    let reopened = ImpersonationStore::new(open(&dir));
    assert_eq!(reopened.acting_as(), Some(UserId(17)));
}

#[test]
fn test_expired_token_is_not_authenticated() {
    let dir = TempDir::new().unwrap();
    let creds = CredentialStore::new(open(&dir));

    creds
        .store_pair(&TokenPair::new(jwt_expiring_in(-Duration::minutes(5)), "R1"))
        .unwrap();

    assert!(!creds.is_authenticated());
    assert!(creds.refresh_token().is_some());
}

#[test]
fn test_missing_file_starts_logged_out() {
    let dir = TempDir::new().unwrap();
    let creds = CredentialStore::new(open(&dir));
    assert!(creds.record().is_empty());
    assert!(!dir.path().join("credentials.json").exists());
}

#[test]
fn test_corrupted_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("credentials.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(FileStore::open(&path).is_err());
}

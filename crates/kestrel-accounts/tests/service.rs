use std::sync::Arc;
use std::time::Duration;

use kestrel_accounts::{AccountError, AccountService, Outgoing, ServiceConfig};
use kestrel_crypto::CryptoError;
use kestrel_crypto::passwd::PasswordHasher;
use kestrel_store::config::ConfigFile;
use kestrel_store::inbox::InboxConfig;

/// Keeps the tests fast; Argon2 is covered in kestrel-crypto.
struct XorHasher;

impl PasswordHasher for XorHasher {
    fn hash(&self, passwd: &[u8], salt: &[u8]) -> Result<Vec<u8>, CryptoError> {
        Ok(passwd
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ salt[i % salt.len()])
            .collect())
    }
}

async fn seed_invitations(dir: &std::path::Path, codes: &[&str]) {
    let mut file = ConfigFile::load_or_create(dir).await.unwrap();
    file.config.invitations = codes.iter().map(|c| c.to_string()).collect();
    file.save().await.unwrap();
}

fn settings(dir: &std::path::Path, prekey_target: usize) -> ServiceConfig {
    ServiceConfig {
        data_dir: dir.to_path_buf(),
        actor_timeout: Duration::from_secs(5),
        inbox: InboxConfig::default(),
        prekey_target,
    }
}

async fn open(dir: &std::path::Path, codes: &[&str]) -> AccountService {
    seed_invitations(dir, codes).await;
    AccountService::open(settings(dir, 100), Arc::new(XorHasher)).await.unwrap()
}

async fn login(service: &AccountService, name: &str, keys: &str) -> String {
    service
        .login(name, b"password".to_vec(), format!("sig-{keys}"), format!("dh-{keys}"))
        .await
        .unwrap()
        .bearer
}

fn text(to: &str, msg: &str) -> Outgoing {
    Outgoing {
        to: to.into(),
        kind: "text".into(),
        msg: msg.into(),
    }
}

#[tokio::test]
async fn register_login_send_recv() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv1", "inv2"]).await;
    service.register("inv1", "alice", b"password".to_vec()).await.unwrap();
    service.register("inv2", "bob", b"password".to_vec()).await.unwrap();

    let alice_bearer = login(&service, "alice", "a").await;
    let bob_bearer = login(&service, "bob", "b").await;
    let alice = service.authenticate(&alice_bearer).unwrap();
    let bob = service.authenticate(&bob_bearer).unwrap();

    let bob_info = service.user_info("bob").await.unwrap();
    assert_eq!(bob_info.sig_key, "sig-b");

    let need = service
        .send(&alice, vec![text(&bob_info.opaque.to_string(), "hello")], 1_000)
        .await
        .unwrap();
    assert!(need);

    let got = service.recv(&bob, 1_100).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].msg, "hello");
    assert_eq!(got[0].time, 100);
    assert_eq!(got[0].from, alice.credentials().opaque.to_string());

    assert!(service.recv(&bob, 1_100).await.unwrap().is_empty());
}

#[tokio::test]
async fn registration_failures() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv1", "inv2"]).await;

    let err = service.register("nope", "alice", b"pw".to_vec()).await.unwrap_err();
    assert!(matches!(err, AccountError::Forbidden(_)));

    service.register("inv1", "alice", b"pw".to_vec()).await.unwrap();
    let err = service.register("inv1", "carol", b"pw".to_vec()).await.unwrap_err();
    assert!(matches!(err, AccountError::Forbidden(_)));

    let err = service.register("inv2", "alice", b"pw".to_vec()).await.unwrap_err();
    assert!(matches!(err, AccountError::Conflict(_)));

    let err = service.register("inv2", "bad name", b"pw".to_vec()).await.unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));

    let config = ConfigFile::load_or_create(dir.path()).await.unwrap().config;
    assert_eq!(config.invitations, ["inv2"]);
    assert_eq!(config.used_invitations.len(), 1);
    assert_eq!(config.used_invitations[0].by, "alice");
}

#[tokio::test]
async fn failed_registration_keeps_the_invitation() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv1"]).await;

    // a file where the users directory should be makes account creation fail
    let users = dir.path().join(kestrel_store::record::USERS_DIR);
    tokio::fs::remove_dir_all(&users).await.unwrap();
    tokio::fs::write(&users, b"blocker").await.unwrap();

    let err = service.register("inv1", "alice", b"pw".to_vec()).await.unwrap_err();
    assert!(matches!(err, AccountError::Internal(_)));
    assert!(service.registry().lookup_by_name("alice").is_none());
    let config = ConfigFile::load_or_create(dir.path()).await.unwrap().config;
    assert_eq!(config.invitations, ["inv1"]);
    assert!(config.used_invitations.is_empty());

    tokio::fs::remove_file(&users).await.unwrap();
    tokio::fs::create_dir(&users).await.unwrap();
    service.register("inv1", "alice", b"pw".to_vec()).await.unwrap();
    assert!(service.registry().lookup_by_name("alice").is_some());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_unauthorized() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv"]).await;
    service.register("inv", "alice", b"password".to_vec()).await.unwrap();

    let err = service
        .login("alice", b"wrong".to_vec(), "s".into(), "m".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Unauthorized));
    let err = service
        .login("nobody", b"password".to_vec(), "s".into(), "m".into())
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Unauthorized));
}

#[tokio::test]
async fn relogin_revokes_previous_bearer() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv"]).await;
    service.register("inv", "alice", b"password".to_vec()).await.unwrap();

    let first = login(&service, "alice", "a").await;
    let second = login(&service, "alice", "a").await;
    assert!(matches!(service.authenticate(&first), Err(AccountError::Unauthorized)));
    assert!(service.authenticate(&second).is_ok());
}

#[tokio::test]
async fn key_rotation_invalidates_old_opaque_id() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv1", "inv2"]).await;
    service.register("inv1", "alice", b"password".to_vec()).await.unwrap();
    service.register("inv2", "bob", b"password".to_vec()).await.unwrap();

    let alice = service.authenticate(&login(&service, "alice", "a").await).unwrap();
    login(&service, "bob", "b1").await;
    let old_id = service.user_info("bob").await.unwrap().opaque.to_string();

    let bob = service.authenticate(&login(&service, "bob", "b2").await).unwrap();
    let new_id = service.user_info("bob").await.unwrap().opaque.to_string();
    assert_ne!(old_id, new_id);

    // old id no longer resolves, so the message is dropped
    service.send(&alice, vec![text(&old_id, "lost")], 10).await.unwrap();
    service.send(&alice, vec![text(&new_id, "kept")], 10).await.unwrap();
    let got = service.recv(&bob, 20).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].msg, "kept");
}

#[tokio::test]
async fn send_rejects_separators_before_delivering_anything() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv1", "inv2"]).await;
    service.register("inv1", "alice", b"password".to_vec()).await.unwrap();
    service.register("inv2", "bob", b"password".to_vec()).await.unwrap();
    let alice = service.authenticate(&login(&service, "alice", "a").await).unwrap();
    let bob = service.authenticate(&login(&service, "bob", "b").await).unwrap();
    let bob_id = service.user_info("bob").await.unwrap().opaque.to_string();

    let err = service
        .send(&alice, vec![text(&bob_id, "ok"), text(&bob_id, "not ok")], 5)
        .await
        .unwrap_err();
    assert!(matches!(err, AccountError::Validation(_)));
    assert!(service.recv(&bob, 6).await.unwrap().is_empty());

    // garbage recipient ids are skipped, not errors
    service.send(&alice, vec![text("garbage", "x")], 5).await.unwrap();
}

#[tokio::test]
async fn prekeys_flow() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv"]).await;
    service.register("inv", "alice", b"password".to_vec()).await.unwrap();
    let alice = service.authenticate(&login(&service, "alice", "a").await).unwrap();
    let alice_id = service.user_info("alice").await.unwrap().opaque.to_string();

    let keys: Vec<String> = (0..150).map(|i| format!("pk{i}")).collect();
    let live = service.add_prekeys(&alice, keys).await.unwrap();
    assert_eq!(live.len(), 150);

    let more: Vec<String> = (0..70).map(|i| format!("extra{i}")).collect();
    let live = service.add_prekeys(&alice, more).await.unwrap();
    assert_eq!(live.len(), 150);
    assert_eq!(live[0], "pk0");

    let got = service
        .fetch_prekeys(&[alice_id.clone(), "unknown".into(), alice_id])
        .await
        .unwrap();
    assert_eq!(got, ["pk0", "", "pk1"]);
    assert!(!service.user_info("alice").await.unwrap().need_prekeys);
}

#[tokio::test]
async fn empty_pool_yields_empty_string() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &["inv"]).await;
    service.register("inv", "alice", b"password".to_vec()).await.unwrap();
    login(&service, "alice", "a").await;
    let id = service.user_info("alice").await.unwrap().opaque.to_string();
    assert_eq!(service.fetch_prekeys(&[id]).await.unwrap(), [""]);
}

#[tokio::test]
async fn user_info_unknown_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = open(dir.path(), &[]).await;
    assert!(matches!(service.user_info("ghost").await, Err(AccountError::NotFound)));
}

#[tokio::test]
async fn state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let (bearer, bob_id) = {
        let service = open(dir.path(), &["inv1", "inv2"]).await;
        service.register("inv1", "alice", b"password".to_vec()).await.unwrap();
        service.register("inv2", "bob", b"password".to_vec()).await.unwrap();
        let alice = service.authenticate(&login(&service, "alice", "a").await).unwrap();
        let bearer = login(&service, "bob", "b").await;
        let bob_id = service.user_info("bob").await.unwrap().opaque.to_string();
        service.send(&alice, vec![text(&bob_id, "stored")], 50).await.unwrap();
        let bob = service.authenticate(&bearer).unwrap();
        service.add_prekeys(&bob, vec!["k1".into()]).await.unwrap();
        (bearer, bob_id)
    };

    let service = AccountService::open(settings(dir.path(), 100), Arc::new(XorHasher))
        .await
        .unwrap();
    assert_eq!(service.registry().snapshot().len(), 2);

    let bob = service.authenticate(&bearer).unwrap();
    assert_eq!(service.user_info("bob").await.unwrap().opaque.to_string(), bob_id);
    let got = service.recv(&bob, 60).await.unwrap();
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].time, 10);
    assert_eq!(service.fetch_prekeys(&[bob_id]).await.unwrap(), ["k1"]);
}

#[tokio::test]
async fn corrupt_account_is_skipped_at_startup() {
    let dir = tempfile::tempdir().unwrap();
    {
        let service = open(dir.path(), &["inv"]).await;
        service.register("inv", "alice", b"password".to_vec()).await.unwrap();
    }
    let broken = service_users_dir(dir.path()).join("0000000000000000001");
    tokio::fs::create_dir_all(&broken).await.unwrap();
    tokio::fs::write(broken.join("user.json"), b"{not json").await.unwrap();
    tokio::fs::create_dir_all(service_users_dir(dir.path()).join("not-an-id")).await.unwrap();

    let service = AccountService::open(settings(dir.path(), 100), Arc::new(XorHasher))
        .await
        .unwrap();
    assert_eq!(service.registry().snapshot().len(), 1);
    assert!(service.registry().lookup_by_name("alice").is_some());
}

fn service_users_dir(data_dir: &std::path::Path) -> std::path::PathBuf {
    data_dir.join(kestrel_store::record::USERS_DIR)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_same_name_admits_one() {
    let dir = tempfile::tempdir().unwrap();
    let codes: Vec<String> = (0..8).map(|i| format!("inv{i}")).collect();
    let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
    let service = Arc::new(open(dir.path(), &refs).await);

    let mut tasks = Vec::new();
    for code in codes.clone() {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service.register(&code, "same", b"pw".to_vec()).await
        }));
    }
    let mut ok = 0;
    for t in tasks {
        match t.await.unwrap() {
            Ok(()) => ok += 1,
            Err(AccountError::Conflict(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(service.registry().snapshot().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_registration_distinct_names_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let codes: Vec<String> = (0..8).map(|i| format!("inv{i}")).collect();
    let refs: Vec<&str> = codes.iter().map(String::as_str).collect();
    let service = Arc::new(open(dir.path(), &refs).await);

    let mut tasks = Vec::new();
    for (i, code) in codes.into_iter().enumerate() {
        let service = service.clone();
        tasks.push(tokio::spawn(async move {
            service.register(&code, &format!("user{i}"), b"pw".to_vec()).await
        }));
    }
    for t in tasks {
        t.await.unwrap().unwrap();
    }
    let snapshot = service.registry().snapshot();
    assert_eq!(snapshot.len(), 8);
    for i in 0..8 {
        assert!(snapshot.by_name(&format!("user{i}")).is_some());
    }
}

//! 档案引导流程集成测试

use std::sync::Arc;
use std::time::Duration;
use telemed_client::{MemoryStore, Procedure};
use telemed_core::{Principal, TelemedError, UserProfile};
use telemed_query::{ActorSlot, MutationStatus, ProfileLookup, Queries, QueryCache, SharedBackend};
use telemed_session::{
    BackendFactory, BootstrapState, LocalIdentityProvider, ProfileForm, ProfileGate, Session,
    SessionConfig,
};

fn gate_for(store: &Arc<MemoryStore>, principal: &str) -> ProfileGate {
    let provider = Arc::new(LocalIdentityProvider::new(Principal::new(principal)));
    let queries = Queries::new(QueryCache::default(), ActorSlot::new());
    let store = store.clone();
    let factory: BackendFactory = Arc::new(move |principal: &Principal| {
        Ok(Arc::new(store.connect(principal.clone())) as SharedBackend)
    });
    let config = SessionConfig {
        login_retry_delay: Duration::from_millis(1),
    };
    ProfileGate::new(Arc::new(Session::new(provider, queries, factory, config)))
}

#[tokio::test]
async fn test_unauthenticated_gate_blocks_access() {
    let store = MemoryStore::new();
    let gate = gate_for(&store, "doctor-1");

    assert_eq!(gate.refresh().await.unwrap(), BootstrapState::Unauthenticated);
    assert!(!gate.can_access_protected());

    let err = gate.submit(ProfileForm::new("Dr. Lee")).await.unwrap_err();
    assert!(matches!(err, TelemedError::InvalidStateTransition { .. }));
    assert_eq!(store.call_count(Procedure::SaveCallerUserProfile), 0);
}

#[tokio::test]
async fn test_new_principal_must_save_profile_before_access() {
    let store = MemoryStore::new();
    let gate = gate_for(&store, "doctor-1");

    gate.session().login().await.unwrap();
    assert_eq!(gate.refresh().await.unwrap(), BootstrapState::AuthenticatedNoProfile);
    assert!(!gate.can_access_protected());

    let state = gate.submit(ProfileForm::new(" Dr. Lee ")).await.unwrap();
    assert_eq!(state, BootstrapState::AuthenticatedWithProfile);
    assert!(gate.can_access_protected());

    let expected = UserProfile {
        name: "Dr. Lee".to_string(),
        role: "Doctor".to_string(),
    };
    assert_eq!(gate.profile(), Some(expected.clone()));
    assert_eq!(
        gate.session().queries().caller_profile().await.unwrap(),
        ProfileLookup::Found(expected)
    );
}

#[tokio::test]
async fn test_existing_profile_grants_access() {
    let store = MemoryStore::new();
    let first = gate_for(&store, "doctor-1");
    first.session().login().await.unwrap();
    first.refresh().await.unwrap();
    first.submit(ProfileForm::new("Dr. Lee")).await.unwrap();

    // 同一调用者的新会话
    let second = gate_for(&store, "doctor-1");
    second.session().login().await.unwrap();
    assert_eq!(second.refresh().await.unwrap(), BootstrapState::AuthenticatedWithProfile);
    assert!(second.can_access_protected());

    // 其他调用者仍需填写档案
    let other = gate_for(&store, "doctor-2");
    other.session().login().await.unwrap();
    assert_eq!(other.refresh().await.unwrap(), BootstrapState::AuthenticatedNoProfile);
}

#[tokio::test]
async fn test_fetch_failure_is_not_treated_as_missing_profile() {
    let store = MemoryStore::new();
    let gate = gate_for(&store, "doctor-1");
    gate.session().login().await.unwrap();

    store.set_failure(Procedure::GetCallerUserProfile, Some("replica down"));
    assert_eq!(gate.refresh().await.unwrap(), BootstrapState::ProfileUnavailable);
    assert_eq!(
        gate.last_error(),
        Some(TelemedError::Remote("replica down".to_string()))
    );
    assert!(!gate.can_access_protected());

    // 读取失败时不能提交档案
    assert!(gate.submit(ProfileForm::new("Dr. Lee")).await.is_err());

    store.set_failure(Procedure::GetCallerUserProfile, None);
    assert_eq!(gate.refresh().await.unwrap(), BootstrapState::AuthenticatedNoProfile);
    assert_eq!(gate.last_error(), None);
}

#[tokio::test]
async fn test_rejected_submission_keeps_gate_closed() {
    let store = MemoryStore::new();
    let gate = gate_for(&store, "doctor-1");
    gate.session().login().await.unwrap();
    gate.refresh().await.unwrap();

    let err = gate.submit(ProfileForm::new("   ")).await.unwrap_err();
    assert!(matches!(err, TelemedError::Validation(_)));
    assert_eq!(store.call_count(Procedure::SaveCallerUserProfile), 0);
    assert_eq!(gate.save_status(), MutationStatus::Idle);

    store.set_failure(Procedure::SaveCallerUserProfile, Some("quota exceeded"));
    let err = gate.submit(ProfileForm::new("Dr. Lee")).await.unwrap_err();
    assert_eq!(err, TelemedError::Remote("quota exceeded".to_string()));
    assert_eq!(gate.state(), BootstrapState::AuthenticatedNoProfile);
    assert!(!gate.can_access_protected());
    assert!(matches!(gate.save_status(), MutationStatus::Failed(m) if m.contains("quota exceeded")));

    store.set_failure(Procedure::SaveCallerUserProfile, None);
    assert_eq!(
        gate.submit(ProfileForm::new("Dr. Lee")).await.unwrap(),
        BootstrapState::AuthenticatedWithProfile
    );
    assert_eq!(gate.save_status(), MutationStatus::Succeeded);
}

#[tokio::test]
async fn test_profile_save_reports_pending() {
    let store = MemoryStore::new();
    let gate = Arc::new(gate_for(&store, "doctor-1"));
    gate.session().login().await.unwrap();
    gate.refresh().await.unwrap();

    store.set_latency(Some(Duration::from_millis(40)));
    let submit = {
        let gate = Arc::clone(&gate);
        tokio::spawn(async move { gate.submit(ProfileForm::new("Dr. Lee")).await })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(gate.save_status(), MutationStatus::Pending);

    assert_eq!(submit.await.unwrap().unwrap(), BootstrapState::AuthenticatedWithProfile);
    assert_eq!(gate.save_status(), MutationStatus::Succeeded);
}

#[tokio::test]
async fn test_logout_returns_to_unauthenticated() {
    let store = MemoryStore::new();
    let gate = gate_for(&store, "doctor-1");
    gate.session().login().await.unwrap();
    gate.refresh().await.unwrap();
    gate.submit(ProfileForm::new("Dr. Lee")).await.unwrap();

    gate.logout().await.unwrap();
    assert_eq!(gate.state(), BootstrapState::Unauthenticated);
    assert_eq!(gate.profile(), None);
    assert_eq!(gate.session().queries().cache().entry_count(), 0);

    // 会话层直接注销后刷新也回到未登录
    gate.session().login().await.unwrap();
    assert_eq!(gate.refresh().await.unwrap(), BootstrapState::AuthenticatedWithProfile);
    gate.session().logout().await.unwrap();
    assert_eq!(gate.refresh().await.unwrap(), BootstrapState::Unauthenticated);
}

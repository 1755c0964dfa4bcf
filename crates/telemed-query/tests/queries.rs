//! Queries 对接内存远程服务的集成测试

use std::sync::Arc;
use std::time::Duration;
use telemed_client::{MemoryStore, Procedure};
use telemed_core::{
    Appointment, ConsultationSession, Patient, Principal, TelemedError, Timestamp, UserProfile,
    UserRole,
};
use telemed_query::{ActorSlot, ProfileLookup, Queries, QueryCache, QueryFamily, QueryKey};

fn connected(store: &Arc<MemoryStore>, principal: &str) -> Queries {
    let actor = ActorSlot::new();
    actor.install(Arc::new(store.connect(Principal::new(principal))));
    Queries::new(QueryCache::default(), actor)
}

fn patient(id: &str, name: &str) -> Patient {
    Patient {
        id: id.to_string(),
        name: name.to_string(),
        age: 30,
        medical_history: String::new(),
    }
}

#[tokio::test]
async fn test_reads_without_actor_resolve_to_defaults() {
    let queries = Queries::new(QueryCache::default(), ActorSlot::new());

    assert!(queries.all_patients().await.unwrap().is_empty());
    assert!(queries.all_appointments().await.unwrap().is_empty());
    assert_eq!(queries.consultation_session("session-1").await.unwrap(), None);
    assert!(!queries.is_caller_admin().await.unwrap());
    assert_eq!(queries.caller_role().await.unwrap(), UserRole::Guest);
    assert_eq!(queries.caller_profile().await.unwrap(), ProfileLookup::Unavailable);
    assert_eq!(queries.cache().entry_count(), 0);
}

#[tokio::test]
async fn test_mutations_without_actor_fail() {
    let queries = Queries::new(QueryCache::default(), ActorSlot::new());
    let err = queries.create_patient(patient("patient-1", "Ada")).await.unwrap_err();
    assert_eq!(err, TelemedError::ActorUnavailable);
}

#[tokio::test]
async fn test_create_then_read_round_trip() {
    let store = MemoryStore::new();
    let queries = connected(&store, "doctor-1");

    assert!(queries.all_patients().await.unwrap().is_empty());

    let p = patient("patient-1", "Ada");
    queries.create_patient(p.clone()).await.unwrap();
    assert_eq!(queries.all_patients().await.unwrap(), vec![p.clone()]);
    assert_eq!(queries.patient("patient-1").await.unwrap(), Some(p));

    // 写操作后的读取必须重新请求
    assert_eq!(store.call_count(Procedure::GetAllPatients), 2);

    let appointment = Appointment {
        id: "appointment-1".to_string(),
        doctor_id: Principal::new("doctor-1"),
        patient_id: "patient-1".to_string(),
        time: Timestamp::from_millis(1_900_000_000_000),
        reason: "consult".to_string(),
    };
    queries.create_appointment(appointment.clone()).await.unwrap();
    assert_eq!(
        queries.appointment("appointment-1").await.unwrap(),
        Some(appointment.clone())
    );
    assert_eq!(
        queries.appointments_by_patient("patient-1").await.unwrap(),
        vec![appointment]
    );
}

#[tokio::test]
async fn test_concurrent_reads_issue_one_fetch() {
    let store = MemoryStore::new();
    store.set_latency(Some(Duration::from_millis(20)));
    let queries = connected(&store, "doctor-1");

    let (a, b, c) = tokio::join!(
        queries.all_patients(),
        queries.all_patients(),
        queries.all_patients()
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(store.call_count(Procedure::GetAllPatients), 1);
}

#[tokio::test]
async fn test_failed_mutation_keeps_cached_list() {
    let store = MemoryStore::new();
    let queries = connected(&store, "doctor-1");

    queries.create_patient(patient("patient-1", "Ada")).await.unwrap();
    assert_eq!(queries.all_patients().await.unwrap().len(), 1);
    let fetches = store.call_count(Procedure::GetAllPatients);

    store.set_failure(Procedure::CreatePatient, Some("rejected"));
    let err = queries.create_patient(patient("patient-2", "Bob")).await.unwrap_err();
    assert_eq!(err, TelemedError::Remote("rejected".to_string()));

    assert_eq!(queries.all_patients().await.unwrap().len(), 1);
    assert_eq!(store.call_count(Procedure::GetAllPatients), fetches);
}

#[tokio::test]
async fn test_profile_absence_and_failure_are_distinct() {
    let store = MemoryStore::new();
    let queries = connected(&store, "doctor-1");

    store.set_failure(Procedure::GetCallerUserProfile, Some("replica down"));
    let err = queries.caller_profile().await.unwrap_err();
    assert_eq!(err, TelemedError::Remote("replica down".to_string()));

    store.set_failure(Procedure::GetCallerUserProfile, None);
    assert_eq!(queries.caller_profile().await.unwrap(), ProfileLookup::Missing);

    let profile = UserProfile {
        name: "Dr. Lee".to_string(),
        role: "Doctor".to_string(),
    };
    queries.save_caller_profile(profile.clone()).await.unwrap();
    assert_eq!(queries.caller_profile().await.unwrap(), ProfileLookup::Found(profile));
}

#[tokio::test]
async fn test_consultation_mutation_invalidates_every_session_key() {
    let store = MemoryStore::new();
    let queries = connected(&store, "doctor-1");

    assert_eq!(queries.consultation_session("session-1").await.unwrap(), None);
    assert!(queries.consultations_by_appointment("appointment-1").await.unwrap().is_empty());

    let session = ConsultationSession::blank("session-1", "appointment-1");
    queries.create_consultation(session.clone()).await.unwrap();

    assert_eq!(
        queries.consultation_session("session-1").await.unwrap(),
        Some(session.clone())
    );
    assert_eq!(
        queries.consultations_by_appointment("appointment-1").await.unwrap(),
        vec![session.clone()]
    );

    let updated = ConsultationSession {
        notes: "stable".to_string(),
        ..session
    };
    queries.update_consultation("session-1", updated.clone()).await.unwrap();
    assert_eq!(queries.consultation_session("session-1").await.unwrap(), Some(updated));
    assert_eq!(queries.all_consultation_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_id_disables_scoped_read() {
    let store = MemoryStore::new();
    let queries = connected(&store, "doctor-1");

    assert_eq!(queries.consultation_session("").await.unwrap(), None);
    assert_eq!(queries.patient("").await.unwrap(), None);
    assert_eq!(store.call_count(Procedure::GetConsultationSession), 0);
    assert_eq!(store.call_count(Procedure::GetPatient), 0);
}

#[tokio::test]
async fn test_role_assignment_invalidates_role_queries() {
    let store = MemoryStore::new();
    let queries = connected(&store, "doctor-1");

    assert_eq!(queries.caller_role().await.unwrap(), UserRole::User);
    assert!(!queries.is_caller_admin().await.unwrap());

    queries
        .assign_role(Principal::new("doctor-1"), UserRole::Admin)
        .await
        .unwrap();
    assert!(queries.cache().is_stale(&QueryKey::of(QueryFamily::CallerRole)));
    assert_eq!(queries.caller_role().await.unwrap(), UserRole::Admin);
    assert!(queries.is_caller_admin().await.unwrap());
}

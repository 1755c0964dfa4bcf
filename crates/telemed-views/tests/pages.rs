//! 页面流程集成测试

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use telemed_client::{MemoryStore, Procedure};
use telemed_core::{Principal, Timestamp};
use telemed_query::{ActorSlot, MutationStatus, MutationTracker, Queries, QueryCache};
use telemed_views::{
    appointments, consultation, patients, AppointmentsView, ConsultationNotesForm,
    ConsultationView, DashboardView, NewAppointmentForm, NewPatientForm, PatientsView,
};

fn connected(store: &Arc<MemoryStore>) -> Queries {
    let actor = ActorSlot::new();
    actor.install(Arc::new(store.connect(Principal::new("doctor-1"))));
    Queries::new(QueryCache::default(), actor)
}

fn form_at(patient_id: &str, time: &str) -> NewAppointmentForm {
    NewAppointmentForm {
        patient_id: patient_id.to_string(),
        time: time.to_string(),
        reason: "follow-up".to_string(),
    }
}

#[tokio::test]
async fn test_patient_page_flow() {
    let store = MemoryStore::new();
    let queries = connected(&store);
    let tracker = MutationTracker::new();

    let ada = patients::add_patient(
        &queries,
        &tracker,
        NewPatientForm {
            name: "Ada".to_string(),
            age: 36,
            medical_history: String::new(),
        },
    )
    .await
    .unwrap();

    let view = PatientsView::load(&queries, "ADA").await.unwrap();
    assert_eq!(view.patients, vec![ada.clone()]);

    assert_eq!(tracker.status(), MutationStatus::Succeeded);

    patients::delete_patient(&queries, &tracker, &ada.id).await.unwrap();
    let view = PatientsView::load(&queries, "").await.unwrap();
    assert!(view.patients.is_empty());
}

#[tokio::test]
async fn test_schedule_and_partition() {
    let store = MemoryStore::new();
    let queries = connected(&store);
    let doctor = Principal::new("doctor-1");
    let tracker = MutationTracker::new();

    let ada = patients::add_patient(
        &queries,
        &tracker,
        NewPatientForm {
            name: "Ada".to_string(),
            age: 36,
            medical_history: String::new(),
        },
    )
    .await
    .unwrap();

    let past = appointments::schedule(&queries, &tracker, form_at(&ada.id, "2020-01-01T09:00"), doctor.clone(), &Utc)
        .await
        .unwrap();
    let future = appointments::schedule(&queries, &tracker, form_at(&ada.id, "2099-01-01T09:00"), doctor.clone(), &Utc)
        .await
        .unwrap();
    let orphan = appointments::schedule(&queries, &tracker, form_at("patient-gone", "2098-01-01T09:00"), doctor, &Utc)
        .await
        .unwrap();

    let view = AppointmentsView::load(&queries, Timestamp::now()).await.unwrap();
    let upcoming: Vec<_> = view.upcoming.iter().map(|c| c.appointment.id.clone()).collect();
    assert_eq!(upcoming, vec![orphan.id.clone(), future.id.clone()]);
    assert_eq!(view.upcoming[0].patient_name, "Unknown Patient");
    assert_eq!(view.upcoming[1].patient_name, "Ada");
    assert_eq!(view.past.len(), 1);
    assert_eq!(view.past[0].appointment.id, past.id);
    assert!(!view.past[0].has_actions());

    let dashboard = DashboardView::load(&queries, Timestamp::now()).await.unwrap();
    assert_eq!(dashboard.stats.total_appointments, 3);
    assert_eq!(dashboard.upcoming.len(), 2);

    appointments::cancel(&queries, &tracker, &orphan.id).await.unwrap();
    let view = AppointmentsView::load(&queries, Timestamp::now()).await.unwrap();
    assert_eq!(view.upcoming.len(), 1);
}

#[tokio::test]
async fn test_consultation_flow() {
    let store = MemoryStore::new();
    let queries = connected(&store);
    let tracker = MutationTracker::new();

    let missing = ConsultationView::load(&queries, "session-none").await.unwrap();
    assert_eq!(
        missing,
        ConsultationView::NotFound {
            session_id: "session-none".to_string()
        }
    );

    let session_id = appointments::start_consultation(&queries, &tracker, "appointment-1")
        .await
        .unwrap();
    assert_eq!(store.call_count(Procedure::CreateConsultationSession), 1);

    let view = ConsultationView::load(&queries, &session_id).await.unwrap();
    let session = view.session().cloned().unwrap();
    assert_eq!(session.appointment_id, "appointment-1");
    assert!(session.notes.is_empty());

    let form = ConsultationNotesForm {
        notes: "recovering".to_string(),
        prescription: "ibuprofen".to_string(),
        follow_up_date: "2099-02-01".to_string(),
    };
    let saved = consultation::save_notes(&queries, &tracker, &session, form).await.unwrap();

    let reloaded = ConsultationView::load(&queries, &session_id).await.unwrap();
    assert_eq!(reloaded.session(), Some(&saved));
    assert_eq!(saved.prescription.as_deref(), Some("ibuprofen"));
}

#[tokio::test]
async fn test_form_submission_reports_pending_then_failure() {
    let store = MemoryStore::new();
    let queries = Arc::new(connected(&store));
    let tracker = MutationTracker::new();

    // 校验失败不发起请求
    let invalid = patients::add_patient(&queries, &tracker, NewPatientForm::default()).await;
    assert!(invalid.is_err());
    assert_eq!(tracker.status(), MutationStatus::Idle);
    assert_eq!(store.call_count(Procedure::CreatePatient), 0);

    store.set_latency(Some(Duration::from_millis(40)));
    store.set_failure(Procedure::CreatePatient, Some("quota exceeded"));

    let submit = {
        let queries = Arc::clone(&queries);
        let tracker = tracker.clone();
        tokio::spawn(async move {
            let form = NewPatientForm {
                name: "Ada".to_string(),
                age: 36,
                medical_history: String::new(),
            };
            patients::add_patient(&queries, &tracker, form).await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(tracker.is_pending());

    assert!(submit.await.unwrap().is_err());
    assert!(matches!(tracker.status(), MutationStatus::Failed(m) if m.contains("quota exceeded")));
    assert!(PatientsView::load(&queries, "").await.unwrap().patients.is_empty());
}

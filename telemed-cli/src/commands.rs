//! 子命令执行与输出

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use std::sync::Arc;
use telemed_client::{HttpBackend, MemoryStore};
use telemed_core::{Patient, Principal, Timestamp, UserProfile};
use telemed_query::{ActorSlot, MutationStatus, MutationTracker, Queries, QueryCache, SharedBackend};
use telemed_session::{
    BackendFactory, BootstrapState, LocalIdentityProvider, ProfileForm, ProfileGate, Session,
};
use telemed_views::format::{age_detail, age_line, format_date, format_time, history_text, short_id};
use telemed_views::{
    appointments, consultation, patients, AppointmentCard, AppointmentsView, ConsultationNotesForm,
    ConsultationView, DashboardView, NewAppointmentForm, NewPatientForm, PatientsView,
};
use tracing::{debug, info};

use crate::config::TelemedConfig;
use crate::{AppointmentsAction, Command, ConsultAction, PatientsAction, ProfileAction};

/// 一次命令行调用的运行环境
pub struct App {
    gate: ProfileGate,
    principal: Principal,
    offline_profile: Option<String>,
    /// 本次调用中写操作的状态
    writes: MutationTracker,
}

impl App {
    pub fn new(config: &TelemedConfig, offline: bool) -> Result<Self> {
        let principal = Principal::new(config.identity.principal.trim());
        let provider = Arc::new(LocalIdentityProvider::new(principal.clone()));
        let queries = Queries::new(QueryCache::new(config.cache_config()), ActorSlot::new());

        let factory: BackendFactory = if offline {
            let store = MemoryStore::new();
            Arc::new(move |caller: &Principal| {
                Ok(Arc::new(store.connect(caller.clone())) as SharedBackend)
            })
        } else {
            let http = config.http_backend();
            Arc::new(move |caller: &Principal| {
                Ok(Arc::new(HttpBackend::new(&http, caller.clone())?) as SharedBackend)
            })
        };

        let session = Session::new(provider, queries, factory, config.session_config());
        Ok(Self {
            gate: ProfileGate::new(Arc::new(session)),
            principal,
            offline_profile: if offline {
                config.identity.display_name.clone()
            } else {
                None
            },
            writes: MutationTracker::new(),
        })
    }

    fn queries(&self) -> &Queries {
        self.gate.session().queries()
    }

    /// 登录并读取档案状态
    async fn sign_in(&self) -> Result<BootstrapState> {
        self.gate
            .session()
            .login()
            .await
            .context("Failed to sign in")?;
        let mut state = self.gate.refresh().await.context("Failed to load profile")?;

        if state == BootstrapState::AuthenticatedNoProfile {
            if let Some(name) = &self.offline_profile {
                info!("Saving configured offline profile for {}", self.principal);
                state = self.gate.submit(ProfileForm::new(name.as_str())).await?;
            }
        }
        debug!("Profile bootstrap state: {:?}", state);
        Ok(state)
    }

    /// 受保护命令的入口：必须已登录且拥有档案
    async fn require_profile(&self) -> Result<UserProfile> {
        self.sign_in().await?;
        match (self.gate.state(), self.gate.profile()) {
            (BootstrapState::AuthenticatedWithProfile, Some(profile)) => Ok(profile),
            (BootstrapState::AuthenticatedNoProfile, _) => bail!(
                "No profile for {}. Run `telemed profile setup --name <NAME>` first",
                self.principal
            ),
            (BootstrapState::ProfileUnavailable, _) => match self.gate.last_error() {
                Some(e) => Err(anyhow!(e).context("Profile could not be loaded, try again")),
                None => bail!("Profile could not be loaded, try again"),
            },
            (state, _) => bail!("Not signed in ({:?})", state),
        }
    }

    pub async fn run(&self, command: Command) -> Result<()> {
        let result = match command {
            Command::Login => self.login().await,
            Command::Profile { action } => self.profile(action).await,
            Command::Dashboard => self.dashboard().await,
            Command::Patients { action } => self.patients(action).await,
            Command::Appointments { action } => self.appointments(action).await,
            Command::Consult { action } => self.consult(action).await,
        };
        match self.writes.status() {
            MutationStatus::Idle => {}
            status => debug!("Write status: {:?}", status),
        }
        result
    }

    async fn login(&self) -> Result<()> {
        let state = self.sign_in().await?;
        println!("Signed in as {}", self.principal);
        match state {
            BootstrapState::AuthenticatedWithProfile => {
                if let Some(profile) = self.gate.profile() {
                    println!("Welcome back, {} ({})", profile.name, profile.role);
                }
            }
            BootstrapState::AuthenticatedNoProfile => {
                println!("No profile yet. Run `telemed profile setup --name <NAME>` to continue.");
            }
            other => println!("Profile status: {:?}", other),
        }
        Ok(())
    }

    async fn profile(&self, action: ProfileAction) -> Result<()> {
        match action {
            ProfileAction::Show => {
                let profile = self.require_profile().await?;
                println!("Name: {}", profile.name);
                println!("Role: {}", profile.role);
                println!("Principal: {}", self.principal);
                let role = self.queries().caller_role().await?;
                println!("Access: {}", role);
            }
            ProfileAction::Setup { name, role } => {
                let state = self.sign_in().await?;
                if state == BootstrapState::AuthenticatedWithProfile {
                    println!("Profile already set up for {}", self.principal);
                    return Ok(());
                }
                let mut form = ProfileForm::new(name);
                if let Some(role) = role {
                    form = form.with_role(role);
                }
                self.gate.submit(form).await.context("Failed to save profile")?;
                if let Some(profile) = self.gate.profile() {
                    println!("Profile saved: {} ({})", profile.name, profile.role);
                }
            }
        }
        Ok(())
    }

    async fn dashboard(&self) -> Result<()> {
        let profile = self.require_profile().await?;
        let view = DashboardView::load(self.queries(), Timestamp::now()).await?;

        println!("Welcome, {}", profile.name);
        println!();
        println!("Total Patients:  {}", view.stats.total_patients);
        println!("Appointments:    {}", view.stats.total_appointments);
        println!("Active Sessions: {}", view.stats.active_sessions);
        println!("This Month:      {}", view.stats.this_month);

        println!();
        println!("Upcoming Appointments");
        if view.upcoming.is_empty() {
            println!("  No upcoming appointments");
        }
        for card in &view.upcoming {
            print_appointment(card);
        }

        println!();
        println!("Recent Patients");
        if view.recent_patients.is_empty() {
            println!("  No patients yet");
        }
        for patient in &view.recent_patients {
            println!("  {} - {}", patient.name, age_line(patient));
        }
        Ok(())
    }

    async fn patients(&self, action: PatientsAction) -> Result<()> {
        self.require_profile().await?;
        let queries = self.queries();
        match action {
            PatientsAction::List { search } => {
                let view = PatientsView::load(queries, &search).await?;
                if view.patients.is_empty() {
                    println!("{}", view.empty_message());
                }
                for patient in &view.patients {
                    print_patient(patient);
                }
            }
            PatientsAction::Add { name, age, history } => {
                let form = NewPatientForm {
                    name,
                    age,
                    medical_history: history,
                };
                let patient = patients::add_patient(queries, &self.writes, form)
                    .await
                    .context("Failed to create patient")?;
                println!("Created patient {} ({})", patient.name, patient.id);
            }
            PatientsAction::Delete { id } => {
                patients::delete_patient(queries, &self.writes, &id)
                    .await
                    .with_context(|| format!("Failed to delete patient {}", id))?;
                println!("Deleted patient {}", id);
            }
        }
        Ok(())
    }

    async fn appointments(&self, action: AppointmentsAction) -> Result<()> {
        self.require_profile().await?;
        let queries = self.queries();
        match action {
            AppointmentsAction::List => {
                let view = AppointmentsView::load(queries, Timestamp::now()).await?;
                println!("Upcoming ({})", view.upcoming.len());
                if view.upcoming.is_empty() {
                    println!("  No upcoming appointments");
                }
                for card in &view.upcoming {
                    print_appointment(card);
                }
                println!("Past ({})", view.past.len());
                if view.past.is_empty() {
                    println!("  No past appointments");
                }
                for card in &view.past {
                    print_appointment(card);
                }
            }
            AppointmentsAction::Schedule {
                patient,
                time,
                reason,
            } => {
                let form = NewAppointmentForm {
                    patient_id: patient,
                    time,
                    reason,
                };
                let appointment =
                    appointments::schedule(queries, &self.writes, form, self.principal.clone(), &Local)
                        .await
                        .context("Failed to schedule appointment")?;
                println!(
                    "Scheduled {} on {} at {}",
                    appointment.id,
                    format_date(appointment.time, &Local),
                    format_time(appointment.time, &Local)
                );
            }
            AppointmentsAction::Cancel { id } => {
                appointments::cancel(queries, &self.writes, &id)
                    .await
                    .with_context(|| format!("Failed to cancel appointment {}", id))?;
                println!("Cancelled appointment {}", id);
            }
        }
        Ok(())
    }

    async fn consult(&self, action: ConsultAction) -> Result<()> {
        self.require_profile().await?;
        let queries = self.queries();
        match action {
            ConsultAction::Start { appointment_id } => {
                let session_id = appointments::start_consultation(queries, &self.writes, &appointment_id)
                    .await
                    .context("Failed to start consultation")?;
                println!("Consultation session {}", session_id);
            }
            ConsultAction::Show { session_id } => {
                match ConsultationView::load(queries, &session_id).await? {
                    ConsultationView::Ready(session) => {
                        println!("Consultation Session {}", session.id);
                        println!("Appointment: {}", session.appointment_id);
                        println!("Notes: {}", session.notes);
                        println!(
                            "Prescription: {}",
                            session.prescription.as_deref().unwrap_or("-")
                        );
                        let follow_up = session
                            .follow_up_date
                            .map(|ts| format_date(ts, &chrono::Utc))
                            .unwrap_or_else(|| "-".to_string());
                        println!("Follow-up: {}", follow_up);
                    }
                    ConsultationView::NotFound { session_id } => {
                        bail!("Session {} not found or not accessible", session_id);
                    }
                }
            }
            ConsultAction::Notes {
                session_id,
                notes,
                prescription,
                follow_up,
            } => {
                let view = ConsultationView::load(queries, &session_id).await?;
                let Some(session) = view.session() else {
                    bail!("Session {} not found or not accessible", session_id);
                };

                let mut form = ConsultationNotesForm::from(session);
                if let Some(notes) = notes {
                    form.notes = notes;
                }
                if let Some(prescription) = prescription {
                    form.prescription = prescription;
                }
                if let Some(follow_up) = follow_up {
                    form.follow_up_date = follow_up;
                }
                consultation::save_notes(queries, &self.writes, session, form)
                    .await
                    .context("Failed to save consultation notes")?;
                println!("Saved notes for {}", session_id);
            }
        }
        Ok(())
    }
}

fn print_appointment(card: &AppointmentCard) {
    let apt = &card.appointment;
    let badge = if card.is_past { " [Completed]" } else { "" };
    println!(
        "  {} {} {}{}  ({})",
        format_date(apt.time, &Local),
        format_time(apt.time, &Local),
        card.patient_name,
        badge,
        apt.id
    );
    println!("    Reason: {}", apt.reason);
}

fn print_patient(patient: &Patient) {
    println!("  {}  ID: {}", patient.name, short_id(&patient.id));
    println!("    {}", age_detail(patient));
    println!("    Medical History: {}", history_text(patient));
}

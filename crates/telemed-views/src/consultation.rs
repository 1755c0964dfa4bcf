//! 问诊页面
//!
//! 视频通话尚未接入，`CallControls` 只维护按钮状态。

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use telemed_core::{ConsultationSession, Result, TelemedError, Timestamp};
use telemed_query::{MutationTracker, Queries};

/// 问诊页面状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsultationView {
    /// 会话不存在或无权访问
    NotFound { session_id: String },
    Ready(ConsultationSession),
}

impl ConsultationView {
    pub async fn load(queries: &Queries, session_id: &str) -> Result<Self> {
        Ok(match queries.consultation_session(session_id).await? {
            Some(session) => ConsultationView::Ready(session),
            None => ConsultationView::NotFound {
                session_id: session_id.to_string(),
            },
        })
    }

    pub fn session(&self) -> Option<&ConsultationSession> {
        match self {
            ConsultationView::Ready(session) => Some(session),
            ConsultationView::NotFound { .. } => None,
        }
    }
}

/// 问诊记录表单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsultationNotesForm {
    pub notes: String,
    /// 为空表示没有处方
    pub prescription: String,
    /// `YYYY-MM-DD`，为空表示无需复诊
    pub follow_up_date: String,
}

impl From<&ConsultationSession> for ConsultationNotesForm {
    fn from(session: &ConsultationSession) -> Self {
        Self {
            notes: session.notes.clone(),
            prescription: session.prescription.clone().unwrap_or_default(),
            follow_up_date: session
                .follow_up_date
                .and_then(|ts| ts.to_date())
                .map(|date| date.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

impl ConsultationNotesForm {
    /// 将表单内容写回会话
    pub fn apply_to(self, session: &ConsultationSession) -> Result<ConsultationSession> {
        let prescription = if self.prescription.trim().is_empty() {
            None
        } else {
            Some(self.prescription)
        };

        let follow_up_date = match self.follow_up_date.trim() {
            "" => None,
            text => {
                let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").map_err(|_| {
                    TelemedError::Validation(format!("无法解析复诊日期: {}", text))
                })?;
                Some(Timestamp::from_date(date))
            }
        };

        Ok(ConsultationSession {
            notes: self.notes,
            prescription,
            follow_up_date,
            ..session.clone()
        })
    }
}

/// 保存问诊记录
pub async fn save_notes(
    queries: &Queries,
    tracker: &MutationTracker,
    session: &ConsultationSession,
    form: ConsultationNotesForm,
) -> Result<ConsultationSession> {
    let updated = form.apply_to(session)?;
    tracker
        .track(queries.update_consultation(&session.id, updated.clone()))
        .await?;
    Ok(updated)
}

/// 通话控制按钮
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallControls {
    pub video_enabled: bool,
    pub audio_enabled: bool,
}

impl Default for CallControls {
    fn default() -> Self {
        Self {
            video_enabled: true,
            audio_enabled: true,
        }
    }
}

impl CallControls {
    pub fn toggle_video(&mut self) -> bool {
        self.video_enabled = !self.video_enabled;
        self.video_enabled
    }

    pub fn toggle_audio(&mut self) -> bool {
        self.audio_enabled = !self.audio_enabled;
        self.audio_enabled
    }
}

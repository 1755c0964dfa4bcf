//! 患者页面

use serde::{Deserialize, Serialize};
use telemed_core::{generate_id, IdKind, Patient, Result, TelemedError};
use telemed_query::{MutationTracker, Queries};

/// 按姓名过滤患者，忽略大小写；空查询返回全部
pub fn filter_patients(patients: &[Patient], query: &str) -> Vec<Patient> {
    let needle = query.to_lowercase();
    patients
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// 新建患者表单
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPatientForm {
    pub name: String,
    pub age: u64,
    pub medical_history: String,
}

impl NewPatientForm {
    pub fn into_patient(self) -> Result<Patient> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(TelemedError::Validation("请输入患者姓名".to_string()));
        }
        if self.age == 0 {
            return Err(TelemedError::Validation("年龄必须大于 0".to_string()));
        }
        Ok(Patient {
            id: generate_id(IdKind::Patient),
            name: name.to_string(),
            age: self.age,
            medical_history: self.medical_history,
        })
    }
}

/// 患者页面数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientsView {
    pub query: String,
    pub patients: Vec<Patient>,
}

impl PatientsView {
    pub async fn load(queries: &Queries, query: &str) -> Result<Self> {
        let patients = queries.all_patients().await?;
        Ok(Self {
            query: query.to_string(),
            patients: filter_patients(&patients, query),
        })
    }

    /// 列表为空时的提示
    pub fn empty_message(&self) -> &'static str {
        if self.query.is_empty() {
            "No patients yet. Add your first patient to get started."
        } else {
            "No patients found matching your search"
        }
    }
}

/// 新建患者
///
/// 表单校验失败时不发起请求，`tracker` 保持原状态。
pub async fn add_patient(
    queries: &Queries,
    tracker: &MutationTracker,
    form: NewPatientForm,
) -> Result<Patient> {
    let patient = form.into_patient()?;
    tracker
        .track(queries.create_patient(patient.clone()))
        .await?;
    Ok(patient)
}

pub async fn delete_patient(queries: &Queries, tracker: &MutationTracker, id: &str) -> Result<()> {
    tracker.track(queries.delete_patient(id)).await
}

// src/form.rs

//! Home-visit form: payload, wizard navigation and timeline selection.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::status::CanonicalStatus;
use crate::thai_date::parse_iso_date;

pub const DRAFT_KEY: &str = "home_visit_draft";

/// Delay before the wizard moves on after a timeline entry is picked.
pub const AUTO_ADVANCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Step {
    pub part: u8,
    pub id: &'static str,
    pub title: &'static str,
}

pub static STEPS: [Step; 8] = [
    Step { part: 1, id: "general", title: "ข้อมูลทั่วไป" },
    Step { part: 1, id: "patient", title: "ข้อมูลผู้ป่วยและผู้ดูแล" },
    Step { part: 2, id: "condition", title: "ภาวะสุขภาพ" },
    Step { part: 2, id: "surgery", title: "การผ่าตัดและการฝึกพูด" },
    Step { part: 3, id: "family", title: "ครอบครัว" },
    Step { part: 3, id: "environment", title: "สภาพแวดล้อม" },
    Step { part: 4, id: "needs", title: "ความต้องการช่วยเหลือ" },
    Step { part: 4, id: "evidence", title: "หลักฐานการเยี่ยม" },
];

/// Position in [`STEPS`]; only built through [`Wizard::at`] or `default()`,
/// so the index is always in range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Wizard {
    current: usize,
}

impl Wizard {
    pub fn at(part: u8, id: &str) -> Option<Self> {
        STEPS
            .iter()
            .position(|s| s.part == part && s.id == id)
            .map(|current| Self { current })
    }

    pub fn index(&self) -> usize {
        self.current
    }

    pub fn step(&self) -> &'static Step {
        &STEPS[self.current]
    }

    pub fn next(&mut self) -> &'static Step {
        self.current = (self.current + 1).min(STEPS.len() - 1);
        self.step()
    }

    pub fn back(&mut self) -> &'static Step {
        self.current = self.current.saturating_sub(1);
        self.step()
    }

    pub fn is_first(&self) -> bool {
        self.current == 0
    }

    pub fn is_last(&self) -> bool {
        self.current == STEPS.len() - 1
    }
}

/* -------------------------
   Form payload
--------------------------*/

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeVisitForm {
    pub general: GeneralInfo,
    pub patient: CaregiverInfo,
    pub condition: ConditionInfo,
    pub surgery: SurgeryInfo,
    pub speech_therapy: SpeechTherapy,
    pub family: FamilyInfo,
    pub environment: EnvironmentInfo,
    pub needs: NeedsInfo,
    pub evidence: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralInfo {
    pub visit_date: Option<String>,
    pub visitor_name: Option<String>,
    pub visitor_position: Option<String>,
    pub pcu_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaregiverInfo {
    pub caregiver_name: Option<String>,
    pub caregiver_relation: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConditionInfo {
    pub weight_kg: Option<f32>,
    pub height_cm: Option<f32>,
    pub feeding: Option<String>,
    pub symptoms: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurgeryStatus {
    Done,
    Waiting,
    NotPlanned,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurgeryInfo {
    pub status: Option<SurgeryStatus>,
    pub scheduled_date: Option<String>,
    pub done_date: Option<String>,
    pub hospital: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechTherapy {
    pub receiving: bool,
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FamilyInfo {
    pub members: Option<u32>,
    pub monthly_income: Option<String>,
    pub problems: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentInfo {
    pub house_condition: Option<String>,
    pub sanitation: Option<String>,
    pub distance_to_hospital_km: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NeedsInfo {
    pub funding: bool,
    pub transport: bool,
    pub equipment: bool,
    pub other: bool,
    pub other_detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: &'static str,
}

fn blank(v: &Option<String>) -> bool {
    v.as_deref().map(str::trim).is_none_or(str::is_empty)
}

fn bad_date(v: &Option<String>) -> bool {
    blank(v) || v.as_deref().and_then(parse_iso_date).is_none()
}

impl HomeVisitForm {
    /// Checks required fields plus the fields revealed by sibling choices.
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();

        if bad_date(&self.general.visit_date) {
            errors.push(FieldError {
                field: "general.visit_date",
                message: "visit date (YYYY-MM-DD) is required",
            });
        }
        if blank(&self.general.visitor_name) {
            errors.push(FieldError { field: "general.visitor_name", message: "visitor name is required" });
        }

        match self.surgery.status {
            Some(SurgeryStatus::Waiting) if bad_date(&self.surgery.scheduled_date) => {
                errors.push(FieldError {
                    field: "surgery.scheduled_date",
                    message: "scheduled date is required while waiting for surgery",
                });
            }
            Some(SurgeryStatus::Done) if bad_date(&self.surgery.done_date) => {
                errors.push(FieldError {
                    field: "surgery.done_date",
                    message: "surgery date is required",
                });
            }
            _ => {}
        }

        if self.speech_therapy.receiving && blank(&self.speech_therapy.provider) {
            errors.push(FieldError {
                field: "speech_therapy.provider",
                message: "provider is required when receiving speech therapy",
            });
        }

        if self.needs.other && blank(&self.needs.other_detail) {
            errors.push(FieldError { field: "needs.other_detail", message: "describe the other need" });
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/* -------------------------
   Draft snapshot
--------------------------*/

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub step: String,
    pub visit_date: Option<String>,
    pub visitor_name: Option<String>,
    pub notes: Option<String>,
    pub evidence: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormError {
    #[error("drafts can only be saved from the evidence step, not '{0}'")]
    DraftOutsideEvidence(&'static str),
    #[error("status {0} cannot be picked from the visit timeline")]
    NotSelectable(CanonicalStatus),
    #[error("only a WaitVisit selection needs confirmation, got {0}")]
    NothingToConfirm(CanonicalStatus),
}

impl DraftSnapshot {
    pub fn capture(wizard: &Wizard, form: &HomeVisitForm) -> Result<Self, FormError> {
        let step = wizard.step();
        if step.id != "evidence" {
            return Err(FormError::DraftOutsideEvidence(step.id));
        }
        Ok(Self {
            step: step.id.to_string(),
            visit_date: form.general.visit_date.clone(),
            visitor_name: form.general.visitor_name.clone(),
            notes: form.notes.clone(),
            evidence: form.evidence.clone(),
        })
    }
}

/* -------------------------
   Timeline selection
--------------------------*/

/// Statuses a PCU worker can pick from the visit timeline to start a form.
pub const SELECTABLE: [CanonicalStatus; 2] = [CanonicalStatus::Pending, CanonicalStatus::WaitVisit];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Selection {
    /// Ask the user before opening the form.
    NeedsConfirmation,
    /// Open the form after the auto-advance delay.
    Proceed { advance_after_ms: u64, first_step: &'static str },
}

impl Selection {
    fn proceed() -> Self {
        Selection::Proceed {
            advance_after_ms: AUTO_ADVANCE.as_millis() as u64,
            first_step: STEPS[0].id,
        }
    }
}

pub fn select_timeline_entry(status: CanonicalStatus) -> Result<Selection, FormError> {
    match status {
        CanonicalStatus::WaitVisit => Ok(Selection::NeedsConfirmation),
        s if SELECTABLE.contains(&s) => Ok(Selection::proceed()),
        s => Err(FormError::NotSelectable(s)),
    }
}

pub fn confirm_selection(status: CanonicalStatus) -> Result<Selection, FormError> {
    match status {
        CanonicalStatus::WaitVisit => Ok(Selection::proceed()),
        s => Err(FormError::NothingToConfirm(s)),
    }
}

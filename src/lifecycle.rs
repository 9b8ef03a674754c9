// src/lifecycle.rs

//! Home-visit lifecycle.
//!
//! ```text
//! Pending ──accept──▶ Accepted ─┬─schedule──▶ WaitVisit ──submit──▶ Completed ◀┐
//!    │                InProgress┼─not_home──▶ NotHome                    │      │
//!    └──reject──▶ Rejected      └─not_allowed▶ NotAllowed           reopen/submit
//! ```
//!
//! Every transition is tied to the roles allowed to trigger it. Anything not
//! in [`TRANSITIONS`] is refused.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::form::{FieldError, HomeVisitForm};
use crate::models::{CareRole, HomeVisitRecord};
use crate::status::CanonicalStatus::{self, *};
use crate::thai_date::parse_iso_date;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitAction {
    Accept,
    Reject,
    Schedule,
    NotHome,
    NotAllowed,
    Submit,
    Reopen,
}

#[derive(Debug, Clone)]
pub enum VisitCommand {
    Accept,
    Reject { reason: String },
    Schedule { date: String, time: Option<String> },
    NotHome { reason: String },
    NotAllowed { reason: Option<String> },
    Submit { form: Box<HomeVisitForm> },
    Reopen,
}

impl VisitCommand {
    pub fn action(&self) -> VisitAction {
        match self {
            VisitCommand::Accept => VisitAction::Accept,
            VisitCommand::Reject { .. } => VisitAction::Reject,
            VisitCommand::Schedule { .. } => VisitAction::Schedule,
            VisitCommand::NotHome { .. } => VisitAction::NotHome,
            VisitCommand::NotAllowed { .. } => VisitAction::NotAllowed,
            VisitCommand::Submit { .. } => VisitAction::Submit,
            VisitCommand::Reopen => VisitAction::Reopen,
        }
    }
}

pub struct Rule {
    pub action: VisitAction,
    pub from: &'static [CanonicalStatus],
    /// Required value of the record's `editable` flag, if any.
    pub editable: Option<bool>,
    pub to: CanonicalStatus,
    pub roles: &'static [CareRole],
}

pub const TRANSITIONS: &[Rule] = &[
    Rule { action: VisitAction::Accept, from: &[Pending], editable: None, to: Accepted, roles: &[CareRole::Pcu] },
    Rule { action: VisitAction::Reject, from: &[Pending], editable: None, to: Rejected, roles: &[CareRole::Pcu] },
    Rule {
        action: VisitAction::Schedule,
        from: &[Accepted, InProgress],
        editable: None,
        to: WaitVisit,
        roles: &[CareRole::Pcu],
    },
    Rule {
        action: VisitAction::NotHome,
        from: &[Accepted, InProgress],
        editable: None,
        to: NotHome,
        roles: &[CareRole::Pcu],
    },
    Rule {
        action: VisitAction::NotAllowed,
        from: &[Accepted, InProgress],
        editable: None,
        to: NotAllowed,
        roles: &[CareRole::Pcu],
    },
    Rule { action: VisitAction::Submit, from: &[WaitVisit], editable: None, to: Completed, roles: &[CareRole::Pcu] },
    Rule {
        action: VisitAction::Submit,
        from: &[Completed],
        editable: Some(true),
        to: Completed,
        roles: &[CareRole::Pcu],
    },
    Rule {
        action: VisitAction::Reopen,
        from: &[Completed],
        editable: Some(false),
        to: Completed,
        roles: &[CareRole::Pcu, CareRole::Cm],
    },
];

#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("cannot {action:?} a visit in status {from}")]
    Illegal { from: CanonicalStatus, action: VisitAction },
    #[error("role {role:?} may not {action:?} a visit")]
    Forbidden { role: CareRole, action: VisitAction },
    #[error("a reason is required to {0:?}")]
    ReasonRequired(VisitAction),
    #[error("schedule date must be YYYY-MM-DD, got '{0}'")]
    BadScheduleDate(String),
    #[error("home visit form is incomplete")]
    InvalidForm(Vec<FieldError>),
}

fn rules_from(status: CanonicalStatus, editable: bool) -> impl Iterator<Item = &'static Rule> {
    TRANSITIONS
        .iter()
        .filter(move |r| r.from.contains(&status) && r.editable.is_none_or(|e| e == editable))
}

/// Actions the caller may take right now, i.e. the buttons to show.
pub fn available_actions(status: CanonicalStatus, editable: bool, role: CareRole) -> Vec<VisitAction> {
    let mut out: Vec<VisitAction> = Vec::new();
    for rule in rules_from(status, editable).filter(|r| r.roles.contains(&role)) {
        if !out.contains(&rule.action) {
            out.push(rule.action);
        }
    }
    out
}

fn required(reason: String, action: VisitAction) -> Result<String, TransitionError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(TransitionError::ReasonRequired(action));
    }
    Ok(reason.to_string())
}

/// Apply `cmd` to `visit`. Nothing is modified when an error is returned.
pub fn apply(
    visit: &mut HomeVisitRecord,
    role: CareRole,
    cmd: VisitCommand,
    now: DateTime<Utc>,
) -> Result<CanonicalStatus, TransitionError> {
    let action = cmd.action();
    let from = visit.status;

    let rule = rules_from(from, visit.editable)
        .find(|r| r.action == action)
        .ok_or(TransitionError::Illegal { from, action })?;
    if !rule.roles.contains(&role) {
        return Err(TransitionError::Forbidden { role, action });
    }

    match cmd {
        VisitCommand::Accept => {}
        VisitCommand::Reject { reason } | VisitCommand::NotHome { reason } => {
            visit.reason = Some(required(reason, action)?);
        }
        VisitCommand::NotAllowed { reason } => {
            visit.reason = reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty());
        }
        VisitCommand::Schedule { date, time } => {
            if parse_iso_date(&date).is_none() {
                return Err(TransitionError::BadScheduleDate(date));
            }
            let at = match time.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                Some(t) => format!("{} {t}", date.trim()),
                None => date.trim().to_string(),
            };
            visit.scheduled_at = Some(at);
        }
        VisitCommand::Submit { form } => {
            form.validate().map_err(TransitionError::InvalidForm)?;
            visit.data = Some(*form);
            visit.editable = false;
        }
        VisitCommand::Reopen => {
            visit.editable = true;
        }
    }

    visit.status = rule.to;
    visit.raw_status = rule.to.as_str().to_string();
    visit.updated_at = now;

    tracing::info!(
        visit_id = %visit.id,
        hn = %visit.hn,
        role = role.as_str(),
        ?action,
        %from,
        to = %rule.to,
        "visit transition"
    );
    Ok(rule.to)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::GeneralInfo;
    use crate::models::VisitType;
    use uuid::Uuid;

    fn visit(status: CanonicalStatus) -> HomeVisitRecord {
        HomeVisitRecord {
            id: Uuid::new_v4(),
            hn: "HN001".into(),
            raw_status: status.as_str().into(),
            status,
            visit_type: VisitType::Joint,
            date: "2025-12-01".into(),
            requested_by: None,
            pcu_name: None,
            scheduled_at: None,
            reason: None,
            data: None,
            editable: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn form() -> Box<HomeVisitForm> {
        Box::new(HomeVisitForm {
            general: GeneralInfo {
                visit_date: Some("2025-12-10".into()),
                visitor_name: Some("พยาบาลวิภา".into()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    #[test]
    fn happy_path_to_completed() {
        let mut v = visit(Pending);
        let now = Utc::now();
        assert_eq!(apply(&mut v, CareRole::Pcu, VisitCommand::Accept, now), Ok(Accepted));
        assert_eq!(
            apply(
                &mut v,
                CareRole::Pcu,
                VisitCommand::Schedule { date: "2025-12-10".into(), time: Some("10:00".into()) },
                now
            ),
            Ok(WaitVisit)
        );
        assert_eq!(v.scheduled_at.as_deref(), Some("2025-12-10 10:00"));
        assert_eq!(apply(&mut v, CareRole::Pcu, VisitCommand::Submit { form: form() }, now), Ok(Completed));
        assert!(v.data.is_some());
        assert_eq!(v.raw_status, "Completed");
    }

    #[test]
    fn reject_requires_reason() {
        let mut v = visit(Pending);
        let err = apply(&mut v, CareRole::Pcu, VisitCommand::Reject { reason: "  ".into() }, Utc::now());
        assert_eq!(err, Err(TransitionError::ReasonRequired(VisitAction::Reject)));
        assert_eq!(v.status, Pending);

        apply(&mut v, CareRole::Pcu, VisitCommand::Reject { reason: "นอกเขต".into() }, Utc::now()).unwrap();
        assert_eq!(v.status, Rejected);
        assert_eq!(v.reason.as_deref(), Some("นอกเขต"));
    }

    #[test]
    fn illegal_and_forbidden_moves_are_refused() {
        let mut v = visit(Pending);
        assert_eq!(
            apply(&mut v, CareRole::Pcu, VisitCommand::Submit { form: form() }, Utc::now()),
            Err(TransitionError::Illegal { from: Pending, action: VisitAction::Submit })
        );
        assert_eq!(
            apply(&mut v, CareRole::Cm, VisitCommand::Accept, Utc::now()),
            Err(TransitionError::Forbidden { role: CareRole::Cm, action: VisitAction::Accept })
        );
        assert_eq!(v.status, Pending);
    }

    #[test]
    fn in_progress_can_end_not_home() {
        let mut v = visit(InProgress);
        assert_eq!(
            apply(&mut v, CareRole::Pcu, VisitCommand::NotHome { reason: "ไปทำงานต่างจังหวัด".into() }, Utc::now()),
            Ok(NotHome)
        );
        let mut v = visit(Accepted);
        assert_eq!(
            apply(&mut v, CareRole::Pcu, VisitCommand::NotAllowed { reason: None }, Utc::now()),
            Ok(NotAllowed)
        );
        assert_eq!(v.reason, None);
    }

    #[test]
    fn invalid_form_keeps_wait_visit() {
        let mut v = visit(WaitVisit);
        let res = apply(&mut v, CareRole::Pcu, VisitCommand::Submit { form: Box::default() }, Utc::now());
        assert!(matches!(res, Err(TransitionError::InvalidForm(ref errs)) if errs.len() == 2));
        assert_eq!(v.status, WaitVisit);
        assert!(v.data.is_none());
    }

    #[test]
    fn completed_reopens_for_edit() {
        let mut v = visit(Completed);
        assert_eq!(available_actions(Completed, false, CareRole::Cm), vec![VisitAction::Reopen]);
        apply(&mut v, CareRole::Cm, VisitCommand::Reopen, Utc::now()).unwrap();
        assert!(v.editable);
        assert_eq!(available_actions(Completed, true, CareRole::Pcu), vec![VisitAction::Submit]);

        apply(&mut v, CareRole::Pcu, VisitCommand::Submit { form: form() }, Utc::now()).unwrap();
        assert!(!v.editable);
        assert_eq!(v.status, Completed);
    }

    #[test]
    fn buttons_per_role() {
        assert_eq!(
            available_actions(Pending, false, CareRole::Pcu),
            vec![VisitAction::Accept, VisitAction::Reject]
        );
        assert!(available_actions(Pending, false, CareRole::Scfc).is_empty());
        assert_eq!(
            available_actions(Accepted, false, CareRole::Pcu),
            vec![VisitAction::Schedule, VisitAction::NotHome, VisitAction::NotAllowed]
        );
        assert!(available_actions(Rejected, false, CareRole::Pcu).is_empty());
    }
}

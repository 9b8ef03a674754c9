use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::form::HomeVisitForm;
use crate::status::{CanonicalStatus, StatusNormalizer};
use crate::store::{CareStore, Collection, Record};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<CareStore>,
    pub normalizer: Arc<StatusNormalizer>,
    pub reference_date: NaiveDate,
}

/* -------------------------
   Roles
--------------------------*/

/// Who is calling. Sent by the front-end in `X-Care-Role`; not verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CareRole {
    /// Case Manager: creates and tracks requests
    Cm,
    /// Primary Care Unit: accepts and performs home visits
    Pcu,
    /// Satellite clinic / field coordinator: dashboards and GIS
    Scfc,
}

impl CareRole {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cm" => Some(CareRole::Cm),
            "pcu" => Some(CareRole::Pcu),
            "scfc" => Some(CareRole::Scfc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CareRole::Cm => "cm",
            CareRole::Pcu => "pcu",
            CareRole::Scfc => "scfc",
        }
    }
}

/* -------------------------
   Records
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Patient {
    pub id: Uuid,
    pub hn: String,
    pub cid: String,
    pub name: String,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub diagnosis: String,
    pub treatment_plan: Vec<String>,
    pub hospital: String,
    pub responsible_health_center: String,
    pub insurance_right: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub location: Option<GeoPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VisitType {
    Joint,
    Delegated,
}

impl VisitType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "joint" => Some(VisitType::Joint),
            "delegated" => Some(VisitType::Delegated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomeVisitRecord {
    pub id: Uuid,
    pub hn: String,
    pub raw_status: String,
    pub status: CanonicalStatus,
    pub visit_type: VisitType,
    pub date: String,
    pub requested_by: Option<String>,
    pub pcu_name: Option<String>,
    pub scheduled_at: Option<String>,
    pub reason: Option<String>,
    pub data: Option<HomeVisitForm>,
    pub editable: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRecord {
    pub id: Uuid,
    pub hn: String,
    pub from_hospital: String,
    pub to_hospital: String,
    pub reason: Option<String>,
    pub raw_status: String,
    pub status: CanonicalStatus,
    pub date: String,
}

/// Upper bound for a single fund request, in baht.
pub const MAX_FUND_AMOUNT: i64 = 10_000_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundRequest {
    pub id: Uuid,
    pub hn: String,
    pub category: String,
    pub amount: i64,
    pub description: Option<String>,
    pub raw_status: String,
    pub status: CanonicalStatus,
    pub requested_at: String,
    pub decision_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub hn: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub purpose: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeleConsult {
    pub id: Uuid,
    pub hn: String,
    pub date: String,
    pub specialist: String,
    pub channel: Option<String>,
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub hn: String,
    pub author_role: CareRole,
    pub author_name: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

macro_rules! impl_record {
    ($ty:ty, $collection:expr) => {
        impl Record for $ty {
            const COLLECTION: Collection = $collection;
            fn id(&self) -> Uuid {
                self.id
            }
        }
    };
}

impl_record!(Patient, Collection::Patients);
impl_record!(HomeVisitRecord, Collection::HomeVisits);
impl_record!(ReferralRecord, Collection::Referrals);
impl_record!(FundRequest, Collection::FundRequests);
impl_record!(Appointment, Collection::Appointments);
impl_record!(TeleConsult, Collection::TeleConsults);
impl_record!(ChatMessage, Collection::ChatMessages);

/* -------------------------
   API DTOs
--------------------------*/

#[derive(Debug, Serialize)]
pub struct ApiOk<T> {
    pub data: T,
}

/// Brief patient reference embedded in list rows; `-` when the hn is unknown.
#[derive(Debug, Serialize)]
pub struct PatientBrief {
    pub hn: String,
    pub name: String,
}

impl PatientBrief {
    pub fn lookup(patients: &[Patient], hn: &str) -> Self {
        let name = patients
            .iter()
            .find(|p| p.hn == hn)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| crate::thai_date::PLACEHOLDER.to_string());
        Self { hn: hn.to_string(), name }
    }
}

/// Query-string flag `?locale=en`; Thai otherwise.
#[derive(Debug, Default, Deserialize)]
pub struct LocaleQuery {
    pub locale: Option<crate::status::Locale>,
}

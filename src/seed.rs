// src/seed.rs

//! Start-up dataset.
//!
//! The seed is a loosely typed JSON literal keyed by `hn`. Loading turns each
//! raw entry into a typed record, resolving free-text statuses through the
//! shared normalizer while keeping the raw token alongside.

use std::path::Path;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use uuid::Uuid;

use crate::form::HomeVisitForm;
use crate::models::{
    Appointment, FundRequest, GeoPoint, HomeVisitRecord, MAX_FUND_AMOUNT, Patient, ReferralRecord,
    TeleConsult, VisitType,
};
use crate::status::{CanonicalStatus, StatusNormalizer};
use crate::store::{CareStore, Collection, Repository};

pub const BUILTIN_SEED: &str = include_str!("../data/seed.json");

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("cannot read seed file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("seed is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SeedData {
    pub patients: Vec<RawPatient>,
    pub home_visits: Vec<RawVisit>,
    pub referrals: Vec<RawReferral>,
    pub funds: Vec<RawFund>,
    pub appointments: Vec<RawAppointment>,
    pub tele_consults: Vec<RawTeleConsult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawPatient {
    pub hn: String,
    pub cid: String,
    pub name: String,
    pub dob: Option<String>,
    pub gender: Option<String>,
    pub diagnosis: String,
    pub treatment_plan: Vec<String>,
    pub hospital: String,
    pub responsible_health_center: String,
    pub rights: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub district: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawVisit {
    pub hn: String,
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub visit_type: Option<String>,
    pub date: String,
    pub requested_by: Option<String>,
    pub pcu_name: Option<String>,
    pub scheduled_at: Option<String>,
    pub reason: Option<String>,
    pub data: Option<HomeVisitForm>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawReferral {
    pub hn: String,
    pub from: String,
    pub to: String,
    pub reason: Option<String>,
    pub status: Option<String>,
    pub date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawFund {
    pub hn: String,
    pub category: String,
    pub amount: i64,
    pub description: Option<String>,
    pub status: Option<String>,
    pub date: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawAppointment {
    pub hn: String,
    pub date: String,
    pub time: String,
    pub location: String,
    pub purpose: Option<String>,
    pub note: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawTeleConsult {
    pub hn: String,
    pub date: String,
    pub specialist: String,
    pub channel: Option<String>,
    pub summary: Option<String>,
}

impl SeedData {
    pub fn parse(json: &str) -> Result<Self, SeedError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn builtin() -> Result<Self, SeedError> {
        Self::parse(BUILTIN_SEED)
    }

    /// Every raw status token in the seed with the collection it came from.
    pub fn status_tokens(&self) -> Vec<(Collection, Option<&str>)> {
        let visits = self.home_visits.iter().map(|v| (Collection::HomeVisits, v.status.as_deref()));
        let referrals = self.referrals.iter().map(|r| (Collection::Referrals, r.status.as_deref()));
        let funds = self.funds.iter().map(|f| (Collection::FundRequests, f.status.as_deref()));
        visits.chain(referrals).chain(funds).collect()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub patients: usize,
    pub visits: usize,
    pub referrals: usize,
    pub funds: usize,
    pub appointments: usize,
    pub teleconsults: usize,
    /// status tokens that fell back to the default
    pub unmatched_statuses: usize,
    /// fund rows dropped for an amount outside 1..=MAX_FUND_AMOUNT
    pub skipped_funds: usize,
}

fn resolve(
    normalizer: &StatusNormalizer,
    raw: Option<String>,
    unmatched: &mut usize,
) -> (String, CanonicalStatus) {
    let n = normalizer.normalize(raw.as_deref());
    if !n.matched {
        *unmatched += 1;
    }
    (raw.unwrap_or_default(), n.status)
}

pub async fn load(store: &CareStore, normalizer: &StatusNormalizer, seed: SeedData) -> SeedSummary {
    let mut summary = SeedSummary::default();
    let now = Utc::now();

    for p in seed.patients {
        let location = match (p.lat, p.lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        };
        store
            .patients
            .insert(Patient {
                id: Uuid::new_v4(),
                hn: p.hn,
                cid: p.cid,
                name: p.name,
                dob: p.dob,
                gender: p.gender,
                diagnosis: p.diagnosis,
                treatment_plan: p.treatment_plan,
                hospital: p.hospital,
                responsible_health_center: p.responsible_health_center,
                insurance_right: p.rights,
                phone: p.phone,
                address: p.address,
                district: p.district,
                location,
            })
            .await;
        summary.patients += 1;
    }

    for v in seed.home_visits {
        let visit_type = match v.visit_type.as_deref().and_then(VisitType::parse) {
            Some(t) => t,
            None => {
                tracing::warn!(hn = %v.hn, raw = ?v.visit_type, "unknown visit type, using Joint");
                VisitType::Joint
            }
        };
        let (raw_status, status) = resolve(normalizer, v.status, &mut summary.unmatched_statuses);
        store
            .visits
            .insert(HomeVisitRecord {
                id: Uuid::new_v4(),
                hn: v.hn,
                raw_status,
                status,
                visit_type,
                date: v.date,
                requested_by: v.requested_by,
                pcu_name: v.pcu_name,
                scheduled_at: v.scheduled_at,
                reason: v.reason,
                data: v.data,
                editable: false,
                created_at: now,
                updated_at: now,
            })
            .await;
        summary.visits += 1;
    }

    for r in seed.referrals {
        let (raw_status, status) = resolve(normalizer, r.status, &mut summary.unmatched_statuses);
        store
            .referrals
            .insert(ReferralRecord {
                id: Uuid::new_v4(),
                hn: r.hn,
                from_hospital: r.from,
                to_hospital: r.to,
                reason: r.reason,
                raw_status,
                status,
                date: r.date,
            })
            .await;
        summary.referrals += 1;
    }

    for f in seed.funds {
        if !(1..=MAX_FUND_AMOUNT).contains(&f.amount) {
            tracing::warn!(hn = %f.hn, amount = f.amount, "fund amount out of range, skipping");
            summary.skipped_funds += 1;
            continue;
        }
        let (raw_status, status) = resolve(normalizer, f.status, &mut summary.unmatched_statuses);
        store
            .funds
            .insert(FundRequest {
                id: Uuid::new_v4(),
                hn: f.hn,
                category: f.category,
                amount: f.amount,
                description: f.description,
                raw_status,
                status,
                requested_at: f.date,
                decision_note: None,
            })
            .await;
        summary.funds += 1;
    }

    for a in seed.appointments {
        store
            .appointments
            .insert(Appointment {
                id: Uuid::new_v4(),
                hn: a.hn,
                date: a.date,
                time: a.time,
                location: a.location,
                purpose: a.purpose,
                note: a.note,
            })
            .await;
        summary.appointments += 1;
    }

    for t in seed.tele_consults {
        store
            .teleconsults
            .insert(TeleConsult {
                id: Uuid::new_v4(),
                hn: t.hn,
                date: t.date,
                specialist: t.specialist,
                channel: t.channel,
                summary: t.summary,
            })
            .await;
        summary.teleconsults += 1;
    }

    if summary.unmatched_statuses > 0 {
        tracing::warn!(count = summary.unmatched_statuses, "seed contains unrecognised status tokens");
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn out_of_range_fund_amounts_are_skipped() {
        let seed = SeedData::parse(
            r#"{ "funds": [
                { "hn": "HN1", "category": "travel", "amount": 9223372036854775807, "status": "pending", "date": "2025-11-01" },
                { "hn": "HN1", "category": "travel", "amount": 0, "status": "pending", "date": "2025-11-01" },
                { "hn": "HN1", "category": "food", "amount": 500, "status": "pending", "date": "2025-11-02" }
            ] }"#,
        )
        .unwrap();
        let store = CareStore::new(8);
        let summary = load(&store, &StatusNormalizer::default(), seed).await;

        assert_eq!(summary.funds, 1);
        assert_eq!(summary.skipped_funds, 2);
        assert_eq!(store.funds.list().await[0].record.amount, 500);
    }

    #[test]
    fn every_builtin_status_token_is_recognised() {
        let seed = SeedData::builtin().expect("builtin seed parses");
        let normalizer = StatusNormalizer::default();
        for (collection, token) in seed.status_tokens() {
            let n = normalizer.normalize(token);
            assert!(n.matched, "{collection:?} token {token:?} fell back to {}", n.status);
            assert!(CanonicalStatus::ALL.contains(&n.status));
        }
    }

    #[tokio::test]
    async fn load_builds_typed_records() {
        let store = CareStore::new(64);
        let normalizer = StatusNormalizer::default();
        let summary = load(&store, &normalizer, SeedData::builtin().unwrap()).await;

        assert_eq!(summary.patients, 6);
        assert_eq!(summary.visits, 12);
        assert_eq!(summary.unmatched_statuses, 0);

        let on_site = store
            .visits
            .find(|v| v.raw_status == "อยู่ในพื้นที่")
            .await
            .expect("seeded");
        assert_eq!(on_site.record.status, CanonicalStatus::Completed);

        let with_form = store.visits.find(|v| v.data.is_some()).await.unwrap();
        assert!(with_form.record.data.unwrap().validate().is_ok());

        let no_location = store.patient_by_hn("HN630500").await.unwrap();
        assert!(no_location.record.location.is_none());
    }

    #[tokio::test]
    async fn unknown_tokens_are_counted_not_fatal() {
        let seed = SeedData::parse(
            r#"{ "homeVisits": [ { "hn": "HN1", "status": "lost", "type": "weird", "date": "2025-01-01" } ] }"#,
        )
        .unwrap();
        let store = CareStore::new(8);
        let summary = load(&store, &StatusNormalizer::default(), seed).await;
        assert_eq!(summary.unmatched_statuses, 1);

        let v = store.visits.list().await.remove(0).record;
        assert_eq!(v.status, CanonicalStatus::Pending);
        assert_eq!(v.visit_type, VisitType::Joint);
        assert_eq!(v.raw_status, "lost");
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(SeedData::parse("{ nope"), Err(SeedError::Json(_))));
        assert!(matches!(
            SeedData::from_path("/definitely/not/here.json"),
            Err(SeedError::Io { .. })
        ));
    }
}

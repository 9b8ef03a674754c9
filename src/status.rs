// src/status.rs

//! Canonical status vocabulary for home visits, referrals and fund requests.
//!
//! Raw status strings arrive from seed data and from clients as English
//! enum-like tokens, Thai free text and legacy synonyms. Everything that needs
//! a status goes through [`StatusNormalizer`] so there is exactly one mapping.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CanonicalStatus {
    Pending,
    Accepted,
    WaitVisit,
    InProgress,
    Completed,
    Rejected,
    NotHome,
    NotAllowed,
}

impl CanonicalStatus {
    pub const ALL: [CanonicalStatus; 8] = [
        CanonicalStatus::Pending,
        CanonicalStatus::Accepted,
        CanonicalStatus::WaitVisit,
        CanonicalStatus::InProgress,
        CanonicalStatus::Completed,
        CanonicalStatus::Rejected,
        CanonicalStatus::NotHome,
        CanonicalStatus::NotAllowed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalStatus::Pending => "Pending",
            CanonicalStatus::Accepted => "Accepted",
            CanonicalStatus::WaitVisit => "WaitVisit",
            CanonicalStatus::InProgress => "InProgress",
            CanonicalStatus::Completed => "Completed",
            CanonicalStatus::Rejected => "Rejected",
            CanonicalStatus::NotHome => "NotHome",
            CanonicalStatus::NotAllowed => "NotAllowed",
        }
    }

    pub fn label(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::Th => match self {
                CanonicalStatus::Pending => "รอการตอบรับ",
                CanonicalStatus::Accepted => "ตอบรับแล้ว",
                CanonicalStatus::WaitVisit => "รอลงเยี่ยม",
                CanonicalStatus::InProgress => "กำลังดำเนินการ",
                CanonicalStatus::Completed => "เสร็จสิ้น",
                CanonicalStatus::Rejected => "ปฏิเสธ",
                CanonicalStatus::NotHome => "ไม่อยู่บ้าน",
                CanonicalStatus::NotAllowed => "ไม่อนุญาตให้เยี่ยม",
            },
            Locale::En => match self {
                CanonicalStatus::Pending => "Pending",
                CanonicalStatus::Accepted => "Accepted",
                CanonicalStatus::WaitVisit => "Waiting for visit",
                CanonicalStatus::InProgress => "In progress",
                CanonicalStatus::Completed => "Completed",
                CanonicalStatus::Rejected => "Rejected",
                CanonicalStatus::NotHome => "Not at home",
                CanonicalStatus::NotAllowed => "Visit not allowed",
            },
        }
    }

    /// CSS classes for the status badge.
    pub fn badge_class(&self) -> &'static str {
        match self {
            CanonicalStatus::Pending => "bg-yellow-100 text-yellow-700",
            CanonicalStatus::Accepted => "bg-blue-100 text-blue-700",
            CanonicalStatus::WaitVisit => "bg-orange-100 text-orange-700",
            CanonicalStatus::InProgress => "bg-indigo-100 text-indigo-700",
            CanonicalStatus::Completed => "bg-green-100 text-green-700",
            CanonicalStatus::Rejected => "bg-red-100 text-red-700",
            CanonicalStatus::NotHome => "bg-gray-100 text-gray-700",
            CanonicalStatus::NotAllowed => "bg-rose-100 text-rose-700",
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            CanonicalStatus::Rejected | CanonicalStatus::NotHome | CanonicalStatus::NotAllowed
        )
    }

    /// Which of the timeline steps (Requested, Accepted, Scheduled, Visited)
    /// are lit for this status.
    pub fn timeline(&self) -> TimelineHighlight {
        let reached = match self {
            CanonicalStatus::Pending | CanonicalStatus::Rejected => 1,
            CanonicalStatus::Accepted
            | CanonicalStatus::InProgress
            | CanonicalStatus::NotHome
            | CanonicalStatus::NotAllowed => 2,
            CanonicalStatus::WaitVisit => 3,
            CanonicalStatus::Completed => 4,
        };
        let failed = self.is_failure();

        let steps = TIMELINE_STEPS
            .into_iter()
            .enumerate()
            .map(|(i, name)| TimelineStep {
                name,
                reached: i < reached,
                failed: failed && i + 1 == reached,
            })
            .collect();

        TimelineHighlight { reached, failed, steps }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Th,
    En,
}

pub const TIMELINE_STEPS: [&str; 4] = ["requested", "accepted", "scheduled", "visited"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineStep {
    pub name: &'static str,
    pub reached: bool,
    pub failed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineHighlight {
    pub reached: usize,
    pub failed: bool,
    pub steps: Vec<TimelineStep>,
}

/// Everything a screen needs to render one status.
#[derive(Debug, Clone, Serialize)]
pub struct StatusView {
    pub status: CanonicalStatus,
    pub label: &'static str,
    pub badge_class: &'static str,
    pub timeline: TimelineHighlight,
}

impl StatusView {
    pub fn new(status: CanonicalStatus, locale: Locale) -> Self {
        Self {
            status,
            label: status.label(locale),
            badge_class: status.badge_class(),
            timeline: status.timeline(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Normalized {
    pub status: CanonicalStatus,
    /// false when no synonym set matched and the default was used
    pub matched: bool,
}

// "อยู่ในพื้นที่" sits under Completed as observed in the visit detail screen.
// It reads like an on-site state; kept pending product confirmation.
const SYNONYMS: &[(CanonicalStatus, &[&str])] = &[
    (
        CanonicalStatus::Pending,
        &["pending", "waiting", "new", "request", "requested", "รอดำเนินการ", "รอการตอบรับ", "รอตอบรับ"],
    ),
    (
        CanonicalStatus::Accepted,
        &["accepted", "accept", "approved", "approve", "รับเรื่อง", "ตอบรับแล้ว", "อนุมัติ"],
    ),
    (
        CanonicalStatus::WaitVisit,
        &["waitvisit", "wait_visit", "wait visit", "scheduled", "รอเยี่ยม", "รอลงเยี่ยม", "นัดหมายแล้ว"],
    ),
    (
        CanonicalStatus::InProgress,
        &["inprogress", "in_progress", "in progress", "processing", "ongoing", "กำลังดำเนินการ"],
    ),
    (
        CanonicalStatus::Completed,
        &["completed", "complete", "done", "success", "เสร็จสิ้น", "visited", "อยู่ในพื้นที่"],
    ),
    (
        CanonicalStatus::Rejected,
        &["rejected", "reject", "denied", "cancelled", "canceled", "ปฏิเสธ", "ยกเลิก"],
    ),
    (
        CanonicalStatus::NotHome,
        &["nothome", "not_home", "not home", "ไม่อยู่บ้าน", "ไม่พบผู้ป่วย"],
    ),
    (
        CanonicalStatus::NotAllowed,
        &["notallowed", "not_allowed", "not allowed", "refused", "ไม่อนุญาต", "ไม่อนุญาตให้เยี่ยม"],
    ),
];

/// Maps raw status tokens to [`CanonicalStatus`].
///
/// Every synonym set is checked in order and a later match overrides an
/// earlier one, so a token listed under two states resolves to the one
/// declared last. Unmatched input resolves to `Pending`.
#[derive(Debug, Clone)]
pub struct StatusNormalizer {
    table: Vec<(CanonicalStatus, Vec<String>)>,
}

impl Default for StatusNormalizer {
    fn default() -> Self {
        Self::with_synonyms(
            SYNONYMS
                .iter()
                .map(|(status, words)| (*status, words.iter().map(|w| w.to_string()).collect())),
        )
    }
}

impl StatusNormalizer {
    pub fn with_synonyms<I>(table: I) -> Self
    where
        I: IntoIterator<Item = (CanonicalStatus, Vec<String>)>,
    {
        let table = table
            .into_iter()
            .map(|(status, words)| {
                let words = words.into_iter().map(|w| fold(&w)).collect();
                (status, words)
            })
            .collect();
        Self { table }
    }

    pub fn normalize(&self, raw: Option<&str>) -> Normalized {
        let token = fold(raw.unwrap_or_default());

        let mut found = None;
        if !token.is_empty() {
            for (status, words) in &self.table {
                if words.iter().any(|w| *w == token) {
                    found = Some(*status);
                }
            }
        }

        match found {
            Some(status) => Normalized { status, matched: true },
            None => {
                tracing::debug!(raw = ?raw, "status token not recognised, defaulting to Pending");
                Normalized { status: CanonicalStatus::Pending, matched: false }
            }
        }
    }

    pub fn canonical(&self, raw: &str) -> CanonicalStatus {
        self.normalize(Some(raw)).status
    }

    /// Like [`canonical`](Self::canonical) but `None` instead of the default.
    pub fn recognise(&self, raw: &str) -> Option<CanonicalStatus> {
        let n = self.normalize(Some(raw));
        n.matched.then_some(n.status)
    }
}

fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Shorthand using the built-in synonym table.
pub fn normalize(raw: Option<&str>) -> CanonicalStatus {
    StatusNormalizer::default().normalize(raw).status
}

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use cleftcare::{build_state, config::Config, routes};

async fn app() -> Router {
    let cfg = Config::from_lookup(|_| None).expect("default config");
    let state = build_state(&cfg).await.expect("builtin seed loads");
    routes::router(state)
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    role: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(role) = role {
        req = req.header("x-care-role", role);
    }
    let req = match body {
        Some(b) => req
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = res.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Percent-encode a query value; Thai text is not valid in a raw URI.
fn enc(s: &str) -> String {
    s.bytes()
        .map(|b| {
            if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
                (b as char).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect()
}

async fn first_visit_id(app: &Router, query: &str) -> String {
    let (status, body) = call(app, "GET", &format!("/api/v1/visits?{query}"), Some("pcu"), None).await;
    assert_eq!(status, StatusCode::OK);
    body["data"][0]["id"].as_str().expect("a matching visit").to_string()
}

#[tokio::test]
async fn role_header_is_required() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/home", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "ROLE_REQUIRED");

    let (status, _) = call(&app, "GET", "/home", Some("doctor"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn home_counts_seeded_statuses() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/home", Some("scfc"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["view"], "field_coordinator");
    assert_eq!(body["data"]["patients"], 6);

    let completed = body["data"]["visits_by_status"]
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["status"] == "Completed")
        .unwrap();
    assert_eq!(completed["count"], 3);
    assert_eq!(body["data"]["pending_funds"], 1);
}

#[tokio::test]
async fn patient_detail_has_thai_age_and_dates() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/api/v1/patients/HN660001", Some("cm"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["age"], "2 ปี");
    assert_eq!(body["data"]["dob_display"], "15 พ.ย. 66");

    let (status, _) = call(&app, "GET", "/api/v1/patients/HN000000", Some("cm"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = call(&app, "GET", "/api/v1/patients?query=hn6600", Some("cm"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn patient_summary_collects_related_records() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/api/v1/patients/HN660001/summary", Some("cm"), None).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["visits"].as_array().unwrap().len(), 2);
    // newest first
    assert_eq!(data["visits"][0]["date"], "2025-12-01");
    assert_eq!(data["referrals"].as_array().unwrap().len(), 1);
    assert_eq!(data["funds"][0]["status"]["status"], "Pending");
    assert_eq!(data["appointments"][0]["date_display"], "15 ธ.ค. 68");
}

#[tokio::test]
async fn status_filter_accepts_any_synonym() {
    let app = app().await;
    let (_, body) = call(
        &app,
        "GET",
        &format!("/api/v1/visits?status={}", enc("เสร็จสิ้น")),
        Some("cm"),
        None,
    ).await;
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r["status"]["status"] == "Completed"));
    assert!(rows.iter().any(|r| r["raw_status"] == "อยู่ในพื้นที่"));
}

#[tokio::test]
async fn visit_request_runs_through_to_completion() {
    let app = app().await;

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/visits",
        Some("cm"),
        Some(json!({ "hn": "HN630500", "visit_type": "Joint" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"]["status"], "Pending");
    assert_eq!(body["data"]["pcu_name"], "รพ.สต. ท่าพระ");

    let (status, body) = call(&app, "POST", &format!("/api/v1/visits/{id}/accept"), Some("pcu"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["status"], "Accepted");
    assert_eq!(body["data"]["version"], 2);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/visits/{id}/schedule"),
        Some("pcu"),
        Some(json!({ "date": "2025-12-20", "time": "10:00" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["status"], "WaitVisit");
    assert_eq!(body["data"]["scheduled_at"], "2025-12-20 10:00");

    let (_, body) = call(&app, "POST", &format!("/api/v1/visits/{id}/select"), Some("pcu"), None).await;
    assert_eq!(body["data"]["outcome"], "needs_confirmation");
    let (_, body) = call(&app, "POST", &format!("/api/v1/visits/{id}/select/confirm"), Some("pcu"), None).await;
    assert_eq!(body["data"]["outcome"], "proceed");
    assert_eq!(body["data"]["advance_after_ms"], 300);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/visits/{id}/submit"),
        Some("pcu"),
        Some(json!({ "form": { "general": { "visitor_name": "พยาบาลวิภา" } } })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["fields"][0]["field"], "general.visit_date");

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/visits/{id}/submit"),
        Some("pcu"),
        Some(json!({ "form": { "general": { "visit_date": "2025-12-20", "visitor_name": "พยาบาลวิภา" } } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["status"], "Completed");
    assert_eq!(body["data"]["has_form"], true);

    let (status, body) = call(&app, "POST", &format!("/api/v1/visits/{id}/reopen"), Some("cm"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["editable"], true);
}

#[tokio::test]
async fn pending_selection_skips_confirmation() {
    let app = app().await;
    let id = first_visit_id(&app, "hn=HN660001&status=Pending").await;
    let (status, body) = call(&app, "POST", &format!("/api/v1/visits/{id}/select"), Some("pcu"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outcome"], "proceed");

    let (status, _) = call(&app, "POST", &format!("/api/v1/visits/{id}/select"), Some("cm"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn illegal_moves_are_refused() {
    let app = app().await;
    let id = first_visit_id(&app, "hn=HN660001&status=Pending").await;

    let (status, body) = call(&app, "POST", &format!("/api/v1/visits/{id}/accept"), Some("cm"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/visits/{id}/schedule"),
        Some("pcu"),
        Some(json!({ "date": "2025-12-20" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "ILLEGAL_TRANSITION");

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/visits/{id}/reject"),
        Some("pcu"),
        Some(json!({ "reason": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "REASON_REQUIRED");
}

#[tokio::test]
async fn stale_version_conflicts() {
    let app = app().await;
    let id = first_visit_id(&app, "hn=HN660002&status=Pending").await;

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/visits/{id}/accept?expected_version=7"),
        Some("pcu"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "VERSION_CONFLICT");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/visits/{id}/accept?expected_version=1"),
        Some("pcu"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn appointment_requires_all_fields() {
    let app = app().await;
    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/appointments",
        Some("cm"),
        Some(json!({ "hn": "HN660001", "date": "20/12/2025" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<_> = body["error"]["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(fields, vec!["date", "time", "location"]);

    let (status, body) = call(
        &app,
        "POST",
        "/api/v1/appointments",
        Some("pcu"),
        Some(json!({ "hn": "HN660001", "date": "2025-12-20", "time": "09:00", "location": "รพ.สต." })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["date_display"], "20 ธ.ค. 68");
}

#[tokio::test]
async fn fund_decisions_happen_once() {
    let app = app().await;
    let (_, body) = call(&app, "GET", "/api/v1/funds?status=pending", Some("scfc"), None).await;
    let id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/funds/{id}/reject"),
        Some("scfc"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "REASON_REQUIRED");

    let (status, body) = call(
        &app,
        "POST",
        &format!("/api/v1/funds/{id}/approve"),
        Some("scfc"),
        Some(json!({ "note": "อนุมัติตามระเบียบ" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["status"], "Accepted");

    let (status, _) = call(
        &app,
        "POST",
        &format!("/api/v1/funds/{id}/approve"),
        Some("scfc"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = call(&app, "GET", "/api/v1/funds/summary", Some("scfc"), None).await;
    assert_eq!(body["data"]["total_requests"], 4);
    assert_eq!(body["data"]["total_amount"], 6550);
}

#[tokio::test]
async fn gis_skips_patients_without_coordinates() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/api/v1/gis/markers", Some("scfc"), None).await;
    assert_eq!(status, StatusCode::OK);
    let markers = body["data"].as_array().unwrap();
    assert_eq!(markers.len(), 5);
    assert!(markers.iter().all(|m| m["hn"] != "HN630500"));

    let (_, body) = call(
        &app,
        "GET",
        &format!("/api/v1/gis/markers?district={}", enc("เมืองขอนแก่น")),
        Some("scfc"),
        None,
    ).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn fund_amounts_are_capped_and_summary_stays_exact() {
    let app = app().await;
    for amount in [i64::MAX, 10_000_001] {
        let (status, body) = call(
            &app,
            "POST",
            "/api/v1/funds",
            Some("cm"),
            Some(json!({ "hn": "HN660001", "category": "travel", "amount": amount })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    for _ in 0..2 {
        let (status, _) = call(
            &app,
            "POST",
            "/api/v1/funds",
            Some("cm"),
            Some(json!({ "hn": "HN660001", "category": "travel", "amount": 10_000_000 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = call(&app, "GET", "/api/v1/funds/summary", Some("scfc"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_requests"], 6);
    assert_eq!(body["data"]["total_amount"], 20_006_550);
}

#[tokio::test]
async fn gis_filters_on_latest_visit_status() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/api/v1/gis/markers?status=wait_visit", Some("scfc"), None).await;
    assert_eq!(status, StatusCode::OK);
    let mut hns: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["hn"].as_str().unwrap().to_string())
        .collect();
    hns.sort();
    assert_eq!(hns, vec!["HN640245", "HN660002"]);
    assert_eq!(body["data"][0]["latest_visit"]["status"], "WaitVisit");

    // older Completed visits do not count once a newer one exists
    let (_, body) = call(&app, "GET", "/api/v1/gis/markers?status=completed", Some("scfc"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn unknown_status_filters_are_rejected() {
    let app = app().await;
    for uri in [
        "/api/v1/visits?status=compleeted",
        "/api/v1/funds?status=compleeted",
        "/api/v1/referrals?status=compleeted",
        "/api/v1/gis/markers?status=compleeted",
    ] {
        let (status, body) = call(&app, "GET", uri, Some("scfc"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    // blank filter means no filter
    let (status, body) = call(&app, "GET", "/api/v1/visits?status=%20", Some("scfc"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 12);
}

#[tokio::test]
async fn teleconsults_list_by_patient_and_record_new_ones() {
    let app = app().await;
    let (status, body) = call(&app, "GET", "/api/v1/teleconsults?hn=HN660002", Some("pcu"), None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body["data"].as_array().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["channel"], "video");
    assert_eq!(rows[0]["date_display"], "20 พ.ย. 68");

    let (_, body) = call(&app, "GET", "/api/v1/teleconsults", Some("pcu"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let consult = json!({ "hn": "HN660001", "date": "2025-12-10", "specialist": "นักแก้ไขการพูด" });
    let (status, _) = call(&app, "POST", "/api/v1/teleconsults", Some("pcu"), Some(consult.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let bad_date = json!({ "hn": "HN660001", "date": "10/12/2025", "specialist": "นักแก้ไขการพูด" });
    let (status, body) = call(&app, "POST", "/api/v1/teleconsults", Some("cm"), Some(bad_date)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = call(&app, "POST", "/api/v1/teleconsults", Some("cm"), Some(consult)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["date_display"], "10 ธ.ค. 68");

    let (_, body) = call(&app, "GET", "/api/v1/teleconsults?hn=HN660001", Some("scfc"), None).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn drafts_only_from_evidence_step() {
    let app = app().await;
    let form = json!({ "general": { "visit_date": "2025-12-20" }, "evidence": ["a.jpg"] });

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/drafts/home_visit_draft",
        Some("pcu"),
        Some(json!({ "part": 2, "step": "surgery", "form": form })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "DRAFT_NOT_ALLOWED");

    let (status, _) = call(
        &app,
        "PUT",
        "/api/v1/drafts/home_visit_draft",
        Some("pcu"),
        Some(json!({ "part": 4, "step": "evidence", "form": form })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, "GET", "/api/v1/drafts/home_visit_draft", Some("pcu"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["snapshot"]["evidence"][0], "a.jpg");

    let (status, body) = call(
        &app,
        "PUT",
        "/api/v1/drafts/my_draft",
        Some("pcu"),
        Some(json!({ "part": 4, "step": "evidence", "form": form })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn chat_messages_round_trip() {
    let app = app().await;
    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/chat/HN660001/messages",
        Some("cm"),
        Some(json!({ "text": "นัดเยี่ยมบ้านวันศุกร์นี้" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = call(&app, "GET", "/api/v1/chat/HN660001/messages", Some("pcu"), None).await;
    let msgs = body["data"].as_array().unwrap();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["author_role"], "cm");
    assert_eq!(msgs[0]["author_name"], "CM");

    let (status, _) = call(
        &app,
        "POST",
        "/api/v1/chat/HN660001/messages",
        Some("cm"),
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn referral_status_must_be_recognised() {
    let app = app().await;
    let (_, body) = call(&app, "GET", "/api/v1/referrals?hn=HN660001", Some("cm"), None).await;
    let id = body["data"][0]["id"].as_str().unwrap().to_string();

    let (status, _) = call(
        &app,
        "PATCH",
        &format!("/api/v1/referrals/{id}/status"),
        Some("cm"),
        Some(json!({ "status": "maybe" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(
        &app,
        "PATCH",
        &format!("/api/v1/referrals/{id}/status"),
        Some("cm"),
        Some(json!({ "status": "อนุมัติ" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"]["status"], "Accepted");
    assert_eq!(body["data"]["raw_status"], "อนุมัติ");
}

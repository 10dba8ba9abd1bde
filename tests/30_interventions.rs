mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn create_under_existing_case_with_defaults() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = envelope(
        server
            .staff(Method::POST, "/interventions")
            .json(&json!({
                "case_id": CASE_BEN_ROUTINE,
                "type": "SEL",
                "tier": 2,
                "intervention_name": "Lunch bunch",
                "start_date": "2025-03-11",
                "facilitator_id": STAFF,
            }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["is_active"], true);
    assert_eq!(body["data"]["is_escalatable_tier"], true);
    assert_eq!(body["data"]["facilitator"]["last_name"], "Rivera");
    Ok(())
}

#[tokio::test]
async fn create_validates_fields_then_case() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = envelope(
        server
            .staff(Method::POST, "/interventions")
            .json(&json!({ "case_id": CASE_BEN_ROUTINE, "type": "SEL" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body["error"],
        "Missing required fields: case_id, type, intervention_name and start_date are required"
    );

    let (status, body) = envelope(
        server
            .staff(Method::POST, "/interventions")
            .json(&json!({
                "case_id": "cccccccc-0000-4000-8000-0000000000ee",
                "type": "SEL",
                "intervention_name": "Orphan",
                "start_date": "2025-03-11",
            }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Case not found");
    Ok(())
}

#[tokio::test]
async fn list_defaults_to_active_then_latest_start() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/interventions").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
    assert_eq!(ids(&body), vec![READING, SOCIAL_GROUP, CHECK_IN, HOMEWORK_CLUB]);

    let check_in = &body["data"][2];
    assert_eq!(check_in["session_count"], 2);
    assert_eq!(check_in["facilitator_name"], "Sam Rivera");
    assert_eq!(body["data"][1]["facilitator_name"], serde_json::Value::Null);
    Ok(())
}

#[tokio::test]
async fn is_active_filter_is_three_way() -> Result<()> {
    let server = spawn().await?;

    let (_, all) = server.staff_get("/interventions").await?;
    let (_, active) = server.staff_get("/interventions?is_active=true").await?;
    let (_, inactive) = server.staff_get("/interventions?is_active=false").await?;
    let (_, unspecified) = server.staff_get("/interventions?is_active=maybe").await?;

    assert_eq!(all["count"], 4);
    assert_eq!(active["count"], 3);
    assert_eq!(ids(&inactive), vec![HOMEWORK_CLUB]);
    assert_eq!(unspecified["count"], 4);
    Ok(())
}

#[tokio::test]
async fn read_one_counts_sessions() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get(&format!("/interventions/{}", SOCIAL_GROUP)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["session_count"], 1);
    Ok(())
}

#[tokio::test]
async fn deactivate_via_update() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = envelope(
        server
            .staff(Method::PATCH, &format!("/interventions/{}", CHECK_IN))
            .json(&json!({ "is_active": false, "actual_end_date": "2025-03-10", "reason_for_ending": "Goals met" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (_, active) = server.staff_get("/interventions?is_active=true").await?;
    assert_eq!(active["count"], 2);
    Ok(())
}

#[tokio::test]
async fn hard_delete_cascades_to_sessions() -> Result<()> {
    let server = spawn().await?;

    let (_, before) = server.staff_get(&format!("/sessions?intervention_id={}", CHECK_IN)).await?;
    assert_eq!(before["count"], 2);

    let (status, body) = envelope(
        server
            .staff(Method::DELETE, &format!("/interventions/{}", CHECK_IN))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({ "id": CHECK_IN }));

    let (_, after) = server.staff_get(&format!("/sessions?intervention_id={}", CHECK_IN)).await?;
    assert_eq!(after["count"], 0);
    assert_eq!(after["data"], json!([]));

    let (status, _) = server.staff_get(&format!("/interventions/{}", CHECK_IN)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, case) = server.staff_get(&format!("/cases/{}", CASE_ANA_URGENT)).await?;
    assert_eq!(case["data"]["intervention_count"], 2);
    assert_eq!(case["data"]["session_count"], 1);

    let res = server
        .staff(Method::DELETE, &format!("/interventions/{}", CHECK_IN))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn sessions_record_against_existing_interventions() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = envelope(
        server
            .staff(Method::POST, "/sessions")
            .json(&json!({
                "intervention_id": READING,
                "session_date": "2025-03-10",
                "duration": 40,
                "facilitator_id": STAFF_NO_NAME,
                "student_progress": "Decoding improving",
            }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["student_attended"], true);
    assert_eq!(body["data"]["intervention"]["intervention_name"], "Reading recovery");

    let (_, list) = server.staff_get(&format!("/sessions?intervention_id={}", READING)).await?;
    assert_eq!(list["count"], 1);
    assert_eq!(list["data"][0]["facilitator_name"], "support@school.test");

    let res = server
        .staff(Method::POST, "/sessions")
        .json(&json!({ "intervention_id": READING }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server
        .staff(Method::POST, "/sessions")
        .json(&json!({ "intervention_id": "dddddddd-0000-4000-8000-0000000000ee", "session_date": "2025-03-10" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn session_list_filters_by_attendance_and_dates() -> Result<()> {
    let server = spawn().await?;

    let (_, all) = server.staff_get("/sessions").await?;
    assert_eq!(all["count"], 3);
    // session_date descending
    assert_eq!(all["data"][0]["session_date"], "2025-02-26");

    let (_, missed) = server.staff_get("/sessions?student_attended=false").await?;
    assert_eq!(ids(&missed), vec!["eeeeeeee-0000-4000-8000-000000000002"]);

    let (_, window) = server
        .staff_get("/sessions?session_date_from=2025-02-15&session_date_to=2025-02-20")
        .await?;
    assert_eq!(ids(&window), vec!["eeeeeeee-0000-4000-8000-000000000002"]);

    let (status, _) = server.staff_get("/sessions?session_date_from=15-02-2025").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

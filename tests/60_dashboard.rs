mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn stats_summarise_active_work() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/dashboard/stats").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "activeCases": 4, "urgentCases": 2, "activeInterventions": 3, "upcomingMeetings": 1 })
    );
    Ok(())
}

#[tokio::test]
async fn case_load_is_per_caller() -> Result<()> {
    let server = spawn().await?;
    let (_, mine) = server.staff_get("/dashboard/case-load").await?;
    assert_eq!(
        mine["data"],
        json!({ "total": 2, "open": 2, "on_hold": 0, "tier_1": 0, "tier_2": 1, "tier_3": 1, "urgent": 2 })
    );

    // The only case managed by this user is closed.
    let (_, other) = envelope(
        server
            .as_user(STAFF_NO_NAME, Method::GET, "/dashboard/case-load")
            .send()
            .await?,
    )
    .await?;
    assert_eq!(other["data"]["total"], 1);
    assert_eq!(other["data"]["open"], 0);
    assert_eq!(other["data"]["urgent"], 0);
    Ok(())
}

#[tokio::test]
async fn urgent_cases_oldest_first_with_age() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/dashboard/urgent-cases").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(ids(&body), vec![CASE_ANA_URGENT, CASE_BEN_URGENT]);
    assert_eq!(body["data"][0]["days_open"], 37);
    assert_eq!(body["data"][1]["days_open"], 9);
    assert_eq!(body["data"][0]["student_name"], "Ana Ruiz");
    assert_eq!(body["data"][0]["case_manager_name"], "Sam Rivera");
    Ok(())
}

#[tokio::test]
async fn my_cases_counts_interventions() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/dashboard/my-cases").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec![CASE_ANA_URGENT, CASE_BEN_URGENT]);
    assert_eq!(body["data"][0]["intervention_count"], 3);
    assert_eq!(body["data"][1]["intervention_count"], 1);

    let (_, none) = envelope(
        server
            .as_user(STAFF_NO_NAME, Method::GET, "/dashboard/my-cases")
            .send()
            .await?,
    )
    .await?;
    assert_eq!(none["count"], 0);
    assert_eq!(none["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn tier_distribution_groups_by_grade() -> Result<()> {
    let server = spawn().await?;
    let (_, body) = server.staff_get("/dashboard/tier-distribution").await?;
    assert_eq!(
        body["data"],
        json!([
            { "grade": "G5", "tier_1": 0, "tier_2": 1, "tier_3": 0, "total": 2 },
            { "grade": "G7", "tier_1": 0, "tier_2": 1, "tier_3": 1, "total": 2 },
        ])
    );
    Ok(())
}

#[tokio::test]
async fn case_statistics_cover_every_case() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/dashboard/case-statistics").await?;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["total_cases"], 5);
    assert_eq!(stats["open_cases"], 4);
    assert_eq!(stats["on_hold_cases"], 0);
    assert_eq!(stats["closed_cases"], 1);
    assert_eq!(stats["urgent_cases"], 3);
    assert_eq!((stats["tier_1_cases"].clone(), stats["tier_2_cases"].clone(), stats["tier_3_cases"].clone()), (json!(1), json!(2), json!(1)));
    assert_eq!(
        stats["cases_by_type"],
        json!({
            "ACADEMIC_SUPPORT": 1,
            "BULLYING": 1,
            "CHILD_PROTECTION": 0,
            "CONFLICT_RESOLUTION": 0,
            "DISTINCTIONS": 1,
            "SEL": 2,
            "URGENT": 0,
        })
    );
    Ok(())
}

#[tokio::test]
async fn figures_follow_writes() -> Result<()> {
    let server = spawn().await?;
    let res = server
        .staff(Method::DELETE, &format!("/cases/{}", CASE_BEN_URGENT))
        .json(&json!({ "closure_reason": "Moved schools" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let (_, body) = server.staff_get("/dashboard/stats").await?;
    assert_eq!(body["data"]["activeCases"], 3);
    assert_eq!(body["data"]["urgentCases"], 1);
    Ok(())
}

mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn create_defaults_to_scheduled() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = envelope(
        server
            .staff(Method::POST, "/meetings")
            .json(&json!({
                "student_id": BEN,
                "case_id": CASE_BEN_URGENT,
                "meeting_date": "2025-03-14",
                "meeting_time": "15:30:00",
                "sss_staff_id": STAFF,
                "agenda": "Reading plan",
            }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["meeting_status"], "SCHEDULED");
    assert_eq!(body["data"]["is_scheduled"], true);
    assert_eq!(body["data"]["student"]["name"], "Ben Okafor");
    assert_eq!(body["data"]["case"]["case_type"], "ACADEMIC_SUPPORT");
    Ok(())
}

#[tokio::test]
async fn create_checks_student_then_optional_case() -> Result<()> {
    let server = spawn().await?;

    let (status, body) = envelope(
        server
            .staff(Method::POST, "/meetings")
            .json(&json!({ "meeting_date": "2025-03-14" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: student_id is required");

    let (status, body) = envelope(
        server
            .staff(Method::POST, "/meetings")
            .json(&json!({ "student_id": "bbbbbbbb-0000-4000-8000-0000000000ee" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Student not found");

    let (status, body) = envelope(
        server
            .staff(Method::POST, "/meetings")
            .json(&json!({ "student_id": BEN, "case_id": "cccccccc-0000-4000-8000-0000000000ee" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Case not found");

    let res = server
        .staff(Method::POST, "/meetings")
        .json(&json!({ "student_id": BEN, "case_id": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::CREATED);
    Ok(())
}

#[tokio::test]
async fn list_sorts_soonest_first_with_undated_last() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/meetings").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 4);
    assert_eq!(
        ids(&body),
        vec![
            "ffffffff-0000-4000-8000-000000000003",
            "ffffffff-0000-4000-8000-000000000001",
            "ffffffff-0000-4000-8000-000000000004",
            "ffffffff-0000-4000-8000-000000000002",
        ]
    );
    assert_eq!(body["data"][0]["student_name"], "Ana Ruiz");
    assert_eq!(body["data"][0]["student_grade"], "G5");
    assert_eq!(body["data"][0]["sss_staff_name"], "support@school.test");
    assert!(body["data"][3]["sss_staff_name"].is_null());
    Ok(())
}

#[tokio::test]
async fn list_filters_by_status_set_and_date_window() -> Result<()> {
    let server = spawn().await?;

    let (_, upcoming) = server.staff_get("/meetings?meeting_status=SCHEDULED,RESCHEDULED").await?;
    assert_eq!(upcoming["count"], 3);

    let (_, repeated) = server
        .staff_get("/meetings?meeting_status=COMPLETED&meeting_status=RESCHEDULED")
        .await?;
    assert_eq!(repeated["count"], 2);

    let (_, window) = server
        .staff_get("/meetings?meeting_date_from=2025-03-10&meeting_date_to=2025-03-31")
        .await?;
    assert_eq!(
        ids(&window),
        vec!["ffffffff-0000-4000-8000-000000000001", "ffffffff-0000-4000-8000-000000000004"]
    );

    let (_, unscheduled) = server.staff_get("/meetings?is_scheduled=false").await?;
    assert_eq!(ids(&unscheduled), vec!["ffffffff-0000-4000-8000-000000000002"]);

    let (status, body) = server.staff_get("/meetings?meeting_status=DONE").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"].is_null());
    Ok(())
}

#[tokio::test]
async fn update_moves_meeting_status() -> Result<()> {
    let server = spawn().await?;
    let path = "/meetings/ffffffff-0000-4000-8000-000000000001";
    let (status, body) = envelope(
        server
            .staff(Method::PATCH, path)
            .json(&json!({ "meeting_status": "COMPLETED", "meeting_notes": "Agreed plan", "action_plan": { "steps": ["daily check-in"] } }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["meeting_status"], "COMPLETED");
    assert_eq!(body["data"]["action_plan"]["steps"][0], "daily check-in");

    let res = server
        .staff(Method::PATCH, path)
        .json(&json!({ "meeting_status": null }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn files_attach_to_cases() -> Result<()> {
    let server = spawn().await?;

    let (status, body) = envelope(
        server
            .staff(Method::POST, "/files")
            .json(&json!({
                "case_id": CASE_BEN_URGENT,
                "file_name": "plan.docx",
                "file_url": "https://files.school.test/plan.docx",
                "file_type": "application/msword",
                "tags": ["plan"],
            }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["uploaded_by"], STAFF);
    assert_eq!(body["data"]["uploader"]["first_name"], "Sam");

    let (status, body) = envelope(
        server
            .staff(Method::POST, "/files")
            .json(&json!({ "file_name": "x.pdf", "file_url": "https://files.school.test/x.pdf" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: file_name, file_url and case_id are required");

    let (_, list) = server.staff_get(&format!("/files?case_id={}", CASE_ANA_URGENT)).await?;
    assert_eq!(ids(&list), vec![REFERRAL_FILE]);
    assert_eq!(list["data"][0]["uploader_name"], "Sam Rivera");

    let (status, body) = envelope(
        server
            .staff(Method::DELETE, &format!("/files/{}", REFERRAL_FILE))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({ "id": REFERRAL_FILE, "file_url": "https://files.school.test/referral.pdf" })
    );

    let (status, _) = server.staff_get(&format!("/files/{}", REFERRAL_FILE)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::*;

#[tokio::test]
async fn list_is_sorted_by_name_with_case_counts() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/students").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 3);
    assert_eq!(ids(&body), vec![ANA, BEN, CHLOE]);

    let ana = &body["data"][0];
    assert_eq!(ana["case_count"], 2);
    assert_eq!(ana["active_case_count"], 1);
    assert_eq!(ana["primary_teacher_name"], "Tara Lee");

    let ben = &body["data"][1];
    assert_eq!(ben["case_count"], 2);
    assert_eq!(ben["active_case_count"], 2);
    assert!(ben["primary_teacher_name"].is_null());
    Ok(())
}

#[tokio::test]
async fn archived_filter_is_three_way() -> Result<()> {
    let server = spawn().await?;
    let (_, archived) = server.staff_get("/students?archived=true").await?;
    let (_, current) = server.staff_get("/students?archived=false").await?;
    let (_, all) = server.staff_get("/students").await?;

    assert_eq!(ids(&archived), vec![CHLOE]);
    assert_eq!(ids(&current), vec![ANA, BEN]);
    assert_eq!(all["count"], 3);
    Ok(())
}

#[tokio::test]
async fn search_matches_name_or_school_code() -> Result<()> {
    let server = spawn().await?;
    let (_, by_code) = server.staff_get("/students?search=atl-002").await?;
    assert_eq!(ids(&by_code), vec![BEN]);

    let (_, by_name) = server.staff_get("/students?search=PARK").await?;
    assert_eq!(ids(&by_name), vec![CHLOE]);

    let (_, by_grade) = server.staff_get("/students?grade=G5").await?;
    assert_eq!(ids(&by_grade), vec![ANA, CHLOE]);
    Ok(())
}

#[tokio::test]
async fn detail_carries_cases_newest_first() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get(&format!("/students/{}", ANA)).await?;
    assert_eq!(status, StatusCode::OK);

    let student = &body["data"];
    assert_eq!(student["name"], "Ana Ruiz");
    assert_eq!(student["primary_teacher"]["first_name"], "Tara");
    assert_eq!(student["case_count"], 2);
    assert_eq!(student["active_case_count"], 1);
    assert_eq!(student["cases"][0]["id"], CASE_ANA_URGENT);
    assert_eq!(student["cases"][0]["case_manager"]["last_name"], "Rivera");
    assert_eq!(student["cases"][1]["id"], CASE_ANA_CLOSED);

    let (status, body) = server.staff_get("/students/not-a-uuid").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Student not found");
    Ok(())
}

#[tokio::test]
async fn create_requires_name_and_grade() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = envelope(
        server
            .staff(Method::POST, "/students")
            .json(&json!({ "name": "Dev Shah" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required fields: name and grade are required");

    let (status, body) = envelope(
        server
            .staff(Method::POST, "/students")
            .json(&json!({ "name": "Dev Shah", "grade": "G6", "student_id": "ATL-004", "date_of_birth": "" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["grade"], "G6");
    assert!(body["data"]["date_of_birth"].is_null());
    assert!(body["data"]["archived_at"].is_null());

    let (_, all) = server.staff_get("/students").await?;
    assert_eq!(all["count"], 4);
    Ok(())
}

#[tokio::test]
async fn archiving_is_an_update() -> Result<()> {
    let server = spawn().await?;
    let path = format!("/students/{}", BEN);
    let (status, _) = envelope(
        server
            .staff(Method::PATCH, &path)
            .json(&json!({ "archived_at": "2025-03-10T12:00:00Z" }))
            .send()
            .await?,
    )
    .await?;
    assert_eq!(status, StatusCode::OK);

    let (_, archived) = server.staff_get("/students?archived=true").await?;
    assert_eq!(ids(&archived), vec![BEN, CHLOE]);

    let res = server.staff(Method::PATCH, &path).json(&json!({ "name": null })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = server.staff(Method::PATCH, &path).json(&json!({ "case_count": 9 })).send().await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

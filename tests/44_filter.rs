mod common;

use anyhow::Result;
use reqwest::StatusCode;

use common::*;

#[tokio::test]
async fn default_order_is_urgent_then_newest() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/cases").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);
    assert_eq!(
        ids(&body),
        vec![CASE_BEN_URGENT, CASE_ANA_URGENT, CASE_ANA_CLOSED, CASE_CHLOE_ROUTINE, CASE_BEN_ROUTINE]
    );
    Ok(())
}

#[tokio::test]
async fn count_ignores_the_page_window() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/cases?limit=2&page=2").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);
    assert_eq!(ids(&body), vec![CASE_ANA_CLOSED, CASE_CHLOE_ROUTINE]);

    let (_, past_end) = server.staff_get("/cases?limit=2&page=9").await?;
    assert_eq!(past_end["count"], 5);
    assert_eq!(past_end["data"], serde_json::json!([]));

    let (status, _) = server.staff_get("/cases?page=first").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn tier_is_matched_as_an_integer() -> Result<()> {
    let server = spawn().await?;
    let (_, body) = server.staff_get("/cases?tier=2").await?;
    assert_eq!(ids(&body), vec![CASE_ANA_URGENT, CASE_BEN_ROUTINE]);

    let (_, body) = server.staff_get("/cases?tier=1,3").await?;
    assert_eq!(ids(&body), vec![CASE_BEN_URGENT, CASE_ANA_CLOSED]);

    let (status, body) = server.staff_get("/cases?tier=abc").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
    Ok(())
}

#[tokio::test]
async fn urgency_flag_is_three_way() -> Result<()> {
    let server = spawn().await?;
    let (_, urgent) = server.staff_get("/cases?is_urgent=true").await?;
    let (_, routine) = server.staff_get("/cases?is_urgent=false").await?;
    let (_, ignored) = server.staff_get("/cases?is_urgent=").await?;

    assert_eq!(urgent["count"], 3);
    assert_eq!(ids(&routine), vec![CASE_CHLOE_ROUTINE, CASE_BEN_ROUTINE]);
    assert_eq!(ignored["count"], 5);
    Ok(())
}

#[tokio::test]
async fn filters_combine_with_and() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/cases?is_urgent=true&status=OPEN").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 2);
    assert_eq!(ids(&body), vec![CASE_BEN_URGENT, CASE_ANA_URGENT]);
    assert_eq!(body["data"][0]["student_name"], "Ben Okafor");
    Ok(())
}

#[tokio::test]
async fn status_accepts_repeats_and_commas() -> Result<()> {
    let server = spawn().await?;
    let (_, repeated) = server.staff_get("/cases?status=CLOSED&status=ON_HOLD").await?;
    assert_eq!(ids(&repeated), vec![CASE_ANA_CLOSED]);

    let (_, comma) = server.staff_get("/cases?status=OPEN,CLOSED").await?;
    assert_eq!(comma["count"], 5);

    let (status, _) = server.staff_get("/cases?status=PENDING").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn search_and_grade_reach_through_the_student() -> Result<()> {
    let server = spawn().await?;
    let (_, body) = server.staff_get("/cases?search=ana").await?;
    assert_eq!(body["count"], 2);
    assert_eq!(ids(&body), vec![CASE_ANA_URGENT, CASE_ANA_CLOSED]);

    let (_, body) = server.staff_get("/cases?grade=G7").await?;
    assert_eq!(ids(&body), vec![CASE_BEN_URGENT, CASE_BEN_ROUTINE]);

    let (_, body) = server.staff_get(&format!("/cases?student_id={}", CHLOE)).await?;
    assert_eq!(ids(&body), vec![CASE_CHLOE_ROUTINE]);

    let (status, _) = server.staff_get("/cases?student_id=chloe").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn sort_keys_are_whitelisted() -> Result<()> {
    let server = spawn().await?;
    let (_, body) = server.staff_get("/cases?sort_by=opened_date&sort_direction=asc").await?;
    assert_eq!(
        ids(&body),
        vec![CASE_ANA_CLOSED, CASE_ANA_URGENT, CASE_BEN_ROUTINE, CASE_BEN_URGENT, CASE_CHLOE_ROUTINE]
    );

    let (_, body) = server.staff_get("/cases?sort_by=opened_date").await?;
    assert_eq!(ids(&body)[0], CASE_CHLOE_ROUTINE);

    let (status, body) = server.staff_get("/cases?sort_by=internal_notes").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["data"].is_null());
    Ok(())
}

#[tokio::test]
async fn far_pages_are_empty() -> Result<()> {
    let server = spawn().await?;
    let (status, body) = server.staff_get("/cases?page=9223372036854775807").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 5);
    assert_eq!(body["data"], serde_json::json!([]));
    Ok(())
}

mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

struct Fixture {
    app: TestApp,
    token: String,
    enrollment_id: i64,
    section_id: i64,
}

async fn fixture() -> Result<Fixture> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("docente1", &["Docente"]).await?;
    let career_id = app.insert_career("SIS", "Sistemas Informáticos").await?;
    let student_id = app.insert_student("EST-010", "Carla", "Quispe", true).await?;
    let enrollment_id = app.insert_enrollment(student_id, career_id, 2025, "Matriculado").await?;
    let section_id = app.insert_section("SIS-101", "Programación I", career_id).await?;

    Ok(Fixture {
        app,
        token,
        enrollment_id,
        section_id,
    })
}

impl Fixture {
    async fn record(&self, scores: Value) -> Result<(StatusCode, Value)> {
        let mut body = json!({
            "enrollment_id": self.enrollment_id,
            "section_id": self.section_id,
        });
        if let (Some(target), Some(extra)) = (body.as_object_mut(), scores.as_object()) {
            target.extend(extra.clone());
        }
        let response = self.app.send("POST", "/grades", Some(&self.token), Some(body)).await?;
        let json = if response.body.is_empty() { Value::Null } else { response.json()? };
        Ok((response.status, json))
    }
}

#[tokio::test]
async fn average_ignores_missing_partials() -> Result<()> {
    let fx = fixture().await?;

    let (status, grade) = fx
        .record(json!({ "first_partial": 80.0, "second_partial": null, "third_partial": 60.0 }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(grade["average"], 70.0);
    assert_eq!(grade["final_grade"], 70.0);
    assert_eq!(grade["outcome"], "Approved");
    Ok(())
}

#[tokio::test]
async fn pass_mark_is_fifty_one() -> Result<()> {
    let fx = fixture().await?;

    let (_, passed) = fx.record(json!({ "first_partial": 51.0 })).await?;
    assert_eq!(passed["average"], 51.0);
    assert_eq!(passed["outcome"], "Approved");

    let (_, failed) = fx.record(json!({ "first_partial": 50.0 })).await?;
    assert_eq!(failed["outcome"], "Failed");
    Ok(())
}

#[tokio::test]
async fn no_partials_leave_grade_pending() -> Result<()> {
    let fx = fixture().await?;

    let (status, grade) = fx.record(json!({})).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert!(grade["average"].is_null());
    assert!(grade["final_grade"].is_null());
    assert_eq!(grade["outcome"], "Pending");
    Ok(())
}

#[tokio::test]
async fn explicit_final_overrides_average() -> Result<()> {
    let fx = fixture().await?;

    let (_, grade) = fx
        .record(json!({ "first_partial": 90.0, "second_partial": 90.0, "final_grade": 45.0 }))
        .await?;
    assert_eq!(grade["average"], 90.0);
    assert_eq!(grade["final_grade"], 45.0);
    assert_eq!(grade["outcome"], "Failed");
    Ok(())
}

#[tokio::test]
async fn scores_outside_range_are_rejected() -> Result<()> {
    let fx = fixture().await?;

    let (status, body) = fx.record(json!({ "first_partial": 101.0 })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");

    let (status, _) = fx.record(json!({ "final_grade": -1.0 })).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM grades")
        .fetch_one(&fx.app.pool)
        .await?;
    assert_eq!(count, 0);
    Ok(())
}

#[tokio::test]
async fn update_keeps_omitted_partials_and_recomputes() -> Result<()> {
    let fx = fixture().await?;

    let (_, grade) = fx
        .record(json!({ "first_partial": 40.0, "second_partial": 40.0 }))
        .await?;
    let id = grade["id"].as_i64().unwrap_or_default();
    assert_eq!(grade["outcome"], "Failed");

    let updated = fx
        .app
        .send(
            "PUT",
            &format!("/grades/{id}"),
            Some(&fx.token),
            Some(json!({ "third_partial": 100.0 })),
        )
        .await?;
    assert_eq!(updated.status, StatusCode::OK);

    let updated = updated.json()?;
    assert_eq!(updated["first_partial"], 40.0);
    assert_eq!(updated["average"], 60.0);
    assert_eq!(updated["final_grade"], 60.0);
    assert_eq!(updated["outcome"], "Approved");
    assert!(updated["updated_at"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_enrollment_is_a_bad_request() -> Result<()> {
    let fx = fixture().await?;

    let body = json!({ "enrollment_id": 9999, "section_id": fx.section_id, "first_partial": 70.0 });
    let response = fx.app.send("POST", "/grades", Some(&fx.token), Some(body)).await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn grades_list_filters_by_enrollment() -> Result<()> {
    let fx = fixture().await?;
    fx.record(json!({ "first_partial": 70.0 })).await?;
    fx.record(json!({ "first_partial": 30.0 })).await?;

    let page = fx
        .app
        .get(&format!("/grades?enrollment_id={}", fx.enrollment_id), Some(&fx.token))
        .await?
        .json()?;
    assert_eq!(page["meta"]["total"], 2);

    let none = fx.app.get("/grades?enrollment_id=9999", Some(&fx.token)).await?.json()?;
    assert_eq!(none["meta"]["total"], 0);
    assert_eq!(none["data"], json!([]));
    Ok(())
}

#[tokio::test]
async fn unrelated_edit_keeps_hand_entered_final() -> Result<()> {
    let fx = fixture().await?;

    let (_, grade) = fx
        .record(json!({ "first_partial": 40.0, "second_partial": 40.0, "final_grade": 60.0 }))
        .await?;
    let id = grade["id"].as_i64().unwrap_or_default();
    assert_eq!(grade["outcome"], "Approved");

    for body in [json!({ "remarks": "revisado" }), json!({ "status": "Cerrado" })] {
        let updated = fx
            .app
            .send("PUT", &format!("/grades/{id}"), Some(&fx.token), Some(body))
            .await?;
        assert_eq!(updated.status, StatusCode::OK);

        let updated = updated.json()?;
        assert_eq!(updated["average"], 40.0);
        assert_eq!(updated["final_grade"], 60.0);
        assert_eq!(updated["outcome"], "Approved");
    }
    Ok(())
}

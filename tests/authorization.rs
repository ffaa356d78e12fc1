mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::TestApp;

#[tokio::test]
async fn docente_can_record_grades_but_not_delete_them() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("docente1", &["Docente"]).await?;

    let career_id = app.insert_career("CONT", "Contaduría General").await?;
    let student_id = app.insert_student("EST-001", "Ana", "Mamani", true).await?;
    let enrollment_id = app.insert_enrollment(student_id, career_id, 2025, "Matriculado").await?;
    let section_id = app.insert_section("CON-101", "Contabilidad I", career_id).await?;

    let created = app
        .send(
            "POST",
            "/grades",
            Some(&token),
            Some(json!({
                "enrollment_id": enrollment_id,
                "section_id": section_id,
                "first_partial": 70.0,
                "second_partial": 80.0
            })),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    let grade_id = created.json()?["id"].as_i64().unwrap_or_default();

    let denied = app
        .send("DELETE", &format!("/grades/{grade_id}"), Some(&token), None)
        .await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    let message = denied.json()?["message"].as_str().unwrap_or_default().to_string();
    assert!(!message.contains("eliminar_nota"));

    let still_there = app.get(&format!("/grades/{grade_id}"), Some(&token)).await?;
    assert_eq!(still_there.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized_before_any_lookup() -> Result<()> {
    let app = TestApp::new().await?;

    assert_eq!(app.get("/careers", None).await?.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.send("DELETE", "/grades/999", None, None).await?.status,
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        app.get("/reports/students", None).await?.status,
        StatusCode::UNAUTHORIZED
    );
    Ok(())
}

#[tokio::test]
async fn user_without_roles_is_forbidden() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("sinrol", &[]).await?;

    assert_eq!(app.get("/careers", Some(&token)).await?.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get("/auth/me", Some(&token)).await?.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn granting_and_revoking_a_role_flips_access() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.login_as("admin", &["Administrador"]).await?;
    let (user_id, token) = app.login_as("auxiliar", &[]).await?;

    assert_eq!(app.get("/students", Some(&token)).await?.status, StatusCode::FORBIDDEN);

    let roles = app.get("/rbac/roles", Some(&admin)).await?.json()?;
    let secretary_id = roles
        .as_array()
        .and_then(|roles| roles.iter().find(|role| role["name"] == "Secretaria"))
        .and_then(|role| role["id"].as_i64())
        .unwrap_or_default();

    let assigned = app
        .send(
            "POST",
            &format!("/rbac/users/{user_id}/roles"),
            Some(&admin),
            Some(json!({ "role_id": secretary_id })),
        )
        .await?;
    assert_eq!(assigned.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/students", Some(&token)).await?.status, StatusCode::OK);

    let revoked = app
        .send(
            "DELETE",
            &format!("/rbac/users/{user_id}/roles/{secretary_id}"),
            Some(&admin),
            None,
        )
        .await?;
    assert_eq!(revoked.status, StatusCode::NO_CONTENT);
    assert_eq!(app.get("/students", Some(&token)).await?.status, StatusCode::FORBIDDEN);
    Ok(())
}

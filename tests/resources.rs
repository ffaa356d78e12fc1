mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, PASSWORD};

#[tokio::test]
async fn career_crud_round_trip() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.login_as("admin", &["Administrador"]).await?;

    let created = app
        .send(
            "POST",
            "/careers",
            Some(&admin),
            Some(json!({ "code": "SIS", "name": "Sistemas Informáticos", "kind": "Tecnico", "total_hours": 3600 })),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    let career = created.json()?;
    let id = career["id"].as_i64().unwrap_or_default();
    assert_eq!(career["active"], true);

    let duplicate = app
        .send("POST", "/careers", Some(&admin), Some(json!({ "code": "SIS", "name": "Otra" })))
        .await?;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);

    let bad_kind = app
        .send(
            "POST",
            "/careers",
            Some(&admin),
            Some(json!({ "code": "XYZ", "name": "Rara", "kind": "Doctorado" })),
        )
        .await?;
    assert_eq!(bad_kind.status, StatusCode::BAD_REQUEST);

    let updated = app
        .send(
            "PUT",
            &format!("/careers/{id}"),
            Some(&admin),
            Some(json!({ "name": "Sistemas", "active": false })),
        )
        .await?
        .json()?;
    assert_eq!(updated["name"], "Sistemas");
    assert_eq!(updated["code"], "SIS");
    assert_eq!(updated["total_hours"], 3600);
    assert_eq!(updated["active"], false);

    let inactive = app.get("/careers?active=false", Some(&admin)).await?.json()?;
    assert_eq!(inactive["meta"]["total"], 1);

    let deleted = app.send("DELETE", &format!("/careers/{id}"), Some(&admin), None).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    assert_eq!(
        app.get(&format!("/careers/{id}"), Some(&admin)).await?.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        app.send("DELETE", &format!("/careers/{id}"), Some(&admin), None)
            .await?
            .status,
        StatusCode::NOT_FOUND
    );
    Ok(())
}

#[tokio::test]
async fn lists_are_paginated() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.login_as("admin", &["Administrador"]).await?;
    for n in 0..25 {
        app.insert_career(&format!("C{n:02}"), &format!("Carrera {n}")).await?;
    }

    let first = app.get("/careers", Some(&admin)).await?.json()?;
    assert_eq!(first["meta"], json!({ "page": 1, "per_page": 10, "total": 25, "total_pages": 3 }));
    assert_eq!(first["data"].as_array().map(Vec::len), Some(10));

    let last = app.get("/careers?page=3&per_page=10", Some(&admin)).await?.json()?;
    assert_eq!(last["data"].as_array().map(Vec::len), Some(5));

    let capped = app.get("/careers?per_page=1000", Some(&admin)).await?.json()?;
    assert_eq!(capped["meta"]["per_page"], 100);
    assert_eq!(capped["data"].as_array().map(Vec::len), Some(25));
    Ok(())
}

#[tokio::test]
async fn students_join_their_person() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("secretaria", &["Secretaria"]).await?;

    let person = app
        .send(
            "POST",
            "/persons",
            Some(&token),
            Some(json!({
                "document_number": "4567890",
                "first_name": "Ana",
                "paternal_surname": "Quispe",
                "maternal_surname": "Mamani"
            })),
        )
        .await?;
    assert_eq!(person.status, StatusCode::CREATED);
    let person_id = person.json()?["id"].as_i64().unwrap_or_default();

    let student = app
        .send(
            "POST",
            "/students",
            Some(&token),
            Some(json!({ "person_id": person_id, "student_code": "EST-2025-001" })),
        )
        .await?;
    assert_eq!(student.status, StatusCode::CREATED);
    let student = student.json()?;
    assert_eq!(student["full_name"], "Ana Quispe Mamani");
    assert_eq!(student["document_number"], "4567890");

    let orphan = app
        .send("POST", "/students", Some(&token), Some(json!({ "person_id": 9999 })))
        .await?;
    assert_eq!(orphan.status, StatusCode::BAD_REQUEST);

    let denied = app
        .send("DELETE", &format!("/students/{}", student["id"]), Some(&token), None)
        .await?;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn course_cannot_require_itself() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.login_as("admin", &["Administrador"]).await?;

    let course = app
        .send(
            "POST",
            "/courses",
            Some(&admin),
            Some(json!({ "code": "PRG-101", "name": "Programación I", "total_hours": 120 })),
        )
        .await?
        .json()?;
    let id = course["id"].as_i64().unwrap_or_default();

    let response = app
        .send(
            "PUT",
            &format!("/courses/{id}"),
            Some(&admin),
            Some(json!({ "prerequisite_id": id })),
        )
        .await?;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn user_provisioning_assigns_roles() -> Result<()> {
    let app = TestApp::new().await?;
    let (admin_id, admin) = app.login_as("admin", &["Administrador"]).await?;

    let roles = app.get("/rbac/roles", Some(&admin)).await?.json()?;
    let docente_role = roles
        .as_array()
        .and_then(|items| items.iter().find(|r| r["name"] == "Docente"))
        .and_then(|r| r["id"].as_i64())
        .unwrap_or_default();

    let created = app
        .send(
            "POST",
            "/users",
            Some(&admin),
            Some(json!({
                "username": "docente2",
                "password": PASSWORD,
                "email": "docente2@instituto.edu.bo",
                "role_ids": [docente_role]
            })),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    let user = created.json()?;
    assert!(user.get("password_hash").is_none());

    let login = app
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "username": "docente2", "password": PASSWORD })),
        )
        .await?
        .json()?;
    assert_eq!(login["user"]["username"], "docente2");

    let self_delete = app
        .send("DELETE", &format!("/users/{admin_id}"), Some(&admin), None)
        .await?;
    assert_eq!(self_delete.status, StatusCode::BAD_REQUEST);

    let removed = app
        .send("DELETE", &format!("/users/{}", user["id"]), Some(&admin), None)
        .await?;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    Ok(())
}

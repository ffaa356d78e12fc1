mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{TestApp, TestResponse};

fn occurrences(haystack: &[u8], needle: &str) -> usize {
    haystack
        .windows(needle.len())
        .filter(|window| *window == needle.as_bytes())
        .count()
}

fn page_count(response: &TestResponse) -> Result<usize> {
    let document = lopdf::Document::load_mem(&response.body)?;
    Ok(document.get_pages().len())
}

/// Three students enrolled in Contaduría, two of them active, plus noise
/// in another career and one student with no enrollment at all.
async fn seed_students(app: &TestApp) -> Result<(i64, i64)> {
    let contaduria = app.insert_career("CONT", "Contaduría General").await?;
    let sistemas = app.insert_career("SIS", "Sistemas Informáticos").await?;

    for (code, first, surname, active) in [
        ("EST-001", "Ana", "Mamani", true),
        ("EST-002", "Bruno", "Choque", true),
        ("EST-003", "Carla", "Quispe", false),
    ] {
        let student = app.insert_student(code, first, surname, active).await?;
        app.insert_enrollment(student, contaduria, 2025, "Matriculado").await?;
    }

    let other = app.insert_student("EST-004", "Diego", "Flores", true).await?;
    app.insert_enrollment(other, sistemas, 2025, "Matriculado").await?;
    app.insert_student("EST-005", "Elena", "Vargas", true).await?;

    Ok((contaduria, sistemas))
}

#[tokio::test]
async fn student_report_filtered_by_career() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("secretaria", &["Secretaria"]).await?;
    let (contaduria, _) = seed_students(&app).await?;

    let response = app
        .get(&format!("/reports/students?career_id={contaduria}"), Some(&token))
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type.as_deref(), Some("application/pdf"));

    let disposition = response.disposition.clone().unwrap_or_default();
    assert!(disposition.starts_with("attachment; filename=\"reporte_estudiantes_"));
    assert!(disposition.ends_with(".pdf\""));

    assert!(response.body.starts_with(b"%PDF-"));
    assert_eq!(page_count(&response)?, 1);

    for code in ["EST-001", "EST-002", "EST-003"] {
        assert_eq!(occurrences(&response.body, code), 1, "{code} should appear once");
    }
    assert_eq!(occurrences(&response.body, "EST-004"), 0);
    assert_eq!(occurrences(&response.body, "EST-005"), 0);
    assert_eq!(occurrences(&response.body, "Nombre Completo"), 1);
    assert!(occurrences(&response.body, "(Inactivos") >= 1);

    assert_eq!(app.artifact_count(), 1);
    Ok(())
}

#[tokio::test]
async fn post_body_filters_match_query_filters() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("secretaria", &["Secretaria"]).await?;
    let (contaduria, _) = seed_students(&app).await?;

    let response = app
        .send(
            "POST",
            "/reports/students",
            Some(&token),
            Some(json!({ "career_id": contaduria, "active": true })),
        )
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(occurrences(&response.body, "EST-001"), 1);
    assert_eq!(occurrences(&response.body, "EST-003"), 0);
    Ok(())
}

#[tokio::test]
async fn empty_report_is_still_a_document() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("secretaria", &["Secretaria"]).await?;
    let career = app.insert_career("GAS", "Gastronomía").await?;

    let response = app
        .get(&format!("/reports/students?career_id={career}"), Some(&token))
        .await?;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(page_count(&response)?, 1);
    assert!(occurrences(&response.body, "No se encontraron") >= 1);
    assert_eq!(occurrences(&response.body, "Nombre Completo"), 0);
    Ok(())
}

#[tokio::test]
async fn long_tables_repeat_their_header_on_every_page() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("secretaria", &["Secretaria"]).await?;
    let career = app.insert_career("ADM", "Administración de Empresas").await?;

    for n in 0..90 {
        let student = app
            .insert_student(&format!("EST-{n:03}"), "Estudiante", &format!("Apellido{n}"), n % 3 != 0)
            .await?;
        app.insert_enrollment(student, career, 2025, "Matriculado").await?;
    }

    let response = app
        .get(&format!("/reports/students?career_id={career}"), Some(&token))
        .await?;
    assert_eq!(response.status, StatusCode::OK);

    let pages = page_count(&response)?;
    assert!(pages >= 2, "90 rows should not fit on one page");
    let headers = occurrences(&response.body, "Nombre Completo");
    assert!(headers >= 2 && headers <= pages, "{headers} header rows over {pages} pages");
    Ok(())
}

#[tokio::test]
async fn repeated_generation_writes_distinct_artifacts() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("secretaria", &["Secretaria"]).await?;
    seed_students(&app).await?;

    let first = app.get("/reports/students", Some(&token)).await?;
    let second = app.get("/reports/students", Some(&token)).await?;
    assert_eq!(first.status, StatusCode::OK);
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(first.disposition, second.disposition);
    assert_eq!(app.artifact_count(), 2);
    Ok(())
}

#[tokio::test]
async fn unknown_career_is_not_found() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("secretaria", &["Secretaria"]).await?;

    let response = app.get("/reports/students?career_id=4242", Some(&token)).await?;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(app.artifact_count(), 0);
    Ok(())
}

#[tokio::test]
async fn reports_require_the_matching_view_permission() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, student) = app.login_as("alumno", &["Estudiante"]).await?;
    seed_students(&app).await?;

    assert_eq!(app.get("/reports/students", None).await?.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        app.get("/reports/students", Some(&student)).await?.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get("/reports/instructors", Some(&student)).await?.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(app.get("/reports/careers", Some(&student)).await?.status, StatusCode::OK);
    assert_eq!(app.artifact_count(), 1);
    Ok(())
}

#[tokio::test]
async fn other_report_kinds_render() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, token) = app.login_as("admin", &["Administrador"]).await?;
    let (contaduria, _) = seed_students(&app).await?;
    app.insert_section("CON-101", "Contabilidad I", contaduria).await?;

    let instructors = app.get("/reports/instructors", Some(&token)).await?;
    assert_eq!(instructors.status, StatusCode::OK);
    assert!(instructors
        .disposition
        .as_deref()
        .is_some_and(|d| d.contains("reporte_docentes_")));

    let careers = app.get("/reports/careers", Some(&token)).await?;
    assert_eq!(careers.status, StatusCode::OK);
    assert!(occurrences(&careers.body, "CONT") >= 1);

    let enrollments = app.get("/reports/enrollments?year=2025", Some(&token)).await?;
    assert_eq!(enrollments.status, StatusCode::OK);
    assert!(enrollments
        .disposition
        .as_deref()
        .is_some_and(|d| d.contains("reporte_inscripciones_2025.pdf")));

    for response in [&instructors, &careers, &enrollments] {
        assert!(page_count(response)? >= 1);
    }
    Ok(())
}

#[tokio::test]
async fn grade_certificate_is_open_to_the_enrolled_student() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.login_as("admin", &["Administrador"]).await?;
    let career = app.insert_career("CONT", "Contaduría General").await?;
    let student_id = app.insert_student("EST-009", "Ana", "Mamani", true).await?;
    let enrollment_id = app.insert_enrollment(student_id, career, 2025, "Matriculado").await?;
    let section_id = app.insert_section("CON-101", "Contabilidad I", career).await?;

    let recorded = app
        .send(
            "POST",
            "/grades",
            Some(&admin),
            Some(json!({
                "enrollment_id": enrollment_id,
                "section_id": section_id,
                "first_partial": 80.0,
                "third_partial": 60.0
            })),
        )
        .await?;
    assert_eq!(recorded.status, StatusCode::CREATED);

    let (owner_id, owner) = app.login_as("ana", &[]).await?;
    sqlx::query("UPDATE users SET student_id = ? WHERE id = ?")
        .bind(student_id)
        .bind(owner_id)
        .execute(&app.pool)
        .await?;
    let (_, stranger) = app.login_as("intruso", &[]).await?;

    let uri = format!("/reports/grades/{enrollment_id}");
    let own = app.get(&uri, Some(&owner)).await?;
    assert_eq!(own.status, StatusCode::OK);
    assert_eq!(
        own.disposition.as_deref(),
        Some("attachment; filename=\"certificado_notas_EST-009.pdf\"")
    );
    assert!(occurrences(&own.body, "Contabilidad I") >= 1);
    assert!(occurrences(&own.body, "70.00") >= 1);

    assert_eq!(app.get(&uri, Some(&stranger)).await?.status, StatusCode::FORBIDDEN);
    assert_eq!(app.get(&uri, Some(&admin)).await?.status, StatusCode::OK);
    assert_eq!(
        app.get("/reports/grades/9999", Some(&admin)).await?.status,
        StatusCode::NOT_FOUND
    );
    Ok(())
}

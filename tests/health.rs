mod common;

use anyhow::Result;
use axum::http::StatusCode;

use common::TestApp;

#[tokio::test]
async fn health_reports_database_status() -> Result<()> {
    let app = TestApp::new().await?;

    let response = app.get("/api/health", None).await?;
    assert_eq!(response.status, StatusCode::OK);

    let body = response.json()?;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["db_ok"], true);
    Ok(())
}

#[tokio::test]
async fn openapi_document_is_served_with_bearer_scheme() -> Result<()> {
    let app = TestApp::new().await?;

    let response = app.get("/api-docs/openapi.json", None).await?;
    assert_eq!(response.status, StatusCode::OK);

    let doc = response.json()?;
    assert!(doc["paths"]["/reports/students"].is_object());
    assert!(doc["paths"]["/rbac/roles"].is_object());
    assert!(doc["paths"]["/api/dashboard"].is_object());
    assert_eq!(doc["components"]["securitySchemes"]["bearerAuth"]["scheme"], "bearer");
    Ok(())
}

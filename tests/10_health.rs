mod common;

use anyhow::Result;
use common::TestServer;
use reqwest::StatusCode;
use serde_json::Value;
use uuid::Uuid;

use vete_api::database::models::{Profile, Role};

#[tokio::test]
async fn root_describes_the_api() -> Result<()> {
    let server = TestServer::start().await?;
    let body: Value = server.client.get(server.url("/")).send().await?.json().await?;

    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "vete-api");
    Ok(())
}

#[tokio::test]
async fn health_reports_ok_and_echoes_request_id() -> Result<()> {
    let server = TestServer::start().await?;
    let response = server
        .client
        .get(server.url("/health"))
        .header("x-request-id", "req-123")
        .send()
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("req-123")
    );
    let body: Value = response.json().await?;
    assert_eq!(body["data"]["status"], "ok");
    Ok(())
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() -> Result<()> {
    let server = TestServer::start().await?;

    let response = server.client.get(server.url("/api/appointments")).send().await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: Value = response.json().await?;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let response = server
        .client
        .get(server.url("/api/appointments"))
        .bearer_auth("not-a-jwt")
        .send()
        .await?;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn token_without_profile_is_forbidden() -> Result<()> {
    let server = TestServer::start().await?;
    let ghost = Profile {
        id: Uuid::new_v4(),
        tenant_id: common::TENANT.to_string(),
        role: Role::Admin,
        full_name: None,
    };

    let (status, body) = server.get("/api/appointments", &ghost).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Perfil no encontrado");
    Ok(())
}

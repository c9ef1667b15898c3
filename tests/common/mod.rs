#![allow(dead_code)]

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use serde_json::Value;
use uuid::Uuid;

use vete_api::appointments::AppointmentStatus;
use vete_api::auth::{generate_jwt, Claims};
use vete_api::config::{AppConfig, StoreBackend};
use vete_api::database::models::{Appointment, NewAppointment, Pet, Profile, Role};
use vete_api::database::MemoryStore;
use vete_api::revalidate::RecordingRevalidator;
use vete_api::{app, AppState};

pub const TENANT: &str = "adris";
pub const OTHER_TENANT: &str = "petlife";
pub const JWT_SECRET: &str = "test-secret";
pub const CRON_SECRET: &str = "cron-secret";

/// Seeded users of the two clinics
pub struct Cast {
    pub vet: Profile,
    pub admin: Profile,
    pub owner: Profile,
    pub stranger: Profile,
    pub other_admin: Profile,
    pub pet: Pet,
}

/// In-process server on its own port, backed by a fresh in-memory store
pub struct TestServer {
    pub base_url: String,
    pub store: Arc<MemoryStore>,
    pub revalidator: Arc<RecordingRevalidator>,
    pub client: reqwest::Client,
    pub cast: Cast,
}

fn profile(role: Role, tenant: &str, name: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        tenant_id: tenant.to_string(),
        role,
        full_name: Some(name.to_string()),
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.backend = StoreBackend::Memory;
    config.server.host = "127.0.0.1".to_string();
    config.security.jwt_secret = JWT_SECRET.to_string();
    config.security.cron_secret = Some(CRON_SECRET.to_string());
    config.security.enable_audit_logging = true;
    config.api.enable_rate_limiting = false;
    config.monitoring.alerting_enabled = false;
    config.monitoring.alert_webhook_url = None;
    config
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(|_| {}).await
    }

    pub async fn start_with(tweak: impl FnOnce(&mut AppConfig)) -> Result<Self> {
        let mut config = test_config();
        tweak(&mut config);

        let store = Arc::new(MemoryStore::new());
        let owner = profile(Role::Owner, TENANT, "Ana Benítez");
        let pet = Pet {
            id: Uuid::new_v4(),
            tenant_id: TENANT.to_string(),
            owner_id: owner.id,
            name: "Firulais".to_string(),
            species: Some("dog".to_string()),
        };
        let cast = Cast {
            vet: profile(Role::Vet, TENANT, "Dra. Ruiz"),
            admin: profile(Role::Admin, TENANT, "Admin Adris"),
            owner,
            stranger: profile(Role::Owner, TENANT, "Otro Cliente"),
            other_admin: profile(Role::Admin, OTHER_TENANT, "Admin Petlife"),
            pet,
        };
        for p in [&cast.vet, &cast.admin, &cast.owner, &cast.stranger, &cast.other_admin] {
            store.put_profile(p.clone()).await;
        }
        store.put_pet(cast.pet.clone()).await;

        let revalidator = Arc::new(RecordingRevalidator::new());
        let state = AppState::new(config, store.clone(), revalidator.clone());

        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let router = app(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            base_url: format!("http://127.0.0.1:{}", port),
            store,
            revalidator,
            client: reqwest::Client::new(),
            cast,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn token(&self, profile: &Profile) -> String {
        generate_jwt(JWT_SECRET, &Claims::new(profile.id, None, 1)).expect("token")
    }

    pub async fn get(&self, path: &str, as_user: &Profile) -> Result<(reqwest::StatusCode, Value)> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(self.token(as_user))
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    pub async fn post(&self, path: &str, as_user: &Profile, body: Value) -> Result<(reqwest::StatusCode, Value)> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(self.token(as_user))
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        Ok((status, response.json().await?))
    }

    /// Insert an appointment for the seeded pet directly into the store
    pub async fn seed_appointment(&self, status: AppointmentStatus, starts_in: Duration) -> Appointment {
        let start = Utc::now() + starts_in;
        let appointment = NewAppointment {
            tenant_id: TENANT.to_string(),
            pet_id: self.cast.pet.id,
            owner_id: self.cast.owner.id,
            vet_id: Some(self.cast.vet.id),
            start_time: start,
            end_time: start + Duration::minutes(30),
            status,
            reason: "Vacunación anual".to_string(),
            created_by: self.cast.vet.id,
        }
        .into_appointment(Utc::now());
        self.store.put_appointment(appointment.clone()).await;
        appointment
    }

    pub async fn stored_status(&self, id: Uuid) -> AppointmentStatus {
        self.store
            .appointment(id)
            .await
            .map(|a| a.status)
            .expect("appointment exists")
    }
}

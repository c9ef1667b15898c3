use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::appointments::status::AppointmentStatus;
use crate::database::manager::DatabaseError;
use crate::database::models::{Appointment, AppointmentFilter, NewAppointment, Pet, Profile, TransitionPatch};
use crate::database::store::AppointmentStore;

/// Process-local store. Backs `VETE_STORE=memory` and the test suites.
#[derive(Default)]
pub struct MemoryStore {
    profiles: RwLock<HashMap<Uuid, Profile>>,
    pets: RwLock<HashMap<Uuid, Pet>>,
    appointments: RwLock<HashMap<Uuid, Appointment>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put_profile(&self, profile: Profile) {
        self.profiles.write().await.insert(profile.id, profile);
    }

    pub async fn put_pet(&self, pet: Pet) {
        self.pets.write().await.insert(pet.id, pet);
    }

    /// Insert or replace an appointment as-is, bypassing lifecycle checks
    pub async fn put_appointment(&self, appointment: Appointment) {
        self.appointments.write().await.insert(appointment.id, appointment);
    }

    pub async fn appointment(&self, id: Uuid) -> Option<Appointment> {
        self.appointments.read().await.get(&id).cloned()
    }
}

fn occupies_slot(status: AppointmentStatus) -> bool {
    !matches!(status, AppointmentStatus::Cancelled | AppointmentStatus::NoShow)
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, DatabaseError> {
        Ok(self.profiles.read().await.get(&user_id).cloned())
    }

    async fn find_pet(&self, tenant_id: &str, pet_id: Uuid) -> Result<Option<Pet>, DatabaseError> {
        Ok(self
            .pets
            .read()
            .await
            .get(&pet_id)
            .filter(|pet| pet.tenant_id == tenant_id)
            .cloned())
    }

    async fn find_appointment(&self, tenant_id: &str, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        Ok(self
            .appointments
            .read()
            .await
            .get(&id)
            .filter(|a| a.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_appointments(
        &self,
        tenant_id: &str,
        filter: &AppointmentFilter,
    ) -> Result<(Vec<Appointment>, i64), DatabaseError> {
        let appointments = self.appointments.read().await;
        let mut matching: Vec<Appointment> = appointments
            .values()
            .filter(|a| a.tenant_id == tenant_id && filter.matches(a))
            .cloned()
            .collect();
        matching.sort_by_key(|a| a.start_time);

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_owner_appointments(&self, tenant_id: &str, owner_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let mut owned: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.tenant_id == tenant_id && a.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(owned)
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, DatabaseError> {
        let appointment = new.into_appointment(Utc::now());
        self.appointments
            .write()
            .await
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn apply_transition(
        &self,
        tenant_id: &str,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &TransitionPatch,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(a) if a.tenant_id == tenant_id && a.status == expected => {
                patch.apply(a);
                Ok(Some(a.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn reschedule(
        &self,
        tenant_id: &str,
        id: Uuid,
        expected: AppointmentStatus,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let mut appointments = self.appointments.write().await;
        match appointments.get_mut(&id) {
            Some(a) if a.tenant_id == tenant_id && a.status == expected => {
                a.start_time = start_time;
                a.end_time = end_time;
                a.updated_at = updated_at;
                Ok(Some(a.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn has_overlap(
        &self,
        tenant_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        vet_id: Option<Uuid>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DatabaseError> {
        Ok(self.appointments.read().await.values().any(|a| {
            a.tenant_id == tenant_id
                && Some(a.id) != exclude_id
                && occupies_slot(a.status)
                && vet_id.map_or(true, |vet| a.vet_id == Some(vet))
                && a.start_time < end_time
                && a.end_time > start_time
        }))
    }

    async fn find_overdue(
        &self,
        status: AppointmentStatus,
        started_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let mut overdue: Vec<Appointment> = self
            .appointments
            .read()
            .await
            .values()
            .filter(|a| a.status == status && a.start_time < started_before)
            .cloned()
            .collect();
        overdue.sort_by_key(|a| a.start_time);
        overdue.truncate(limit as usize);
        Ok(overdue)
    }
}

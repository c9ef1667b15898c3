//! Single authorization policy for every appointment path.
//!
//! Handlers never inspect roles themselves; they build a [`Resource`] and ask
//! [`authorize`] whether the actor may perform an [`Action`] on it.

use thiserror::Error;
use uuid::Uuid;

use crate::database::models::{Appointment, Pet, Profile, Role};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    View,
    ListClinic,
    Book,
    ChangeStatus,
    Cancel,
    Reschedule,
    ViewMonitoring,
}

/// What an action targets
#[derive(Debug, Clone, Copy)]
pub enum Resource<'a> {
    Appointment { tenant_id: &'a str, owner_id: Uuid },
    Pet { tenant_id: &'a str, owner_id: Uuid },
    Clinic { tenant_id: &'a str },
}

impl<'a> Resource<'a> {
    pub fn appointment(appointment: &'a Appointment) -> Self {
        Resource::Appointment {
            tenant_id: &appointment.tenant_id,
            owner_id: appointment.owner_id,
        }
    }

    pub fn pet(pet: &'a Pet) -> Self {
        Resource::Pet {
            tenant_id: &pet.tenant_id,
            owner_id: pet.owner_id,
        }
    }

    pub fn clinic(tenant_id: &'a str) -> Self {
        Resource::Clinic { tenant_id }
    }

    fn tenant_id(&self) -> &'a str {
        match *self {
            Resource::Appointment { tenant_id, .. } => tenant_id,
            Resource::Pet { tenant_id, .. } => tenant_id,
            Resource::Clinic { tenant_id } => tenant_id,
        }
    }

    fn owner_id(&self) -> Option<Uuid> {
        match *self {
            Resource::Appointment { owner_id, .. } | Resource::Pet { owner_id, .. } => Some(owner_id),
            Resource::Clinic { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyDenial {
    #[error("La cita no pertenece a esta clínica")]
    TenantMismatch,
    #[error("Solo el personal de la clínica puede realizar esta acción")]
    StaffOnly,
    #[error("Solo un administrador puede realizar esta acción")]
    AdminOnly,
    #[error("No tienes permiso para realizar esta acción")]
    NotOwner,
}

pub fn authorize(actor: &Profile, resource: Resource<'_>, action: Action) -> Result<(), PolicyDenial> {
    if actor.tenant_id != resource.tenant_id() {
        return Err(PolicyDenial::TenantMismatch);
    }

    match action {
        Action::ViewMonitoring => {
            if actor.role == Role::Admin {
                Ok(())
            } else {
                Err(PolicyDenial::AdminOnly)
            }
        }
        Action::ListClinic | Action::ChangeStatus => {
            if actor.is_staff() {
                Ok(())
            } else {
                Err(PolicyDenial::StaffOnly)
            }
        }
        Action::View | Action::Book | Action::Cancel | Action::Reschedule => {
            if actor.is_staff() || resource.owner_id() == Some(actor.id) {
                Ok(())
            } else {
                Err(PolicyDenial::NotOwner)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(role: Role, tenant: &str) -> Profile {
        Profile {
            id: Uuid::new_v4(),
            tenant_id: tenant.to_string(),
            role,
            full_name: None,
        }
    }

    #[test]
    fn staff_may_change_status_in_own_clinic() {
        let vet = profile(Role::Vet, "adris");
        let target = Resource::Appointment { tenant_id: "adris", owner_id: Uuid::new_v4() };
        assert_eq!(authorize(&vet, target, Action::ChangeStatus), Ok(()));
    }

    #[test]
    fn other_clinic_is_denied_regardless_of_role() {
        let admin = profile(Role::Admin, "adris");
        let target = Resource::Appointment { tenant_id: "petlife", owner_id: Uuid::new_v4() };
        for action in [Action::View, Action::ChangeStatus, Action::Cancel, Action::ViewMonitoring] {
            assert_eq!(authorize(&admin, target, action), Err(PolicyDenial::TenantMismatch));
        }
    }

    #[test]
    fn owner_cannot_change_status_but_may_cancel_own() {
        let owner = profile(Role::Owner, "adris");
        let own = Resource::Appointment { tenant_id: "adris", owner_id: owner.id };
        assert_eq!(authorize(&owner, own, Action::ChangeStatus), Err(PolicyDenial::StaffOnly));
        assert_eq!(authorize(&owner, own, Action::Cancel), Ok(()));
        assert_eq!(authorize(&owner, own, Action::Reschedule), Ok(()));
        assert_eq!(authorize(&owner, own, Action::View), Ok(()));
    }

    #[test]
    fn owner_cannot_touch_someone_elses_appointment() {
        let owner = profile(Role::Owner, "adris");
        let other = Resource::Appointment { tenant_id: "adris", owner_id: Uuid::new_v4() };
        assert_eq!(authorize(&owner, other, Action::View), Err(PolicyDenial::NotOwner));
        assert_eq!(authorize(&owner, other, Action::Cancel), Err(PolicyDenial::NotOwner));
    }

    #[test]
    fn monitoring_is_admin_only() {
        let clinic = Resource::clinic("adris");
        assert_eq!(authorize(&profile(Role::Admin, "adris"), clinic, Action::ViewMonitoring), Ok(()));
        assert_eq!(
            authorize(&profile(Role::Vet, "adris"), clinic, Action::ViewMonitoring),
            Err(PolicyDenial::AdminOnly)
        );
    }

    #[test]
    fn clients_cannot_list_the_clinic_schedule() {
        let clinic = Resource::clinic("adris");
        assert_eq!(
            authorize(&profile(Role::Owner, "adris"), clinic, Action::ListClinic),
            Err(PolicyDenial::StaffOnly)
        );
    }
}

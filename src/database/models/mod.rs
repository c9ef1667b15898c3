pub mod appointment;
pub mod pet;
pub mod profile;

pub use appointment::{Appointment, AppointmentFilter, NewAppointment, Page, TransitionPatch};
pub use pet::Pet;
pub use profile::{Profile, Role};

pub mod error;
pub mod service;
pub mod status;

pub use error::{AppointmentError, AppointmentResult};
pub use service::{AppointmentService, BookingRequest, ClinicQuery, OwnerAppointments, SystemTransition};
pub use status::AppointmentStatus;

pub mod appointment;
pub mod wizard;

pub use appointment::AppointmentCreationService;
pub use wizard::{PaymentStatusView, WizardService};

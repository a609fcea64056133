pub mod availability;
pub mod doctor;

pub use availability::SlotService;
pub use doctor::DoctorDirectoryService;

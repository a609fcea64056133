pub mod booking;
pub mod final_report;
pub mod lifecycle;

pub use booking::BookingService;
pub use final_report::FinalReportService;
pub use lifecycle::AppointmentLifecycleService;

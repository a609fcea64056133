pub mod chat;
pub mod document;
pub mod report;

pub use chat::ChatService;
pub use document::DocumentService;
pub use report::ReportService;

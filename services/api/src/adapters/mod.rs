pub mod blob_store;
pub mod gemini;
pub mod google_calendar;

pub use blob_store::{ObjectStoreGateway, UnavailableStore};
pub use gemini::GeminiAdapter;
pub use google_calendar::GoogleCalendarAdapter;

pub mod activity_log;
pub mod client;
pub mod counter;
pub mod draft_request;
pub mod inquiry;
pub mod project;
pub mod quotation;

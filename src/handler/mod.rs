pub mod activity_handler;
pub mod draft_handler;
pub mod quotation_handler;

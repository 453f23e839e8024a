pub mod activity_router;
pub mod draft_router;
pub mod quotation_router;

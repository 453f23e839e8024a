pub mod activity_logger;
pub mod approval_service;
pub mod draft_service;
pub mod id_allocator;
pub mod quotation_service;

pub mod activity_dto;
pub mod approval_dto;
pub mod draft_dto;
pub mod quotation_dto;

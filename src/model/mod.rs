pub mod booking;
pub mod bucket;
pub mod photo;
pub mod upload;

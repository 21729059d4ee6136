pub mod chrome;
pub mod conversation;
pub mod landing;
pub mod markdown;

pub mod desc;
pub mod factory;
pub mod format;
pub mod mapped;
pub mod resource;
pub mod upload;
pub mod view_layout;

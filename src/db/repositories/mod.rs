pub mod profiles;
pub mod sessions;

pub mod inventory;
pub mod session;
pub mod stability;
pub mod status;

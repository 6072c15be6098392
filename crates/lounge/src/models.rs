pub mod message;
pub mod role;

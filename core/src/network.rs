pub mod client;
pub mod tcp;

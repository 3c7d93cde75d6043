pub mod quota;
pub mod range;
pub mod source;

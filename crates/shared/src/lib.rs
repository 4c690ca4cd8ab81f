pub mod domain;
pub mod error;
pub mod phone;
pub mod protocol;
pub mod validation;

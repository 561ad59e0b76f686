pub mod models;
pub mod signature;
pub mod text;
pub mod validation;

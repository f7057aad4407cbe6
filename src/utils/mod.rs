pub mod jwt;
pub mod query;

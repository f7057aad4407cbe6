// src/models/mod.rs

pub mod comment;
pub mod post;
pub mod query;
pub mod tag;
pub mod user;

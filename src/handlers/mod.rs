// src/handlers/mod.rs

pub mod post;
pub mod timeline;
pub mod topic;
pub mod user;

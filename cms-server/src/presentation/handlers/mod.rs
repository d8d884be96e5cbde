pub mod auth;
pub mod dashboard;
pub mod post;
pub mod user;

pub mod directory;
pub mod meeting;
pub mod post;
pub mod user_config;

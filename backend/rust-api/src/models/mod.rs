pub mod chat;
pub mod learning_path;
pub mod refresh_token;
pub mod user;

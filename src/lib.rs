pub mod app;
pub mod assume_role;
pub mod cache;
pub mod credentials;
pub mod error;
pub mod handler;
pub mod mfa;
pub mod profile;
pub mod run;
pub mod session;
pub mod settings;

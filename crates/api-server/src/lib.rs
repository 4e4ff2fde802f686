#![warn(clippy::unwrap_used)]

pub mod rest;
pub mod server;
pub mod subscription_rest;
pub mod swagger;

pub use rest::AppState;
pub use server::ApiServer;
pub use swagger::ApiDoc;

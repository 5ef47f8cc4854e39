pub mod client;
pub mod models;
pub mod page;

pub use client::LearnWebClient;
pub use models::ApiConfig;

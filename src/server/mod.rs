pub mod api;
pub mod builder;
pub mod handler;
pub mod listener;

pub use api::{AppState, ApiError};
pub use builder::ServerBuilder;
pub use handler::RequestHandler;

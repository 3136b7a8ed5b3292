pub mod api;
pub mod config;
pub mod error;
pub mod normalize;
pub mod observability;
pub mod relay;
pub mod routing;
pub mod state;

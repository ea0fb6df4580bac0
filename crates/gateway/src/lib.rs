pub mod proxy;
pub mod relay;
pub mod routes;
pub mod server;
pub mod singleflight;
pub mod state;

pub use server::{build_router, start_gateway};
pub use state::GatewayState;

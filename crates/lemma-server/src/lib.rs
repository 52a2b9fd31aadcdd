pub mod event_bus;
pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use event_bus::{EventBus, SessionEvent};
pub use server::{create_router, run_server};
pub use state::AppState;

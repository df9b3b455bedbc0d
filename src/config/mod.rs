pub mod app;
pub mod logging;

pub use app::PlcClientConfig;
pub use logging::init_logging;

pub mod config;
pub mod contexts;
pub mod correlator;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod logger;
pub mod transport;

pub use dispatcher::ProxyDispatcher;
pub use error::{EngineError, ProxyError, ProxyResult};

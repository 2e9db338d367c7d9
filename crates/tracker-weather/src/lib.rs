//! Weather providers for the forecast tracker
//!
//! Open-Meteo supplies forecasts and the historical actuals they are scored
//! against. NWS supplies forecasts addressed by a cached grid token.

pub mod cache;
pub mod http;
pub mod nws;
pub mod provider;
pub mod retry;
pub mod source;
pub mod types;

pub use cache::GridCache;
pub use http::HttpClient;
pub use nws::NwsClient;
pub use provider::OpenMeteoClient;
pub use retry::RetryConfig;
pub use source::{ActualsSource, ForecastRequest, ForecastSource, GridResolver};
pub use types::*;

pub mod caching;
pub mod open_er_api;

pub use caching::CachingRateProvider;
pub use open_er_api::OpenErApiProvider;

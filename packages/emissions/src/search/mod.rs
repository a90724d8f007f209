//! Report discovery: search providers and the report locator.

pub mod locator;
pub mod provider;

pub use locator::ReportLocator;
pub use provider::{BraveSearch, MockSearchProvider, ProviderResult, SearchProvider};

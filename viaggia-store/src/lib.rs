pub mod app_config;
pub mod aviationstack;
pub mod mock_provider;
pub mod resiliency;
pub mod store;

pub use app_config::Config;
pub use aviationstack::AviationStackProvider;
pub use mock_provider::MockFlightProvider;
pub use resiliency::GuardedProvider;
pub use store::Store;

//! Client-side data synchronization: one cached, observable store per REST
//! resource, all sharing a single authenticated HTTP client.

mod api_client;
mod context;
mod resource;
mod state;
mod store;

pub use api_client::{ApiClient, ClientError, ClientResult};
pub use context::AppContext;
pub use resource::Resource;
pub use state::StoreState;
pub use store::{InteractionStore, PersonStore, ResourceStore};

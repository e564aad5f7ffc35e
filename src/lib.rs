//! Resource kit: configuration-driven list/search/filter/CRUD layer over PostgreSQL.

pub mod config;
pub mod error;
pub mod flavor;
pub mod handlers;
pub mod params;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod settings;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{from_json_str, load_from_path, resolve, ResolvedModel, ResolvedResource, ResourcesConfig};
pub use error::{AppError, ConfigError};
pub use flavor::Flavor;
pub use params::ParamBag;
pub use query::{format_date, Page};
pub use response::{success_one, success_one_ok, success_page};
pub use routes::{common_routes, resource_routes, resource_routes_with_limit};
pub use service::ResourceService;
pub use settings::{init_tracing, Settings};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Store};

//! Accès PostgreSQL
//!
//! - [`pool`]: configuration et pool de connexions
//! - [`schema`]: création des tables
//! - [`postgres`]: lectures en lot pour les cartes
//! - [`admin`]: écritures d'administration

pub mod admin;
pub mod pool;
pub mod postgres;
pub mod schema;

pub use pool::{create_pool, is_unavailable, test_connection, DatabaseConfig, SslMode};
pub use postgres::{load_map_data, MapData, RegionOption};

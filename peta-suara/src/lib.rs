//! # peta-suara
//!
//! Serveur de cartes électorales colorées à partir des rekap stockés dans
//! PostgreSQL.
//!
//! ## Features
//!
//! - API HTTP `/api/geo-data` (kokab, kecamatan, desa; default, pilpres, pileg RI)
//! - Listes en cascade kabupaten → kecamatan → desa
//! - Lectures en lot, pool de connexions, TLS optionnel
//! - Écritures d'administration avec validation (hiérarchie, cakupan des dapil)
//!
//! ## Usage CLI
//!
//! ```bash
//! # Créer les tables
//! peta-suara init-schema --schema pemilu
//!
//! # Servir l'API
//! peta-suara serve --bind 0.0.0.0:8080 --config standard
//!
//! # Exporter une carte en GeoJSON
//! peta-suara export --level kecamatan --mode pilpres --kab-id 3204 --output bandung.geojson
//! ```

pub mod config;
pub mod directory;
pub mod render;
pub mod server;
pub mod store;

pub use config::Config;
pub use directory::ContestantDirectory;
pub use render::render_map;
pub use store::{create_pool, DatabaseConfig};

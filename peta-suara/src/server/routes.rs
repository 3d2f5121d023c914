//! Handlers HTTP

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use geojson::FeatureCollection;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use rekap::{MapRequest, RegionId, RegionLevel};

use super::error::AppError;
use super::state::{AppState, SharedState};
use crate::render::render_map;
use crate::store::postgres::children_of;
use crate::store::{test_connection, RegionOption};

/// Paramètres de `/api/geo-data`.
///
/// Les identifiants restent des chaînes pour répondre en JSON à une valeur
/// non numérique.
#[derive(Debug, Default, Deserialize)]
pub struct GeoDataQuery {
    pub level: Option<String>,
    pub mode: Option<String>,
    pub kab_id: Option<String>,
    pub kec_id: Option<String>,
}

impl GeoDataQuery {
    /// `mode` remplace le paramètre de requête (route `/api/{mode}/geo-data`)
    pub fn to_request(&self, mode: Option<&str>) -> Result<MapRequest, AppError> {
        let kab_id = parse_id("kab_id", self.kab_id.as_deref())?;
        let kec_id = parse_id("kec_id", self.kec_id.as_deref())?;
        let mode = mode.or(self.mode.as_deref());
        Ok(MapRequest::from_query(
            self.level.as_deref(),
            mode,
            kab_id,
            kec_id,
        )?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct KecamatanQuery {
    pub kabupaten_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DesaQuery {
    pub kecamatan_id: Option<String>,
}

fn parse_id(name: &str, raw: Option<&str>) -> Result<Option<RegionId>, AppError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid {}: {}", name, value))),
    }
}

fn require_id(name: &str, raw: Option<&str>) -> Result<RegionId, AppError> {
    parse_id(name, raw)?.ok_or_else(|| AppError::BadRequest(format!("Missing {}", name)))
}

async fn render(state: &AppState, request: &MapRequest) -> Result<FeatureCollection, AppError> {
    let (collection, _report) = render_map(
        &state.pool,
        &state.schema,
        &state.config,
        &state.contestants,
        request,
    )
    .await?;
    Ok(collection)
}

/// `GET /api/geo-data?level=&mode=&kab_id=&kec_id=`
pub async fn geo_data_handler(
    State(state): State<SharedState>,
    Query(query): Query<GeoDataQuery>,
) -> Result<Json<FeatureCollection>, AppError> {
    let request = query.to_request(None)?;
    Ok(Json(render(&state, &request).await?))
}

/// `GET /api/{mode}/geo-data`
pub async fn contest_geo_data_handler(
    State(state): State<SharedState>,
    Path(mode): Path<String>,
    Query(query): Query<GeoDataQuery>,
) -> Result<Json<FeatureCollection>, AppError> {
    let request = query.to_request(Some(&mode))?;
    Ok(Json(render(&state, &request).await?))
}

/// `GET /api/wilayah/kecamatan?kabupaten_id=`
pub async fn kecamatan_handler(
    State(state): State<SharedState>,
    Query(query): Query<KecamatanQuery>,
) -> Result<Json<Vec<RegionOption>>, AppError> {
    let parent = require_id("kabupaten_id", query.kabupaten_id.as_deref())?;
    let options = children_of(&state.pool, &state.schema, parent, RegionLevel::Kecamatan).await?;
    Ok(Json(options))
}

/// `GET /api/wilayah/desa?kecamatan_id=`
pub async fn desa_handler(
    State(state): State<SharedState>,
    Query(query): Query<DesaQuery>,
) -> Result<Json<Vec<RegionOption>>, AppError> {
    let parent = require_id("kecamatan_id", query.kecamatan_id.as_deref())?;
    let options = children_of(&state.pool, &state.schema, parent, RegionLevel::Desa).await?;
    Ok(Json(options))
}

pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    match test_connection(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "database": "up" })),
        ),
        Err(e) => {
            warn!(error = %format!("{:#}", e), "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "degraded", "database": "down" })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rekap::{ContestKind, MapMode};

    fn query(
        level: Option<&str>,
        mode: Option<&str>,
        kab: Option<&str>,
        kec: Option<&str>,
    ) -> GeoDataQuery {
        GeoDataQuery {
            level: level.map(String::from),
            mode: mode.map(String::from),
            kab_id: kab.map(String::from),
            kec_id: kec.map(String::from),
        }
    }

    #[test]
    fn test_defaults() {
        let request = GeoDataQuery::default().to_request(None).unwrap();
        assert_eq!(request.level, RegionLevel::Kabupaten);
        assert_eq!(request.mode, MapMode::Default);
        assert_eq!(request.scope, None);
    }

    #[test]
    fn test_scoped_desa_request() {
        let request = query(Some("desa"), Some("pilpres"), Some("3204"), Some(" 320401 "))
            .to_request(None)
            .unwrap();
        assert_eq!(request.level, RegionLevel::Desa);
        assert_eq!(request.mode, MapMode::Contest(ContestKind::Pilpres));
        assert_eq!(request.scope, Some(320401));
    }

    #[test]
    fn test_path_mode_overrides_query() {
        let request = query(Some("kecamatan"), Some("pilpres"), Some("3204"), None)
            .to_request(Some("pileg_ri"))
            .unwrap();
        assert_eq!(request.mode, MapMode::Contest(ContestKind::PilegRi));
        assert_eq!(request.scope, Some(3204));
    }

    #[test]
    fn test_invalid_parameters_are_bad_requests() {
        for bad in [
            query(Some("provinsi"), None, None, None),
            query(None, Some("pilkada"), None, None),
            query(Some("kecamatan"), None, Some("bandung"), None),
        ] {
            let err = bad.to_request(None).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }

    #[test]
    fn test_empty_id_is_ignored() {
        let request = query(Some("kecamatan"), None, Some(""), None)
            .to_request(None)
            .unwrap();
        assert_eq!(request.scope, None);
    }

    #[test]
    fn test_require_id() {
        assert_eq!(require_id("kabupaten_id", Some("3204")).unwrap(), 3204);
        assert!(matches!(
            require_id("kabupaten_id", None),
            Err(AppError::BadRequest(_))
        ));
    }
}

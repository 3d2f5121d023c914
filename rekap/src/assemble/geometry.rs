//! Normalisation des payloads GeoJSON stockés
//!
//! Les contours arrivent sous des formes variées selon l'outil d'import:
//! géométrie nue, Feature, FeatureCollection à une seule feature, voire
//! chaîne JSON encodée deux fois. Tout est ramené à une géométrie
//! polygonale nue.

use geo::BoundingRect;
use geojson::{GeoJson, JsonObject, Value};

use crate::error::{RekapError, Result};
use crate::types::RegionId;

/// Profondeur maximale d'encodage JSON imbriqué acceptée
const MAX_ENCODING_DEPTH: usize = 3;

/// Géométrie prête à être émise
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedGeometry {
    pub geometry: geojson::Geometry,
    /// Propriétés de la Feature source, le cas échéant
    pub properties: Option<JsonObject>,
    /// `[min_x, min_y, max_x, max_y]`
    pub bbox: Vec<f64>,
}

/// Normalise un payload brut.
///
/// `Ok(None)` pour un payload absent ou blanc (brouillon).
///
/// # Errors
///
/// `InvalidGeometry` si le JSON est illisible, si la géométrie n'est pas un
/// Polygon/MultiPolygon ou si un anneau est vide ou dégénéré.
pub fn normalize(region_id: RegionId, payload: Option<&str>) -> Result<Option<NormalizedGeometry>> {
    let Some(raw) = payload.map(str::trim).filter(|p| !p.is_empty()) else {
        return Ok(None);
    };

    let mut value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| RekapError::invalid_geometry(region_id, format!("invalid JSON: {}", e)))?;

    // Chaîne JSON encodée plusieurs fois
    let mut depth = 0;
    while let serde_json::Value::String(inner) = &value {
        if inner.trim().is_empty() {
            return Ok(None);
        }
        depth += 1;
        if depth > MAX_ENCODING_DEPTH {
            return Err(RekapError::invalid_geometry(
                region_id,
                "too many JSON encoding levels",
            ));
        }
        let decoded = serde_json::from_str(inner).map_err(|e| {
            RekapError::invalid_geometry(region_id, format!("invalid nested JSON: {}", e))
        })?;
        value = decoded;
    }

    if value.is_null() {
        return Ok(None);
    }

    let geojson = GeoJson::from_json_value(value)
        .map_err(|e| RekapError::invalid_geometry(region_id, format!("not GeoJSON: {}", e)))?;

    let (geometry, properties) = match geojson {
        GeoJson::Geometry(geometry) => (Some(geometry), None),
        GeoJson::Feature(feature) => (feature.geometry, feature.properties),
        GeoJson::FeatureCollection(collection) => {
            let count = collection.features.len();
            let mut features = collection.features.into_iter();
            match (features.next(), count) {
                (Some(feature), 1) => (feature.geometry, feature.properties),
                (None, _) => (None, None),
                (Some(_), n) => {
                    return Err(RekapError::invalid_geometry(
                        region_id,
                        format!("expected a single feature, found {}", n),
                    ))
                }
            }
        }
    };

    let Some(geometry) = geometry else {
        return Ok(None);
    };

    check_polygonal(region_id, &geometry.value)?;

    let shape = geo::Geometry::<f64>::try_from(geometry.value.clone())
        .map_err(|e| RekapError::invalid_geometry(region_id, e.to_string()))?;
    let rect = shape
        .bounding_rect()
        .ok_or_else(|| RekapError::invalid_geometry(region_id, "empty geometry"))?;

    Ok(Some(NormalizedGeometry {
        geometry: geojson::Geometry::new(geometry.value),
        properties,
        bbox: vec![rect.min().x, rect.min().y, rect.max().x, rect.max().y],
    }))
}

/// Vérifie la forme polygonale avant conversion
fn check_polygonal(region_id: RegionId, value: &Value) -> Result<()> {
    match value {
        Value::Polygon(rings) => check_polygon(region_id, rings),
        Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err(RekapError::invalid_geometry(region_id, "empty MultiPolygon"));
            }
            polygons.iter().try_for_each(|rings| check_polygon(region_id, rings))
        }
        other => Err(RekapError::invalid_geometry(
            region_id,
            format!("unsupported geometry type {}", type_name(other)),
        )),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
}

fn check_polygon(region_id: RegionId, rings: &[Vec<Vec<f64>>]) -> Result<()> {
    if rings.is_empty() {
        return Err(RekapError::invalid_geometry(region_id, "polygon without rings"));
    }
    for ring in rings {
        // Anneau fermé: au moins 4 positions
        if ring.len() < 4 {
            return Err(RekapError::invalid_geometry(
                region_id,
                format!("ring with {} positions", ring.len()),
            ));
        }
        if let Some(bad) = ring
            .iter()
            .find(|pos| pos.len() < 2 || !pos.iter().all(|c| c.is_finite()))
        {
            return Err(RekapError::invalid_geometry(
                region_id,
                format!("invalid position {:?}", bad),
            ));
        }
    }
    Ok(())
}

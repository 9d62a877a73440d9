use std::path::Path;

use geojson::{Feature, GeoJson, Geometry, Value};
use serde_json::{Map, Value as JsonValue};
use tracing::{info, instrument};

use crate::{
    error::{OutlineError, Result},
    types::{Contour, PixelScale},
};

fn checked_scale(scale: impl Into<PixelScale>) -> Result<PixelScale> {
    let scale = scale.into();
    if !scale.is_valid() {
        return Err(OutlineError::InvalidInput(format!(
            "pixels per mm must be positive, got {} x {}",
            scale.x, scale.y
        )));
    }
    Ok(scale)
}

/// Export `contour` as a GeoJSON polygon feature in millimetres.
///
/// The ring is closed and Y is flipped to match the DXF export. Area,
/// perimeter and the scale used are carried in the feature properties.
pub fn contour_to_geojson(contour: &Contour, scale: impl Into<PixelScale>) -> Result<Feature> {
    let scale = checked_scale(scale)?;
    if contour.len() < 3 {
        return Err(OutlineError::InvalidInput(format!(
            "a polygon needs at least 3 points, got {}",
            contour.len()
        )));
    }

    let mut ring: Vec<Vec<f64>> = contour
        .points
        .iter()
        .map(|&[x, y]| vec![x / scale.x, -y / scale.y])
        .collect();
    if let Some(first) = ring.first().cloned() {
        ring.push(first);
    }

    let mm_per_px_mean = 2.0 / (scale.x + scale.y);
    let mut properties = Map::new();
    properties.insert(
        "area_mm2".to_string(),
        JsonValue::from(contour.area() / (scale.x * scale.y)),
    );
    properties.insert(
        "perimeter_mm".to_string(),
        JsonValue::from(contour.perimeter() * mm_per_px_mean),
    );
    properties.insert("point_count".to_string(), JsonValue::from(contour.len()));
    properties.insert("pixels_per_mm_x".to_string(), JsonValue::from(scale.x));
    properties.insert("pixels_per_mm_y".to_string(), JsonValue::from(scale.y));

    Ok(Feature {
        bbox: None,
        geometry: Some(Geometry::new(Value::Polygon(vec![ring]))),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Write `contour` as a pretty-printed GeoJSON feature.
#[instrument(skip(contour, scale), fields(path = %path.as_ref().display()))]
pub fn save_contour_to_geojson(
    contour: &Contour,
    scale: impl Into<PixelScale>,
    path: impl AsRef<Path>,
) -> Result<()> {
    let feature = contour_to_geojson(contour, scale)?;
    std::fs::write(path.as_ref(), serde_json::to_string_pretty(&feature)?)?;
    info!(points = contour.len(), "GeoJSON written");
    Ok(())
}

/// Read the exterior ring of the first polygon in `geojson` back into pixel
/// coordinates.
pub fn contour_from_geojson_str(geojson: &str, scale: impl Into<PixelScale>) -> Result<Contour> {
    let scale = checked_scale(scale)?;
    let geometry = match geojson.parse::<GeoJson>()? {
        GeoJson::Geometry(geometry) => Some(geometry),
        GeoJson::Feature(feature) => feature.geometry,
        GeoJson::FeatureCollection(collection) => collection
            .features
            .into_iter()
            .find_map(|feature| feature.geometry),
    };

    let Some(Geometry {
        value: Value::Polygon(rings),
        ..
    }) = geometry
    else {
        return Err(OutlineError::InvalidInput("GeoJSON holds no polygon".into()));
    };
    let exterior = rings
        .into_iter()
        .next()
        .ok_or_else(|| OutlineError::InvalidInput("polygon has no exterior ring".into()))?;

    let mut points = exterior
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok([x * scale.x, -y * scale.y]),
            _ => Err(OutlineError::InvalidInput(
                "position needs two coordinates".into(),
            )),
        })
        .collect::<Result<Vec<_>>>()?;
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    Ok(Contour::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn rectangle() -> Contour {
        Contour::new(vec![[0.0, 0.0], [200.0, 0.0], [200.0, 100.0], [0.0, 100.0]])
    }

    #[test]
    fn test_feature_is_closed_and_scaled() {
        let feature = contour_to_geojson(&rectangle(), 10.0).expect("Should export");
        let Some(Geometry {
            value: Value::Polygon(rings),
            ..
        }) = &feature.geometry
        else {
            panic!("Expected a polygon");
        };
        assert_eq!(rings.len(), 1);
        assert_eq!(rings[0].len(), 5);
        assert_eq!(rings[0].first(), rings[0].last());
        assert_eq!(rings[0][2], vec![20.0, -10.0]);

        let properties = feature.properties.as_ref().expect("Should have properties");
        assert_eq!(properties["point_count"], 4);
        let area = properties["area_mm2"].as_f64().expect("Should be numeric");
        assert!((area - 200.0).abs() < 1e-9);
        let perimeter = properties["perimeter_mm"].as_f64().expect("Should be numeric");
        assert!((perimeter - 60.0).abs() < 1e-9);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().expect("Should create temp dir");
        let path = dir.path().join("outline.geojson");
        let scale = PixelScale { x: 4.0, y: 5.0 };
        save_contour_to_geojson(&rectangle(), scale, &path).expect("Should save");

        let text = std::fs::read_to_string(&path).expect("Should read back");
        let contour = contour_from_geojson_str(&text, scale).expect("Should parse");
        assert_eq!(contour.len(), 4);
        for (a, b) in contour.points.iter().zip(&rectangle().points) {
            assert!((a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_rejects_degenerate_input() {
        let line = Contour::new(vec![[0.0, 0.0], [10.0, 0.0]]);
        assert!(matches!(contour_to_geojson(&line, 1.0), Err(OutlineError::InvalidInput(_))));
        assert!(matches!(
            contour_to_geojson(&rectangle(), -1.0),
            Err(OutlineError::InvalidInput(_))
        ));

        let point = r#"{"type":"Point","coordinates":[1.0,2.0]}"#;
        assert!(matches!(
            contour_from_geojson_str(point, 1.0),
            Err(OutlineError::InvalidInput(_))
        ));
        assert!(matches!(
            contour_from_geojson_str("not json", 1.0),
            Err(OutlineError::GeoJson(_))
        ));
    }
}

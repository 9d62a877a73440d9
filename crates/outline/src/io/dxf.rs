// DXF export of traced outlines (millimetres, CAD Y-up)

use std::path::Path;

use dxf::entities::{Entity, EntityCommon, EntityType, LwPolyline};
use dxf::enums::{AcadVersion, Units};
use dxf::{Drawing, LwPolylineVertex};
use tracing::{info, instrument};

use crate::{
    error::{OutlineError, Result},
    types::{Contour, PixelScale},
};

const LAYER: &str = "0";

/// Build a drawing holding `contour` as one closed polyline in millimetres.
///
/// Y is negated so the outline is not mirrored in Y-up CAD space.
pub fn contour_to_dxf(contour: &Contour, scale: impl Into<PixelScale>) -> Result<Drawing> {
    let scale = scale.into();
    if contour.is_empty() {
        return Err(OutlineError::InvalidInput("cannot export an empty contour".into()));
    }
    if !scale.is_valid() {
        return Err(OutlineError::InvalidInput(format!(
            "pixels per mm must be positive, got {} x {}",
            scale.x, scale.y
        )));
    }

    let mut drawing = Drawing::new();
    drawing.header.version = AcadVersion::R2000;
    drawing.header.default_drawing_units = Units::Millimeters;

    let mut polyline = LwPolyline::default();
    for &[x, y] in &contour.points {
        polyline.vertices.push(LwPolylineVertex {
            x: x / scale.x,
            y: -y / scale.y,
            ..Default::default()
        });
    }
    polyline.set_is_closed(true);

    let common = EntityCommon {
        layer: LAYER.to_string(),
        ..Default::default()
    };
    drawing.add_entity(Entity {
        common,
        specific: EntityType::LwPolyline(polyline),
    });
    Ok(drawing)
}

/// Write `contour` to a DXF file at `path`.
#[instrument(skip(contour, scale), fields(path = %path.as_ref().display(), points = contour.len()))]
pub fn save_contour_to_dxf(
    contour: &Contour,
    scale: impl Into<PixelScale>,
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    let file_name = path.to_str().ok_or_else(|| {
        OutlineError::InvalidInput(format!("output path is not UTF-8: {}", path.display()))
    })?;
    let drawing = contour_to_dxf(contour, scale)?;
    drawing.save_file(file_name)?;
    info!("DXF written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn square() -> Contour {
        Contour::new(vec![[0.0, 0.0], [200.0, 0.0], [200.0, 100.0], [0.0, 100.0]])
    }

    fn polyline(drawing: &Drawing) -> LwPolyline {
        let polylines: Vec<LwPolyline> = drawing
            .entities()
            .filter_map(|e| match &e.specific {
                EntityType::LwPolyline(p) => Some(p.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(polylines.len(), 1);
        polylines[0].clone()
    }

    #[test]
    fn test_vertices_are_scaled_and_flipped() {
        let drawing = contour_to_dxf(&square(), PixelScale { x: 10.0, y: 5.0 })
            .expect("Should build drawing");
        let polyline = polyline(&drawing);

        assert!(polyline.is_closed());
        assert_eq!(polyline.vertices.len(), 4);
        assert_eq!((polyline.vertices[2].x, polyline.vertices[2].y), (20.0, -20.0));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempdir().expect("Should create temp dir");
        let path = dir.path().join("outline.dxf");
        save_contour_to_dxf(&square(), 2.0, &path).expect("Should save DXF");

        let loaded = Drawing::load_file(path.to_str().expect("Should be UTF-8")).expect("Should load DXF");
        let polyline = polyline(&loaded);
        assert_eq!(polyline.vertices.len(), 4);
        assert!((polyline.vertices[1].x - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_empty_contour_and_bad_scale() {
        assert!(matches!(
            contour_to_dxf(&Contour::empty(), 1.0),
            Err(OutlineError::InvalidInput(_))
        ));
        assert!(matches!(
            contour_to_dxf(&square(), 0.0),
            Err(OutlineError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_unwritable_path() {
        let dir = tempdir().expect("Should create temp dir");
        let path = dir.path().join("missing").join("outline.dxf");
        let err = save_contour_to_dxf(&square(), 1.0, &path).expect_err("Should fail");
        assert_eq!(err.code(), crate::error::ErrorCode::DxfWriteFailed);
    }
}

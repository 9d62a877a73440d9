use tracing::{debug, warn};

use crate::{
    config::ProcessingConfig,
    types::{Contour, CLOSURE_TOLERANCE_PX},
};

/// Minimal geometric sanity checks on a final outline.
///
/// Fewer than three points or a perimeter below `min_perimeter` fails. A gap
/// between the first and last point above [`CLOSURE_TOLERANCE_PX`] is only
/// logged. Self-intersections are not checked.
pub fn validate_contour(contour: &Contour, config: &ProcessingConfig) -> bool {
    if contour.len() < 3 {
        warn!(points = contour.len(), "Contour has too few points");
        return false;
    }

    let perimeter = contour.perimeter();
    if perimeter < config.min_perimeter {
        warn!(perimeter, min = config.min_perimeter, "Contour perimeter too small");
        return false;
    }

    if config.validate_closed_contour {
        let gap = contour.closure_gap();
        if gap > CLOSURE_TOLERANCE_PX {
            warn!(gap, tolerance = CLOSURE_TOLERANCE_PX, "Contour may not be properly closed");
        }
    }

    debug!(points = contour.len(), perimeter, "Contour validated");
    true
}

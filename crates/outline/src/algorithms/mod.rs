pub mod preprocessing;
pub mod morphology;
pub mod extraction;
pub mod simplification;
pub mod boundary;
pub mod perspective;
pub mod segmentation;
pub mod merge;
pub mod smoothing;
pub mod dilation;
pub mod validation;

pub use preprocessing::{ClahePreprocessor, clahe};
pub use extraction::{external_contours, largest_contour, rasterize};
pub use simplification::{simplify_closed, convex_hull};
pub use boundary::{BoundaryDetection, CornerStrategy, locate_boundary, reduce_to_quad};
pub use perspective::{Rectified, refine_corners, rectify};
pub use segmentation::{ObjectBinarizer, segment_object};
pub use merge::merge_contours;
pub use smoothing::{ContourSmoother, smooth_contour};
pub use dilation::{ContourDilator, dilate_contour};
pub use validation::validate_contour;

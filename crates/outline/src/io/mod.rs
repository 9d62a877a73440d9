pub mod image;
pub mod dxf;
pub mod geojson;

pub use self::image::{check_image_size, estimate_processing_time, is_valid_image_file, load_grayscale, MIN_IMAGE_SIZE};
pub use self::dxf::{contour_to_dxf, save_contour_to_dxf};
pub use self::geojson::{contour_from_geojson_str, contour_to_geojson, save_contour_to_geojson};

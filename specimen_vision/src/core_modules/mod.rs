pub mod axis_resolver;
pub mod contour;
pub mod geometry;
pub mod measurement;
pub mod offset_projector;
pub mod oriented_box;
pub mod segmenter;

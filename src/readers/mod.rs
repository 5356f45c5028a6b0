pub mod outbreak_reader;
pub mod reference;
pub mod shape_reader;

pub use outbreak_reader::OutbreakReader;
pub use reference::{join_regions, start_months, ReferenceData};
pub use shape_reader::ShapeReader;

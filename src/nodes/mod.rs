//! Storage node selection, labelling and tainting

pub mod selection;

pub use selection::*;

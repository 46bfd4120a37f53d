pub mod store;

pub use store::{MeasurementBuffer, MeasurementSnapshot};

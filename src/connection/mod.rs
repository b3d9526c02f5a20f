//! Connection bundles handed to applications

pub mod live;

pub use live::CurveConnection;

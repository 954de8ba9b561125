//! Indian GST: invoice tax computation and a small advisory knowledge base

pub mod advisor;
pub mod gst;

pub use advisor::advise;

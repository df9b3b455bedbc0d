pub mod cbor;
pub mod multibase;

pub use multibase::Curve;

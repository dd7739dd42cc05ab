pub mod hash;
pub mod probe;
pub mod zones;

//! Platform identity.

pub mod os;

pub use os::Os;

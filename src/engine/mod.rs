pub mod bind;
pub mod diff;
pub mod failures;
pub mod patch;

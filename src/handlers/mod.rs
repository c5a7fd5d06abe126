pub mod media;
pub mod responses;
pub mod wizard;

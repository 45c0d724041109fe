pub mod attendance;
pub mod group;
pub mod user;

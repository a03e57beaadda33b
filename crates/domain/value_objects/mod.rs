pub mod credits;
pub mod enums;
pub mod generation;
pub mod plans;
pub mod projects;
pub mod subscriptions;
pub mod tracks;
pub mod users;

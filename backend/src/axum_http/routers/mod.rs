pub mod credits;
pub mod music;
pub mod projects;
pub mod stripe;
pub mod subscriptions;
pub mod tracks;
pub mod users;

pub mod credit_ledger;
pub mod projects;
pub mod subscriptions;
pub mod tracks;
pub mod users;

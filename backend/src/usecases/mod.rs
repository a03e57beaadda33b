pub mod billing;
pub mod credit_ledger;
pub mod gateways;
pub mod music_generation;
pub mod projects;
pub mod subscription_sync;
pub mod tracks;
pub mod users;
pub mod webhook_reconciler;

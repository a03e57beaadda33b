pub mod ledger_entry_types;
pub mod subscription_plans;
pub mod subscription_statuses;
pub mod track_statuses;

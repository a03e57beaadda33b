use std::sync::Arc;

use anyhow::Result;
use backend::{
    config::config_loader,
    usecases::subscription_sync::{SubscriptionSyncUseCase, SyncError},
};
use clap::{ArgGroup, Parser};
use crates::{
    domain::{entities::users::UserEntity, value_objects::subscriptions::SyncReport},
    infra::db::{
        postgres::postgres_connection,
        repositories::{subscriptions::SubscriptionPostgres, users::UserPostgres},
    },
    payments::stripe_client::StripeClient,
};
use tracing::{error, info};

/// Pulls subscription state from Stripe and overwrites the local copy.
#[derive(Parser)]
#[command(
    name = "subscription-sync",
    about = "Reconcile local subscription state with Stripe"
)]
#[command(group(ArgGroup::new("target").required(true).args(["email", "all"])))]
struct Args {
    /// Sync the user with this email address
    #[arg(long)]
    email: Option<String>,

    /// Sync every user that has a Stripe customer id
    #[arg(long)]
    all: bool,
}

type SyncUseCase = SubscriptionSyncUseCase<UserPostgres, SubscriptionPostgres, StripeClient>;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    dotenvy::dotenv().ok();

    if let Err(error) = crates::observability::init_observability("subscription-sync") {
        eprintln!("Failed to initialize observability: {}", error);
        std::process::exit(1);
    }

    match run(args).await {
        Ok(0) => {}
        Ok(failed) => {
            error!(failed, "subscription-sync finished with failures");
            std::process::exit(1);
        }
        Err(error) => {
            error!("subscription-sync exited with error: {}", error);
            std::process::exit(1);
        }
    }
}

/// Returns the number of users that failed to sync.
async fn run(args: Args) -> Result<usize> {
    let database = config_loader::load_database()?;
    let stripe = config_loader::load_stripe()?;

    let db_pool = Arc::new(postgres_connection::establish_connection(&database.url)?);

    // Checkout URLs are unused here; this tool never opens sessions.
    let stripe_client = StripeClient::new(
        stripe.secret_key,
        stripe.webhook_secret,
        String::new(),
        String::new(),
    )?;

    let usecase: SyncUseCase = SubscriptionSyncUseCase::new(
        Arc::new(UserPostgres::new(Arc::clone(&db_pool))),
        Arc::new(SubscriptionPostgres::new(Arc::clone(&db_pool))),
        Arc::new(stripe_client),
        stripe.prices,
    );

    if let Some(email) = args.email {
        let result = usecase.sync_user_by_email(&email).await;
        report(&email, &result);
        return Ok(usize::from(result.is_err()));
    }

    let users: Vec<UserEntity> = usecase.list_syncable_users().await?;
    info!(users = users.len(), "sync: starting full run");

    let mut failed = 0;
    for user in &users {
        let result = usecase.sync_user(user).await;
        if result.is_err() {
            failed += 1;
        }
        report(&user.email, &result);
    }

    info!(
        synced = users.len() - failed,
        failed, "sync: full run complete"
    );
    Ok(failed)
}

fn report(email: &str, result: &Result<SyncReport, SyncError>) {
    match result {
        Ok(report) => println!(
            "ok     {email}: {} {} ({}) until {}{}",
            report.subscription_id,
            report.plan,
            report.status,
            report.current_period_end.format("%Y-%m-%d"),
            if report.cancel_at_period_end {
                ", cancels at period end"
            } else {
                ""
            }
        ),
        Err(err) => println!("failed {email}: {err}"),
    }
}

use std::sync::Arc;

use axum::{Json, Router, extract::State, response::IntoResponse, routing::get};
use crates::{
    domain::repositories::{subscriptions::SubscriptionRepository, users::UserRepository},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{subscriptions::SubscriptionPostgres, users::UserPostgres},
    },
};

use crate::{
    auth::AuthUser, axum_http::error_responses::error_response, usecases::users::UserUseCase,
};

pub fn routes(db_pool: Arc<PgPoolSquad>) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let subscription_repository = SubscriptionPostgres::new(Arc::clone(&db_pool));
    let user_usecase = UserUseCase::new(
        Arc::new(user_repository),
        Arc::new(subscription_repository),
    );

    Router::new()
        .route("/init", get(init_user))
        .with_state(Arc::new(user_usecase))
}

pub async fn init_user<U, S>(
    State(user_usecase): State<Arc<UserUseCase<U, S>>>,
    auth: AuthUser,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync + 'static,
    S: SubscriptionRepository + Send + Sync + 'static,
{
    match user_usecase.init_user(auth.identity()).await {
        Ok(user) => Json(user).into_response(),
        Err(err) => error_response(&err),
    }
}

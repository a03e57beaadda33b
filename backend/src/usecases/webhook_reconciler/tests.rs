use super::*;
use crate::usecases::{gateways::MockPaymentGateway, users::fixtures};
use chrono::TimeZone;
use crates::domain::{
    entities::{credit_ledger::CreditLedgerEntryEntity, subscriptions::SubscriptionEntity},
    repositories::{
        credit_ledger::MockCreditLedgerRepository, subscriptions::MockSubscriptionRepository,
        users::MockUserRepository,
    },
};
use mockall::predicate::eq;
use serde_json::{Value, json};

const PERIOD_START: i64 = 1_740_787_200;
const PERIOD_END: i64 = 1_743_465_600;

fn prices() -> PriceCatalog {
    PriceCatalog::new(
        "price_basic".to_string(),
        "price_creator".to_string(),
        "price_team".to_string(),
    )
}

fn event(event_type: &str, object: Value) -> StripeEvent {
    serde_json::from_value(json!({
        "id": "evt_test",
        "type": event_type,
        "livemode": false,
        "data": { "object": object }
    }))
    .unwrap()
}

fn subscription_object(price_id: &str, status: &str) -> Value {
    json!({
        "id": "sub_123",
        "customer": "cus_123",
        "status": status,
        "cancel_at_period_end": false,
        "current_period_start": PERIOD_START,
        "current_period_end": PERIOD_END,
        "items": { "data": [{
            "price": {
                "id": price_id,
                "unit_amount": 2900,
                "currency": "usd",
                "recurring": { "interval": "month" }
            }
        }]}
    })
}

fn invoice_object() -> Value {
    json!({
        "id": "in_1",
        "customer": "cus_123",
        "subscription": "sub_123",
        "billing_reason": "subscription_cycle",
        "period_start": PERIOD_START - 2_678_400,
        "lines": { "data": [{ "period": { "start": PERIOD_START, "end": PERIOD_END } }] }
    })
}

fn gateway_returning(event: StripeEvent) -> MockPaymentGateway {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_verify_webhook_signature()
        .returning(move |_, _| Ok(event.clone()));
    gateway
}

fn subscription_row(user_id: Uuid, plan: &str) -> SubscriptionEntity {
    let now = Utc::now();
    SubscriptionEntity {
        id: Uuid::new_v4(),
        user_id,
        stripe_subscription_id: "sub_123".to_string(),
        stripe_customer_id: "cus_123".to_string(),
        stripe_price_id: "price_creator".to_string(),
        status: "active".to_string(),
        plan: plan.to_string(),
        current_period_start: now,
        current_period_end: now,
        cancel_at_period_end: false,
        canceled_at: None,
        amount: 2900,
        currency: "usd".to_string(),
        interval: "month".to_string(),
        created_at: now,
        updated_at: now,
    }
}

fn allocation_entry(user_id: Uuid, amount: i32) -> CreditLedgerEntryEntity {
    CreditLedgerEntryEntity {
        id: Uuid::new_v4(),
        user_id,
        entry_type: "allocation".to_string(),
        amount,
        description: "Monthly credit allocation (creator plan)".to_string(),
        metadata: json!({}),
        subscription_id: Some("sub_123".to_string()),
        idempotency_key: Some(format!("allocation:sub_123:{}", PERIOD_START)),
        balance_before: 12,
        balance_after: amount,
        created_at: Utc::now(),
    }
}

fn usecase(
    user_repo: MockUserRepository,
    subscription_repo: MockSubscriptionRepository,
    credit_ledger_repo: MockCreditLedgerRepository,
    gateway: MockPaymentGateway,
) -> WebhookReconcilerUseCase<
    MockUserRepository,
    MockSubscriptionRepository,
    MockCreditLedgerRepository,
    MockPaymentGateway,
> {
    WebhookReconcilerUseCase::new(
        Arc::new(user_repo),
        Arc::new(subscription_repo),
        Arc::new(credit_ledger_repo),
        Arc::new(gateway),
        prices(),
    )
}

#[tokio::test]
async fn missing_signature_is_rejected_without_verification() {
    let usecase = usecase(
        MockUserRepository::new(),
        MockSubscriptionRepository::new(),
        MockCreditLedgerRepository::new(),
        MockPaymentGateway::new(),
    );

    let err = usecase.handle(b"{}", None).await.unwrap_err();
    assert_eq!(err.code(), "WEBHOOK_SIGNATURE_ERROR");
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn invalid_signature_touches_no_repository() {
    let mut gateway = MockPaymentGateway::new();
    gateway
        .expect_verify_webhook_signature()
        .times(1)
        .returning(|_, _| Err(anyhow::anyhow!("no signature matches the payload")));

    // Repositories carry no expectations: any call would panic.
    let usecase = usecase(
        MockUserRepository::new(),
        MockSubscriptionRepository::new(),
        MockCreditLedgerRepository::new(),
        gateway,
    );

    let err = usecase
        .handle(b"{\"type\":\"invoice.payment_succeeded\"}", Some("t=1,v1=00"))
        .await
        .unwrap_err();
    assert!(matches!(err, WebhookError::InvalidSignature));
}

#[tokio::test]
async fn created_active_subscription_mirrors_state_and_grants_credits() {
    let user_id = Uuid::new_v4();

    let mut user_repo = MockUserRepository::new();
    user_repo
        .expect_find_by_stripe_customer_id()
        .withf(|customer_id| customer_id.to_string() == "cus_123")
        .returning(move |_| Ok(Some(fixtures::user(user_id))));
    user_repo
        .expect_apply_subscription_changes()
        .withf(move |id, changeset| {
            *id == user_id
                && changeset.subscription_plan.as_deref() == Some("creator")
                && changeset.subscription_status.as_deref() == Some("active")
                && changeset.subscription_id.as_deref() == Some("sub_123")
        })
        .times(1)
        .returning(|_, _| Ok(()));

    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_upsert()
        .withf(move |row| {
            row.user_id == user_id
                && row.plan == "creator"
                && row.amount == 2900
                && row.current_period_start.timestamp() == PERIOD_START
        })
        .times(1)
        .returning(move |_| Ok(subscription_row(user_id, "creator")));

    let mut credit_ledger_repo = MockCreditLedgerRepository::new();
    credit_ledger_repo
        .expect_allocate()
        .withf(move |model| {
            model.user_id == user_id
                && model.plan == SubscriptionPlan::Creator
                && model.idempotency_key() == format!("allocation:sub_123:{}", PERIOD_START)
        })
        .times(1)
        .returning(move |_| Ok(AllocationOutcome::Granted(allocation_entry(user_id, 1500))));

    let usecase = usecase(
        user_repo,
        subscription_repo,
        credit_ledger_repo,
        gateway_returning(event(
            "customer.subscription.created",
            subscription_object("price_creator", "active"),
        )),
    );

    let outcome = usecase.handle(b"{}", Some("t=1,v1=00")).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Applied {
            event_type: "customer.subscription.created".to_string(),
            allocation: Some(AllocationStatus::Granted { amount: 1500 }),
        }
    );
}

#[tokio::test]
async fn incomplete_subscription_is_mirrored_without_credits() {
    let user_id = Uuid::new_v4();

    let mut user_repo = MockUserRepository::new();
    user_repo
        .expect_find_by_stripe_customer_id()
        .returning(move |_| Ok(Some(fixtures::user(user_id))));
    user_repo
        .expect_apply_subscription_changes()
        .returning(|_, _| Ok(()));

    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_upsert()
        .returning(move |_| Ok(subscription_row(user_id, "basic")));

    let usecase = usecase(
        user_repo,
        subscription_repo,
        MockCreditLedgerRepository::new(),
        gateway_returning(event(
            "customer.subscription.created",
            subscription_object("price_basic", "incomplete"),
        )),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert!(matches!(
        outcome,
        WebhookOutcome::Applied {
            allocation: None,
            ..
        }
    ));
}

#[tokio::test]
async fn unknown_price_is_ignored_without_writes() {
    let user_id = Uuid::new_v4();

    let mut user_repo = MockUserRepository::new();
    user_repo
        .expect_find_by_stripe_customer_id()
        .returning(move |_| Ok(Some(fixtures::user(user_id))));

    let usecase = usecase(
        user_repo,
        MockSubscriptionRepository::new(),
        MockCreditLedgerRepository::new(),
        gateway_returning(event(
            "customer.subscription.updated",
            subscription_object("price_legacy", "active"),
        )),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event_type: "customer.subscription.updated".to_string(),
            reason: "unknown price".to_string(),
        }
    );
}

#[tokio::test]
async fn user_is_resolved_from_metadata_when_customer_is_unknown() {
    let user_id = Uuid::new_v4();
    let mut object = subscription_object("price_team", "active");
    object["metadata"] = json!({ "user_id": user_id.to_string() });

    let mut user_repo = MockUserRepository::new();
    user_repo
        .expect_find_by_stripe_customer_id()
        .returning(|_| Ok(None));
    user_repo
        .expect_find_by_id()
        .with(eq(user_id))
        .returning(|id| Ok(Some(fixtures::user(id))));
    user_repo
        .expect_apply_subscription_changes()
        .withf(|_, changeset| changeset.stripe_customer_id.as_deref() == Some("cus_123"))
        .times(1)
        .returning(|_, _| Ok(()));

    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_upsert()
        .returning(move |_| Ok(subscription_row(user_id, "team")));

    let mut credit_ledger_repo = MockCreditLedgerRepository::new();
    credit_ledger_repo
        .expect_allocate()
        .returning(|_| Ok(AllocationOutcome::AlreadyGranted));

    let usecase = usecase(
        user_repo,
        subscription_repo,
        credit_ledger_repo,
        gateway_returning(event("customer.subscription.updated", object)),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Applied { .. }));
}

#[tokio::test]
async fn unresolvable_user_is_acknowledged_and_ignored() {
    let mut user_repo = MockUserRepository::new();
    user_repo
        .expect_find_by_stripe_customer_id()
        .returning(|_| Ok(None));

    let usecase = usecase(
        user_repo,
        MockSubscriptionRepository::new(),
        MockCreditLedgerRepository::new(),
        gateway_returning(event(
            "customer.subscription.created",
            subscription_object("price_basic", "active"),
        )),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
}

#[tokio::test]
async fn redelivered_invoice_does_not_grant_twice() {
    let user_id = Uuid::new_v4();

    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_find_by_stripe_subscription_id()
        .withf(|id| id.to_string() == "sub_123")
        .returning(move |_| Ok(Some(subscription_row(user_id, "creator"))));

    let mut credit_ledger_repo = MockCreditLedgerRepository::new();
    let mut seq = mockall::Sequence::new();
    credit_ledger_repo
        .expect_allocate()
        .withf(|model| {
            model.period_start == Utc.timestamp_opt(PERIOD_START, 0).unwrap()
        })
        .times(1)
        .in_sequence(&mut seq)
        .returning(move |_| Ok(AllocationOutcome::Granted(allocation_entry(user_id, 1500))));
    credit_ledger_repo
        .expect_allocate()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_| Ok(AllocationOutcome::AlreadyGranted));

    let usecase = usecase(
        MockUserRepository::new(),
        subscription_repo,
        credit_ledger_repo,
        gateway_returning(event("invoice.payment_succeeded", invoice_object())),
    );

    let first = usecase.handle(b"{}", Some("sig")).await.unwrap();
    let second = usecase.handle(b"{}", Some("sig")).await.unwrap();

    assert_eq!(
        first,
        WebhookOutcome::Applied {
            event_type: "invoice.payment_succeeded".to_string(),
            allocation: Some(AllocationStatus::Granted { amount: 1500 }),
        }
    );
    assert_eq!(
        second,
        WebhookOutcome::Applied {
            event_type: "invoice.payment_succeeded".to_string(),
            allocation: Some(AllocationStatus::AlreadyGranted),
        }
    );
}

#[tokio::test]
async fn invoice_subscription_id_is_read_from_parent_details() {
    let user_id = Uuid::new_v4();
    let mut object = invoice_object();
    object["subscription"] = Value::Null;
    object["parent"] = json!({ "subscription_details": { "subscription": "sub_123" } });

    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_find_by_stripe_subscription_id()
        .withf(|id| id.to_string() == "sub_123")
        .times(1)
        .returning(move |_| Ok(Some(subscription_row(user_id, "basic"))));

    let mut credit_ledger_repo = MockCreditLedgerRepository::new();
    credit_ledger_repo
        .expect_allocate()
        .withf(|model| model.plan == SubscriptionPlan::Basic)
        .returning(move |_| Ok(AllocationOutcome::Granted(allocation_entry(user_id, 500))));

    let usecase = usecase(
        MockUserRepository::new(),
        subscription_repo,
        credit_ledger_repo,
        gateway_returning(event("invoice.payment_succeeded", object)),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Applied { .. }));
}

#[tokio::test]
async fn credits_are_granted_when_activation_arrives_after_the_invoice() {
    let user_id = Uuid::new_v4();

    // The invoice lands before any local row exists.
    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_find_by_stripe_subscription_id()
        .returning(|_| Ok(None));
    let invoice_first = usecase(
        MockUserRepository::new(),
        subscription_repo,
        MockCreditLedgerRepository::new(),
        gateway_returning(event("invoice.payment_succeeded", invoice_object())),
    );
    assert!(matches!(
        invoice_first.handle(b"{}", Some("sig")).await.unwrap(),
        WebhookOutcome::Ignored { .. }
    ));

    let subscription_lifecycle = |status: &str, credit_ledger_repo| {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_find_by_stripe_customer_id()
            .returning(move |_| Ok(Some(fixtures::user(user_id))));
        user_repo
            .expect_apply_subscription_changes()
            .returning(|_, _| Ok(()));
        let mut subscription_repo = MockSubscriptionRepository::new();
        subscription_repo
            .expect_upsert()
            .returning(move |_| Ok(subscription_row(user_id, "creator")));
        let event_type = if status == "incomplete" {
            "customer.subscription.created"
        } else {
            "customer.subscription.updated"
        };
        usecase(
            user_repo,
            subscription_repo,
            credit_ledger_repo,
            gateway_returning(event(event_type, subscription_object("price_creator", status))),
        )
    };

    // Created while the first payment is still pending: nothing to grant yet.
    let created = subscription_lifecycle("incomplete", MockCreditLedgerRepository::new());
    assert!(matches!(
        created.handle(b"{}", Some("sig")).await.unwrap(),
        WebhookOutcome::Applied {
            allocation: None,
            ..
        }
    ));

    let mut credit_ledger_repo = MockCreditLedgerRepository::new();
    credit_ledger_repo
        .expect_allocate()
        .withf(move |model| {
            model.user_id == user_id
                && model.idempotency_key() == format!("allocation:sub_123:{}", PERIOD_START)
        })
        .times(1)
        .returning(move |_| Ok(AllocationOutcome::Granted(allocation_entry(user_id, 1500))));
    let activated = subscription_lifecycle("active", credit_ledger_repo);

    assert_eq!(
        activated.handle(b"{}", Some("sig")).await.unwrap(),
        WebhookOutcome::Applied {
            event_type: "customer.subscription.updated".to_string(),
            allocation: Some(AllocationStatus::Granted { amount: 1500 }),
        }
    );
}

#[tokio::test]
async fn proration_invoice_does_not_grant_again() {
    let mut object = invoice_object();
    object["billing_reason"] = json!("subscription_update");
    object["lines"] = json!({ "data": [{
        "period": { "start": PERIOD_START + 86_400, "end": PERIOD_END }
    }]});

    // No repository expectations: a mid-period invoice must not reach the ledger.
    let usecase = usecase(
        MockUserRepository::new(),
        MockSubscriptionRepository::new(),
        MockCreditLedgerRepository::new(),
        gateway_returning(event("invoice.payment_succeeded", object)),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Ignored {
            event_type: "invoice.payment_succeeded".to_string(),
            reason: "invoice does not open a billing period".to_string(),
        }
    );
}

#[tokio::test]
async fn deleted_subscription_cancels_without_resetting_plan() {
    let user_id = Uuid::new_v4();

    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_find_by_stripe_subscription_id()
        .returning(move |_| Ok(Some(subscription_row(user_id, "creator"))));
    subscription_repo
        .expect_mark_canceled()
        .withf(|id, _| id.to_string() == "sub_123")
        .times(1)
        .returning(|_, _| Ok(1));

    let mut user_repo = MockUserRepository::new();
    user_repo
        .expect_apply_subscription_changes()
        .withf(move |id, changeset| {
            *id == user_id
                && changeset.subscription_status.as_deref() == Some("canceled")
                && changeset.cancel_at_period_end == Some(false)
                && changeset.subscription_plan.is_none()
        })
        .times(1)
        .returning(|_, _| Ok(()));

    // No ledger expectations: credits are left untouched.
    let usecase = usecase(
        user_repo,
        subscription_repo,
        MockCreditLedgerRepository::new(),
        gateway_returning(event(
            "customer.subscription.deleted",
            subscription_object("price_creator", "canceled"),
        )),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Applied { .. }));
}

#[tokio::test]
async fn payment_failure_is_logged_only() {
    let usecase = usecase(
        MockUserRepository::new(),
        MockSubscriptionRepository::new(),
        MockCreditLedgerRepository::new(),
        gateway_returning(event("invoice.payment_failed", invoice_object())),
    );

    let outcome = usecase.handle(b"{}", Some("sig")).await.unwrap();
    assert!(matches!(outcome, WebhookOutcome::Ignored { .. }));
}

#[tokio::test]
async fn malformed_object_is_a_bad_request() {
    let usecase = usecase(
        MockUserRepository::new(),
        MockSubscriptionRepository::new(),
        MockCreditLedgerRepository::new(),
        gateway_returning(event(
            "customer.subscription.updated",
            json!({ "customer": 42 }),
        )),
    );

    let err = usecase.handle(b"{}", Some("sig")).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn store_failures_surface_as_server_errors() {
    let mut subscription_repo = MockSubscriptionRepository::new();
    subscription_repo
        .expect_find_by_stripe_subscription_id()
        .returning(|_| Err(anyhow::anyhow!("pool timed out")));

    let usecase = usecase(
        MockUserRepository::new(),
        subscription_repo,
        MockCreditLedgerRepository::new(),
        gateway_returning(event("invoice.payment_succeeded", invoice_object())),
    );

    let err = usecase.handle(b"{}", Some("sig")).await.unwrap_err();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

use chrono::{Duration, Utc};
use paperdesk::application::escrow::EscrowLedger;
use paperdesk::application::lifecycle::LifecycleManager;
use paperdesk::config::PlatformConfig;
use paperdesk::domain::account::{Amount, Role, UserAccount, UserId};
use paperdesk::domain::assignment::{Assignment, AssignmentStatus, NewAssignment, QuoteResponse};
use paperdesk::domain::ports::{
    AssignmentStoreRef, PaymentGatewayRef, TransactionStoreRef, UserStoreRef,
};
use paperdesk::infrastructure::in_memory::{
    InMemoryAssignmentStore, InMemoryTransactionStore, InMemoryUserStore, InstantGateway,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

pub struct TestMarket {
    pub manager: Arc<LifecycleManager>,
    pub student: UserId,
    pub writer: UserId,
}

pub fn amount(value: Decimal) -> Amount {
    Amount::new(value).unwrap()
}

/// Builds a manager over fresh in-memory stores, letting callers swap the
/// gateway or user store and tweak the platform config.
pub async fn build_market(
    gateway: PaymentGatewayRef,
    users: UserStoreRef,
    config: PlatformConfig,
) -> TestMarket {
    let assignments: AssignmentStoreRef = Arc::new(InMemoryAssignmentStore::new());
    let transactions: TransactionStoreRef = Arc::new(InMemoryTransactionStore::new());
    let ledger = EscrowLedger::new(transactions, users.clone(), gateway, &config);
    let manager = Arc::new(LifecycleManager::new(assignments, users, ledger, config));

    let student = UserId::new();
    let writer = UserId::new();
    manager
        .register_user(UserAccount::new(student, "Student", Role::Student))
        .await
        .unwrap();
    manager
        .register_user(UserAccount::new(writer, "Writer", Role::Writer))
        .await
        .unwrap();

    TestMarket {
        manager,
        student,
        writer,
    }
}

pub async fn market() -> TestMarket {
    build_market(
        Arc::new(InstantGateway),
        Arc::new(InMemoryUserStore::new()),
        PlatformConfig::default(),
    )
    .await
}

pub fn new_assignment(student: UserId) -> NewAssignment {
    NewAssignment {
        id: None,
        student_id: student,
        title: "Term paper".to_string(),
        description: "10 pages on monetary policy".to_string(),
        subject: "Economics".to_string(),
        budget: amount(dec!(100.0)),
        deadline: Utc::now() + Duration::days(7),
        pages: 10,
        attachment: None,
        pre_selected_writer: None,
    }
}

/// Runs create -> capture -> quote -> accept and returns the confirmed
/// assignment (budget equals the quoted amount).
pub async fn confirmed_assignment(market: &TestMarket, quoted: Decimal) -> Assignment {
    let asgn = market
        .manager
        .create(new_assignment(market.student))
        .await
        .unwrap();
    market.manager.capture_payment(asgn.id).await.unwrap();
    market
        .manager
        .submit_quote(asgn.id, market.writer, amount(quoted), "on it".to_string())
        .await
        .unwrap();
    let confirmed = market
        .manager
        .respond_to_quote(asgn.id, market.student, QuoteResponse::Accept)
        .await
        .unwrap();
    assert_eq!(confirmed.status, AssignmentStatus::Confirmed);
    confirmed
}

/// Drives a confirmed assignment through work submission.
pub async fn submitted_assignment(market: &TestMarket, quoted: Decimal) -> Assignment {
    let asgn = confirmed_assignment(market, quoted).await;
    market
        .manager
        .update_status(asgn.id, market.writer, AssignmentStatus::InProgress, None)
        .await
        .unwrap();
    market
        .manager
        .submit_work(asgn.id, market.writer, "final draft".to_string())
        .await
        .unwrap()
}

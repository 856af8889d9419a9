use crate::application::escrow::EscrowLedger;
use crate::config::PlatformConfig;
use crate::domain::account::{Amount, UserAccount, UserId};
use crate::domain::assignment::{
    Assignment, AssignmentId, AssignmentStatus, NewAssignment, PaymentStatus, QuoteResponse,
};
use crate::domain::ports::{AssignmentStoreRef, UserStoreRef};
use crate::error::{MarketError, Result};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Serializes operations per assignment id.
///
/// Two concurrent transitions for the same id take turns; operations on
/// different ids proceed in parallel.
#[derive(Default)]
struct LockRegistry {
    locks: Mutex<HashMap<AssignmentId, Arc<Mutex<()>>>>,
}

impl LockRegistry {
    async fn for_id(&self, id: AssignmentId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(id).or_default().clone()
    }

    async fn discard(&self, id: AssignmentId) {
        let mut locks = self.locks.lock().await;
        locks.remove(&id);
    }
}

/// Single authority for every assignment status change.
///
/// Validates role and ownership for each transition, runs the quote
/// negotiation sub-protocol, bounds revision cycles, and drives the escrow
/// ledger on the transitions that move money. All guard failures leave the
/// stores untouched.
pub struct LifecycleManager {
    assignments: AssignmentStoreRef,
    users: UserStoreRef,
    ledger: EscrowLedger,
    config: PlatformConfig,
    locks: LockRegistry,
}

impl LifecycleManager {
    pub fn new(
        assignments: AssignmentStoreRef,
        users: UserStoreRef,
        ledger: EscrowLedger,
        config: PlatformConfig,
    ) -> Self {
        Self {
            assignments,
            users,
            ledger,
            config,
            locks: LockRegistry::default(),
        }
    }

    pub fn ledger(&self) -> &EscrowLedger {
        &self.ledger
    }

    /// Registers a user account. Accounts must exist before they can act.
    pub async fn register_user(&self, user: UserAccount) -> Result<()> {
        self.users.store(user).await
    }

    async fn user(&self, id: UserId) -> Result<UserAccount> {
        self.users
            .get(id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("user {id}")))
    }

    async fn load(&self, id: AssignmentId) -> Result<Assignment> {
        self.assignments
            .get(id)
            .await?
            .ok_or_else(|| MarketError::NotFound(format!("assignment {id}")))
    }

    /// Creates an assignment in `Pending`, or `PendingReview` when a writer
    /// was pre-selected. Payment is captured separately once the external
    /// gateway confirms.
    pub async fn create(&self, new: NewAssignment) -> Result<Assignment> {
        if new.title.trim().is_empty() {
            return Err(MarketError::ValidationError(
                "title must not be empty".to_string(),
            ));
        }
        if new.deadline <= Utc::now() {
            return Err(MarketError::ValidationError(
                "deadline must be in the future".to_string(),
            ));
        }
        let student = self.user(new.student_id).await?;
        if !student.is_student() {
            return Err(MarketError::NotAuthorized(format!(
                "user {} is not a student",
                student.id
            )));
        }
        if let Some(writer_id) = new.pre_selected_writer {
            let writer = self.user(writer_id).await?;
            if !writer.is_writer() {
                return Err(MarketError::NotAuthorized(format!(
                    "pre-selected user {} is not a writer",
                    writer.id
                )));
            }
        }

        let assignment = Assignment::new(new);
        let lock = self.locks.for_id(assignment.id).await;
        let _guard = lock.lock().await;
        if self.assignments.get(assignment.id).await?.is_some() {
            return Err(MarketError::ValidationError(format!(
                "assignment {} already exists",
                assignment.id
            )));
        }
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %assignment.id, status = %assignment.status, "assignment created");
        Ok(assignment)
    }

    /// Captures the budget into escrow once the external payment
    /// collaborator confirms. Legal while unpaid and not yet terminal;
    /// a second capture is `AlreadySettled`.
    pub async fn capture_payment(&self, id: AssignmentId) -> Result<Assignment> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        if !matches!(
            assignment.status,
            AssignmentStatus::Pending
                | AssignmentStatus::PendingReview
                | AssignmentStatus::Quoted
                | AssignmentStatus::Confirmed
        ) {
            return Err(MarketError::InvalidTransition(format!(
                "cannot capture payment for assignment {id} in status {}",
                assignment.status
            )));
        }
        if assignment.payment_status != PaymentStatus::Unpaid {
            return Err(MarketError::AlreadySettled(format!(
                "assignment {id} is already {}",
                assignment.payment_status
            )));
        }

        self.ledger.deposit(id, assignment.budget).await?;
        assignment.mark_escrow()?;
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, "payment captured into escrow");
        Ok(assignment)
    }

    /// A writer quotes an open assignment.
    pub async fn submit_quote(
        &self,
        id: AssignmentId,
        writer_id: UserId,
        amount: Amount,
        comment: String,
    ) -> Result<Assignment> {
        let writer = self.user(writer_id).await?;
        if !writer.is_writer() {
            return Err(MarketError::NotAuthorized(format!(
                "user {writer_id} is not a writer"
            )));
        }

        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        assignment.submit_quote(writer_id, amount, comment)?;
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, writer = %writer_id, amount = %amount, "quote submitted");
        Ok(assignment)
    }

    /// The student accepts or rejects the standing quote.
    pub async fn respond_to_quote(
        &self,
        id: AssignmentId,
        student_id: UserId,
        response: QuoteResponse,
    ) -> Result<Assignment> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        assignment.respond_to_quote(student_id, response)?;
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, status = %assignment.status, "quote response applied");
        Ok(assignment)
    }

    /// The generic status-change boundary. Dispatches to the guarded
    /// operation behind each target status; targets that require their own
    /// payload (submission text, quotes) are refused here.
    pub async fn update_status(
        &self,
        id: AssignmentId,
        actor: UserId,
        new_status: AssignmentStatus,
        feedback: Option<String>,
    ) -> Result<Assignment> {
        match new_status {
            AssignmentStatus::Assigned | AssignmentStatus::InProgress => {
                self.take_work(id, actor, new_status).await
            }
            AssignmentStatus::Completed => self.approve(id, actor).await,
            AssignmentStatus::Revision => self.request_revision(id, actor, feedback).await,
            AssignmentStatus::Cancelled => self.cancel(id, actor).await,
            AssignmentStatus::Submitted => Err(MarketError::InvalidTransition(
                "submission requires text; use the submit-work operation".to_string(),
            )),
            other => Err(MarketError::InvalidTransition(format!(
                "status {other} is not reachable through a direct update"
            ))),
        }
    }

    async fn take_work(
        &self,
        id: AssignmentId,
        writer_id: UserId,
        target: AssignmentStatus,
    ) -> Result<Assignment> {
        let writer = self.user(writer_id).await?;
        if !writer.is_writer() {
            return Err(MarketError::NotAuthorized(format!(
                "user {writer_id} is not a writer"
            )));
        }

        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        assignment.take_work(writer_id, target)?;
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, writer = %writer_id, status = %target, "work taken");
        Ok(assignment)
    }

    /// The assigned writer submits final work.
    pub async fn submit_work(
        &self,
        id: AssignmentId,
        writer_id: UserId,
        text: String,
    ) -> Result<Assignment> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        assignment.submit_work(writer_id, text)?;
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, writer = %writer_id, "work submitted");
        Ok(assignment)
    }

    /// Approval: the completion transition. Escrow release happens
    /// synchronously inside; when it fails, the whole transition fails and
    /// the assignment stays submitted and in escrow for a retry.
    async fn approve(&self, id: AssignmentId, actor: UserId) -> Result<Assignment> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        assignment.approve(actor)?;

        if assignment.payment_status == PaymentStatus::Escrow {
            let writer_id = assignment.writer_id.ok_or_else(|| {
                MarketError::InvalidTransition(format!(
                    "assignment {id} has escrowed funds but no writer"
                ))
            })?;
            self.ledger
                .release(id, assignment.budget, writer_id)
                .await?;
            assignment.mark_released()?;
        }

        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, payment = %assignment.payment_status, "assignment completed");
        Ok(assignment)
    }

    async fn request_revision(
        &self,
        id: AssignmentId,
        actor: UserId,
        feedback: Option<String>,
    ) -> Result<Assignment> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        assignment.request_revision(actor, feedback, self.config.revision_cap)?;
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(
            assignment = %id,
            revision = assignment.revision_count,
            "revision requested"
        );
        Ok(assignment)
    }

    async fn cancel(&self, id: AssignmentId, actor: UserId) -> Result<Assignment> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        let escrowed = assignment.payment_status == PaymentStatus::Escrow;
        assignment.cancel(actor)?;
        if escrowed {
            self.ledger.refund(id, assignment.budget).await?;
        }
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, refunded = escrowed, "assignment cancelled");
        Ok(assignment)
    }

    /// The assigned writer walks away; the assignment reopens for everyone
    /// else.
    pub async fn drop_assignment(&self, id: AssignmentId, writer_id: UserId) -> Result<Assignment> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let mut assignment = self.load(id).await?;
        assignment.record_drop(writer_id)?;
        self.assignments.store(assignment.clone()).await?;
        tracing::info!(assignment = %id, writer = %writer_id, "assignment dropped");
        Ok(assignment)
    }

    /// Deletes a record that never left the pre-assignment states.
    pub async fn delete(&self, id: AssignmentId, student_id: UserId) -> Result<()> {
        let lock = self.locks.for_id(id).await;
        let _guard = lock.lock().await;

        let assignment = self.load(id).await?;
        if assignment.student_id != student_id {
            return Err(MarketError::NotAuthorized(format!(
                "only the creating student may delete {id}"
            )));
        }
        if !assignment.status.is_pre_assignment() {
            return Err(MarketError::InvalidTransition(format!(
                "cannot delete assignment {id} in status {}",
                assignment.status
            )));
        }
        self.assignments.remove(id).await?;
        drop(_guard);
        self.locks.discard(id).await;
        tracing::info!(assignment = %id, "assignment deleted");
        Ok(())
    }

    pub async fn get(&self, id: AssignmentId) -> Result<Assignment> {
        self.load(id).await
    }

    /// The open-marketplace listing for one writer: unassigned work the
    /// writer has not previously dropped.
    pub async fn open_marketplace(&self, writer_id: UserId) -> Result<Vec<Assignment>> {
        let all = self.assignments.all().await?;
        Ok(all
            .into_iter()
            .filter(|a| a.is_open_for(writer_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::account::Role;
    use crate::domain::ports::{TransactionStoreRef, UserStoreRef};
    use crate::infrastructure::in_memory::{
        InMemoryAssignmentStore, InMemoryTransactionStore, InMemoryUserStore, InstantGateway,
    };
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn manager() -> LifecycleManager {
        let assignments: AssignmentStoreRef = Arc::new(InMemoryAssignmentStore::new());
        let users: UserStoreRef = Arc::new(InMemoryUserStore::new());
        let transactions: TransactionStoreRef = Arc::new(InMemoryTransactionStore::new());
        let config = PlatformConfig::default();
        let ledger = EscrowLedger::new(
            transactions,
            users.clone(),
            Arc::new(InstantGateway),
            &config,
        );
        LifecycleManager::new(assignments, users, ledger, config)
    }

    async fn seed(manager: &LifecycleManager) -> (UserId, UserId) {
        let student = UserId::new();
        let writer = UserId::new();
        manager
            .register_user(UserAccount::new(student, "S", Role::Student))
            .await
            .unwrap();
        manager
            .register_user(UserAccount::new(writer, "W", Role::Writer))
            .await
            .unwrap();
        (student, writer)
    }

    fn new_assignment(student: UserId) -> NewAssignment {
        NewAssignment {
            id: None,
            student_id: student,
            title: "Lab report".to_string(),
            description: "5 pages".to_string(),
            subject: "Chemistry".to_string(),
            budget: Amount::new(dec!(100.0)).unwrap(),
            deadline: Utc::now() + Duration::days(3),
            pages: 5,
            attachment: None,
            pre_selected_writer: None,
        }
    }

    #[tokio::test]
    async fn test_create_requires_student_role() {
        let manager = manager();
        let (_, writer) = seed(&manager).await;

        let result = manager.create(new_assignment(writer)).await;
        assert!(matches!(result, Err(MarketError::NotAuthorized(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_past_deadline() {
        let manager = manager();
        let (student, _) = seed(&manager).await;

        let mut new = new_assignment(student);
        new.deadline = Utc::now() - Duration::hours(1);
        let result = manager.create(new).await;
        assert!(matches!(result, Err(MarketError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_capture_payment_is_single_shot() {
        let manager = manager();
        let (student, _) = seed(&manager).await;
        let asgn = manager.create(new_assignment(student)).await.unwrap();

        let captured = manager.capture_payment(asgn.id).await.unwrap();
        assert_eq!(captured.payment_status, PaymentStatus::Escrow);

        let result = manager.capture_payment(asgn.id).await;
        assert!(matches!(result, Err(MarketError::AlreadySettled(_))));

        // Exactly one payment entry despite the second attempt
        let entries = manager.ledger().transactions(Some(asgn.id)).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_completion_releases_escrow_once() {
        let manager = manager();
        let (student, writer) = seed(&manager).await;
        let asgn = manager.create(new_assignment(student)).await.unwrap();
        manager.capture_payment(asgn.id).await.unwrap();
        manager
            .submit_quote(asgn.id, writer, Amount::new(dec!(100.0)).unwrap(), String::new())
            .await
            .unwrap();
        manager
            .respond_to_quote(asgn.id, student, QuoteResponse::Accept)
            .await
            .unwrap();
        manager
            .update_status(asgn.id, writer, AssignmentStatus::InProgress, None)
            .await
            .unwrap();
        manager
            .submit_work(asgn.id, writer, "done".to_string())
            .await
            .unwrap();

        let completed = manager
            .update_status(asgn.id, student, AssignmentStatus::Completed, None)
            .await
            .unwrap();
        assert_eq!(completed.status, AssignmentStatus::Completed);
        assert_eq!(completed.payment_status, PaymentStatus::Released);
        assert_eq!(
            manager.ledger().writer_balance(writer).await.unwrap(),
            crate::domain::account::Balance::new(dec!(85.0))
        );

        // Approving again is not a legal transition
        let result = manager
            .update_status(asgn.id, student, AssignmentStatus::Completed, None)
            .await;
        assert!(matches!(result, Err(MarketError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_update_status_refuses_bare_submission() {
        let manager = manager();
        let (student, writer) = seed(&manager).await;
        let asgn = manager.create(new_assignment(student)).await.unwrap();

        let result = manager
            .update_status(asgn.id, writer, AssignmentStatus::Submitted, None)
            .await;
        assert!(matches!(result, Err(MarketError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_delete_twice_reports_not_found() {
        let manager = manager();
        let (student, _) = seed(&manager).await;
        let asgn = manager.create(new_assignment(student)).await.unwrap();

        manager.delete(asgn.id, student).await.unwrap();
        let result = manager.delete(asgn.id, student).await;
        assert!(matches!(result, Err(MarketError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unknown_assignment_is_not_found() {
        let manager = manager();
        let (_, writer) = seed(&manager).await;

        let result = manager
            .submit_quote(
                AssignmentId::new(),
                writer,
                Amount::new(dec!(10.0)).unwrap(),
                String::new(),
            )
            .await;
        assert!(matches!(result, Err(MarketError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_escrowed_assignment_records_refund() {
        let manager = manager();
        let (student, _) = seed(&manager).await;
        let asgn = manager.create(new_assignment(student)).await.unwrap();
        manager.capture_payment(asgn.id).await.unwrap();

        let cancelled = manager
            .update_status(asgn.id, student, AssignmentStatus::Cancelled, None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, AssignmentStatus::Cancelled);

        let entries = manager.ledger().transactions(Some(asgn.id)).await.unwrap();
        let refunds: Vec<_> = entries
            .iter()
            .filter(|t| t.kind == crate::domain::transaction::TransactionKind::Refund)
            .collect();
        assert_eq!(refunds.len(), 1);
    }
}

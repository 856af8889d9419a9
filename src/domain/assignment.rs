use crate::domain::account::{Amount, UserId};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier of an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentId(pub Uuid);

impl AssignmentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AssignmentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AssignmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentStatus {
    Pending,
    PendingReview,
    Quoted,
    Confirmed,
    Assigned,
    InProgress,
    Submitted,
    Completed,
    Revision,
    Cancelled,
}

impl AssignmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Statuses in which the record may still be deleted outright.
    pub fn is_pre_assignment(&self) -> bool {
        matches!(self, Self::Pending | Self::PendingReview | Self::Quoted)
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Quoted => "QUOTED",
            Self::Confirmed => "CONFIRMED",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Completed => "COMPLETED",
            Self::Revision => "REVISION",
            Self::Cancelled => "CANCELLED",
        };
        f.write_str(name)
    }
}

/// Where the assignment's money currently sits. Strictly monotonic:
/// `Unpaid` -> `Escrow` -> `Released`, never backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Escrow,
    Released,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unpaid => "UNPAID",
            Self::Escrow => "ESCROW",
            Self::Released => "RELEASED",
        };
        f.write_str(name)
    }
}

/// A writer's live offer on an open assignment. At most one exists at a time,
/// and only while the assignment is `Quoted`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub writer_id: UserId,
    pub amount: Amount,
    pub comment: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuoteResponse {
    Accept,
    Reject,
}

/// Input for creating an assignment. The id is client-supplied when the
/// caller needs to reference the record later in the same batch, otherwise
/// a fresh one is generated.
#[derive(Debug, Clone, Deserialize)]
pub struct NewAssignment {
    #[serde(default)]
    pub id: Option<AssignmentId>,
    pub student_id: UserId,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub budget: Amount,
    pub deadline: DateTime<Utc>,
    #[serde(default)]
    pub pages: u32,
    #[serde(default)]
    pub attachment: Option<String>,
    #[serde(default)]
    pub pre_selected_writer: Option<UserId>,
}

/// The central marketplace entity.
///
/// All mutation goes through the guarded methods below; each validates the
/// current state and either applies the full transition or returns a typed
/// error without touching anything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub student_id: UserId,
    pub title: String,
    pub description: String,
    pub subject: String,
    pub budget: Amount,
    pub deadline: DateTime<Utc>,
    pub pages: u32,
    pub attachment: Option<String>,
    pub status: AssignmentStatus,
    pub payment_status: PaymentStatus,
    pub writer_id: Option<UserId>,
    pub quote: Option<Quote>,
    /// Writers who dropped or were rejected off this assignment. Grows
    /// monotonically and is never cleared.
    pub rejected_by: Vec<UserId>,
    pub submission: Option<String>,
    pub feedback: Option<String>,
    pub revision_count: u32,
    pub created_at: DateTime<Utc>,
}

impl Assignment {
    pub fn new(new: NewAssignment) -> Self {
        let status = if new.pre_selected_writer.is_some() {
            AssignmentStatus::PendingReview
        } else {
            AssignmentStatus::Pending
        };
        Self {
            id: new.id.unwrap_or_default(),
            student_id: new.student_id,
            title: new.title,
            description: new.description,
            subject: new.subject,
            budget: new.budget,
            deadline: new.deadline,
            pages: new.pages,
            attachment: new.attachment,
            status,
            payment_status: PaymentStatus::Unpaid,
            writer_id: new.pre_selected_writer,
            quote: None,
            rejected_by: Vec::new(),
            submission: None,
            feedback: None,
            revision_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Whether this assignment shows up in the given writer's open pool.
    pub fn is_open_for(&self, writer_id: UserId) -> bool {
        matches!(
            self.status,
            AssignmentStatus::Pending | AssignmentStatus::PendingReview
        ) && self.writer_id.is_none()
            && !self.rejected_by.contains(&writer_id)
    }

    /// A writer places a quote on an open assignment.
    ///
    /// A pre-selected writer may quote their own invitation; anyone else is
    /// blocked while a writer is attached. Writers who previously dropped
    /// the assignment are excluded.
    pub fn submit_quote(
        &mut self,
        writer_id: UserId,
        amount: Amount,
        comment: String,
    ) -> Result<(), MarketError> {
        if self.rejected_by.contains(&writer_id) {
            return Err(MarketError::NotAuthorized(format!(
                "writer {writer_id} previously dropped assignment {}",
                self.id
            )));
        }
        if let Some(assigned) = self.writer_id
            && assigned != writer_id
        {
            return Err(MarketError::NotAuthorized(format!(
                "assignment {} is reserved for another writer",
                self.id
            )));
        }
        if !matches!(
            self.status,
            AssignmentStatus::Pending | AssignmentStatus::PendingReview
        ) {
            return Err(MarketError::InvalidTransition(format!(
                "cannot quote assignment {} in status {}",
                self.id, self.status
            )));
        }
        self.quote = Some(Quote {
            writer_id,
            amount,
            comment,
        });
        self.status = AssignmentStatus::Quoted;
        Ok(())
    }

    /// The student accepts or rejects the standing quote.
    ///
    /// Acceptance binds the quoting writer and the quoted price; rejection
    /// returns the assignment to the open marketplace without penalizing
    /// the quoting writer.
    pub fn respond_to_quote(
        &mut self,
        actor: UserId,
        response: QuoteResponse,
    ) -> Result<(), MarketError> {
        if actor != self.student_id {
            return Err(MarketError::NotAuthorized(format!(
                "only the creating student may respond to quotes on {}",
                self.id
            )));
        }
        if self.status != AssignmentStatus::Quoted {
            return Err(MarketError::InvalidTransition(format!(
                "no live quote on assignment {} (status {})",
                self.id, self.status
            )));
        }
        let quote = self.quote.take().ok_or_else(|| {
            MarketError::InvalidTransition(format!("quoted assignment {} has no quote", self.id))
        })?;
        match response {
            QuoteResponse::Accept => {
                self.writer_id = Some(quote.writer_id);
                self.budget = quote.amount;
                self.status = AssignmentStatus::Confirmed;
            }
            QuoteResponse::Reject => {
                self.status = AssignmentStatus::PendingReview;
            }
        }
        Ok(())
    }

    /// A writer takes the assignment or starts working on it.
    ///
    /// Writers on the rejection list cannot re-enter through this path; they
    /// need a fresh accepted quote.
    pub fn take_work(
        &mut self,
        writer_id: UserId,
        target: AssignmentStatus,
    ) -> Result<(), MarketError> {
        if self.rejected_by.contains(&writer_id) {
            return Err(MarketError::NotAuthorized(format!(
                "writer {writer_id} previously dropped assignment {}",
                self.id
            )));
        }
        if let Some(assigned) = self.writer_id
            && assigned != writer_id
        {
            return Err(MarketError::NotAuthorized(format!(
                "assignment {} belongs to another writer",
                self.id
            )));
        }
        let legal = match target {
            AssignmentStatus::Assigned => self.status == AssignmentStatus::Confirmed,
            AssignmentStatus::InProgress => matches!(
                self.status,
                AssignmentStatus::Confirmed | AssignmentStatus::Assigned
            ),
            _ => false,
        };
        if !legal {
            return Err(MarketError::InvalidTransition(format!(
                "cannot move assignment {} from {} to {}",
                self.id, self.status, target
            )));
        }
        self.writer_id = Some(writer_id);
        self.status = target;
        Ok(())
    }

    /// The assigned writer hands in work. Also used to resubmit after a
    /// revision request.
    pub fn submit_work(&mut self, writer_id: UserId, text: String) -> Result<(), MarketError> {
        if self.writer_id != Some(writer_id) {
            return Err(MarketError::NotAuthorized(format!(
                "writer {writer_id} is not assigned to {}",
                self.id
            )));
        }
        if text.trim().is_empty() {
            return Err(MarketError::ValidationError(
                "submission text must not be empty".to_string(),
            ));
        }
        if !matches!(
            self.status,
            AssignmentStatus::Assigned | AssignmentStatus::InProgress | AssignmentStatus::Revision
        ) {
            return Err(MarketError::InvalidTransition(format!(
                "cannot submit work on assignment {} in status {}",
                self.id, self.status
            )));
        }
        self.submission = Some(text);
        self.status = AssignmentStatus::Submitted;
        Ok(())
    }

    fn reviewable(&self) -> bool {
        self.status == AssignmentStatus::Submitted
            || (self.status == AssignmentStatus::PendingReview && self.submission.is_some())
    }

    /// The student approves the submitted work. The caller is responsible
    /// for releasing escrow before persisting the result.
    pub fn approve(&mut self, actor: UserId) -> Result<(), MarketError> {
        if actor != self.student_id {
            return Err(MarketError::NotAuthorized(format!(
                "only the creating student may approve {}",
                self.id
            )));
        }
        if !self.reviewable() {
            return Err(MarketError::InvalidTransition(format!(
                "cannot approve assignment {} in status {}",
                self.id, self.status
            )));
        }
        self.status = AssignmentStatus::Completed;
        Ok(())
    }

    /// The student asks for changes. Capped; the request beyond the cap is
    /// refused outright rather than silently clamped.
    pub fn request_revision(
        &mut self,
        actor: UserId,
        feedback: Option<String>,
        cap: u32,
    ) -> Result<(), MarketError> {
        if actor != self.student_id {
            return Err(MarketError::NotAuthorized(format!(
                "only the creating student may request revisions on {}",
                self.id
            )));
        }
        if !self.reviewable() {
            return Err(MarketError::InvalidTransition(format!(
                "cannot request a revision on assignment {} in status {}",
                self.id, self.status
            )));
        }
        if self.revision_count >= cap {
            return Err(MarketError::RevisionLimitExceeded(cap));
        }
        self.revision_count += 1;
        self.feedback = feedback;
        self.status = AssignmentStatus::Revision;
        Ok(())
    }

    /// The assigned writer walks away. The assignment reopens and the writer
    /// is barred from taking it again.
    pub fn record_drop(&mut self, writer_id: UserId) -> Result<(), MarketError> {
        if self.writer_id != Some(writer_id) {
            return Err(MarketError::NotAuthorized(format!(
                "writer {writer_id} is not assigned to {}",
                self.id
            )));
        }
        if !matches!(
            self.status,
            AssignmentStatus::Confirmed | AssignmentStatus::Assigned | AssignmentStatus::InProgress
        ) {
            return Err(MarketError::InvalidTransition(format!(
                "cannot drop assignment {} in status {}",
                self.id, self.status
            )));
        }
        self.writer_id = None;
        if !self.rejected_by.contains(&writer_id) {
            self.rejected_by.push(writer_id);
        }
        self.status = AssignmentStatus::Pending;
        Ok(())
    }

    /// The student calls the whole thing off before work starts.
    pub fn cancel(&mut self, actor: UserId) -> Result<(), MarketError> {
        if actor != self.student_id {
            return Err(MarketError::NotAuthorized(format!(
                "only the creating student may cancel {}",
                self.id
            )));
        }
        if !matches!(
            self.status,
            AssignmentStatus::Pending
                | AssignmentStatus::PendingReview
                | AssignmentStatus::Quoted
                | AssignmentStatus::Confirmed
        ) {
            return Err(MarketError::InvalidTransition(format!(
                "cannot cancel assignment {} in status {}",
                self.id, self.status
            )));
        }
        self.quote = None;
        self.status = AssignmentStatus::Cancelled;
        Ok(())
    }

    /// Marks the budget as captured into escrow. Refuses a second capture.
    pub fn mark_escrow(&mut self) -> Result<(), MarketError> {
        if self.payment_status != PaymentStatus::Unpaid {
            return Err(MarketError::AlreadySettled(format!(
                "assignment {} is already {}",
                self.id, self.payment_status
            )));
        }
        self.payment_status = PaymentStatus::Escrow;
        Ok(())
    }

    /// Marks escrow as released to the writer. Only ever follows `Escrow`.
    pub fn mark_released(&mut self) -> Result<(), MarketError> {
        if self.payment_status != PaymentStatus::Escrow {
            return Err(MarketError::AlreadySettled(format!(
                "assignment {} is {} rather than in escrow",
                self.id, self.payment_status
            )));
        }
        self.payment_status = PaymentStatus::Released;
        Ok(())
    }
}

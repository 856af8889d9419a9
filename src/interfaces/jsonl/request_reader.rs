use crate::domain::account::{Amount, Role, UserId};
use crate::domain::assignment::{AssignmentId, AssignmentStatus, NewAssignment, QuoteResponse};
use crate::error::{MarketError, Result};
use serde::Deserialize;
use std::io::{BufRead, BufReader, Read};

/// One marketplace operation, as it arrives over the wire.
#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    SeedUser {
        id: UserId,
        name: String,
        role: Role,
    },
    Create(NewAssignment),
    CapturePayment {
        assignment_id: AssignmentId,
    },
    SubmitQuote {
        assignment_id: AssignmentId,
        writer_id: UserId,
        amount: Amount,
        #[serde(default)]
        comment: String,
    },
    RespondQuote {
        assignment_id: AssignmentId,
        student_id: UserId,
        action: QuoteResponse,
    },
    UpdateStatus {
        assignment_id: AssignmentId,
        actor_id: UserId,
        new_status: AssignmentStatus,
        #[serde(default)]
        feedback: Option<String>,
    },
    SubmitWork {
        assignment_id: AssignmentId,
        writer_id: UserId,
        text: String,
    },
    Drop {
        assignment_id: AssignmentId,
        writer_id: UserId,
    },
    Delete {
        assignment_id: AssignmentId,
        student_id: UserId,
    },
}

/// Reads requests from a JSON-lines source.
///
/// Wraps any `Read` and provides an iterator over `Result<Request>`,
/// skipping blank lines. This allows processing large request files in a
/// streaming fashion without loading the entire batch into memory.
pub struct RequestReader<R: Read> {
    reader: BufReader<R>,
}

impl<R: Read> RequestReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            reader: BufReader::new(source),
        }
    }

    /// Returns an iterator that lazily reads and deserializes requests.
    pub fn requests(self) -> impl Iterator<Item = Result<Request>> {
        self.reader.lines().filter_map(|line| match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(serde_json::from_str(&line).map_err(MarketError::from)),
            Err(err) => Some(Err(MarketError::from(err))),
        })
    }
}

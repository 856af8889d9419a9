use clap::Parser;
use miette::{IntoDiagnostic, Result};
use paperdesk::application::escrow::EscrowLedger;
use paperdesk::application::lifecycle::LifecycleManager;
use paperdesk::config::PlatformConfig;
use paperdesk::domain::account::UserAccount;
use paperdesk::domain::assignment::AssignmentId;
use paperdesk::domain::ports::{
    AssignmentStoreRef, PaymentGatewayRef, TransactionStoreRef, UserStoreRef,
};
use paperdesk::infrastructure::in_memory::{
    InMemoryAssignmentStore, InMemoryTransactionStore, InMemoryUserStore, InstantGateway,
};
use paperdesk::interfaces::csv::ledger_writer::LedgerWriter;
use paperdesk::interfaces::jsonl::request_reader::{Request, RequestReader};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input requests file (JSON lines)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Platform configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides the configured platform fee rate
    #[arg(long)]
    fee_rate: Option<rust_decimal::Decimal>,

    /// Restrict the ledger report to one assignment
    #[arg(long)]
    assignment: Option<uuid::Uuid>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PlatformConfig::from_file(path).into_diagnostic()?,
        None => PlatformConfig::default(),
    };
    if let Some(fee_rate) = cli.fee_rate {
        config.fee_rate = fee_rate;
    }
    config.validate().into_diagnostic()?;

    let manager = build_manager(&cli, config).into_diagnostic()?;

    // Process requests
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = RequestReader::new(file);
    for request in reader.requests() {
        match request {
            Ok(request) => {
                if let Err(e) = apply(&manager, request).await {
                    eprintln!("Error processing request: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading request: {}", e);
            }
        }
    }

    // Output the resulting ledger
    let filter = cli.assignment.map(AssignmentId);
    let transactions = manager.ledger().transactions(filter).await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = LedgerWriter::new(stdout.lock());
    writer.write_transactions(&transactions).into_diagnostic()?;

    Ok(())
}

fn build_manager(cli: &Cli, config: PlatformConfig) -> paperdesk::error::Result<LifecycleManager> {
    let gateway: PaymentGatewayRef = Arc::new(InstantGateway);

    if let Some(db_path) = &cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            use paperdesk::infrastructure::rocksdb::RocksDbStore;

            let store = RocksDbStore::open(db_path)?;
            let assignments: AssignmentStoreRef = Arc::new(store.clone());
            let users: UserStoreRef = Arc::new(store.clone());
            let transactions: TransactionStoreRef = Arc::new(store);
            let ledger = EscrowLedger::new(transactions, users.clone(), gateway, &config);
            return Ok(LifecycleManager::new(assignments, users, ledger, config));
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        {
            let _ = db_path;
            return Err(paperdesk::error::MarketError::ValidationError(
                "this build has no persistent storage; enable the storage-rocksdb feature"
                    .to_string(),
            ));
        }
    }

    let assignments: AssignmentStoreRef = Arc::new(InMemoryAssignmentStore::new());
    let users: UserStoreRef = Arc::new(InMemoryUserStore::new());
    let transactions: TransactionStoreRef = Arc::new(InMemoryTransactionStore::new());
    let ledger = EscrowLedger::new(transactions, users.clone(), gateway, &config);
    Ok(LifecycleManager::new(assignments, users, ledger, config))
}

async fn apply(manager: &LifecycleManager, request: Request) -> paperdesk::error::Result<()> {
    match request {
        Request::SeedUser { id, name, role } => {
            manager.register_user(UserAccount::new(id, name, role)).await
        }
        Request::Create(new) => manager.create(new).await.map(drop),
        Request::CapturePayment { assignment_id } => {
            manager.capture_payment(assignment_id).await.map(drop)
        }
        Request::SubmitQuote {
            assignment_id,
            writer_id,
            amount,
            comment,
        } => manager
            .submit_quote(assignment_id, writer_id, amount, comment)
            .await
            .map(drop),
        Request::RespondQuote {
            assignment_id,
            student_id,
            action,
        } => manager
            .respond_to_quote(assignment_id, student_id, action)
            .await
            .map(drop),
        Request::UpdateStatus {
            assignment_id,
            actor_id,
            new_status,
            feedback,
        } => manager
            .update_status(assignment_id, actor_id, new_status, feedback)
            .await
            .map(drop),
        Request::SubmitWork {
            assignment_id,
            writer_id,
            text,
        } => manager
            .submit_work(assignment_id, writer_id, text)
            .await
            .map(drop),
        Request::Drop {
            assignment_id,
            writer_id,
        } => manager.drop_assignment(assignment_id, writer_id).await.map(drop),
        Request::Delete {
            assignment_id,
            student_id,
        } => manager.delete(assignment_id, student_id).await,
    }
}

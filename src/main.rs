use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rentledger::application::engine::OwnershipEngine;
use rentledger::domain::ports::PaymentGatewayRef;
use rentledger::domain::property::{AccountId, Listing, PropertyId};
use rentledger::error::LedgerError;
use rentledger::infrastructure::in_memory::{
    InMemoryHoldingStore, InMemoryPropertyStore, InMemoryTokenGateway,
};
#[cfg(feature = "storage-rocksdb")]
use rentledger::infrastructure::rocksdb::RocksDBStore;
use rentledger::interfaces::csv::operation_reader::{Operation, OperationKind, OperationReader};
use rentledger::interfaces::csv::report_writer::ReportWriter;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Identity holding the verification authority.
    #[arg(long, default_value = "verifier")]
    verifier: String,

    /// Identity under which deposited rent is held until withdrawal.
    #[arg(long, default_value = "custody")]
    custody: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let gateway = Arc::new(InMemoryTokenGateway::new(AccountId::new(&cli.custody)));
    let gateway_ref: PaymentGatewayRef = gateway.clone();
    let verifier = AccountId::new(&cli.verifier);
    let custody = AccountId::new(&cli.custody);

    let engine = match cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(db_path) => {
            // Use persistent storage (RocksDB)
            let store = RocksDBStore::open(db_path).into_diagnostic()?;
            OwnershipEngine::new(
                Box::new(store.clone()),
                Box::new(store),
                gateway_ref,
                verifier,
                custody,
            )
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            return Err(miette::miette!(
                "rebuild with --features storage-rocksdb to use --db-path"
            ));
        }
        None => OwnershipEngine::new(
            Box::new(InMemoryPropertyStore::new()),
            Box::new(InMemoryHoldingStore::new()),
            gateway_ref,
            verifier,
            custody,
        ),
    };

    // Process operations
    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for op_result in reader.operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = apply(&engine, &gateway, op).await {
                    eprintln!("Error applying operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    // Output final state
    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    let properties = engine.all_properties().await.into_diagnostic()?;
    writer.write_properties(&properties).into_diagnostic()?;
    println!();
    let holdings = engine.all_holdings().await.into_diagnostic()?;
    writer.write_holdings(&holdings).into_diagnostic()?;

    Ok(())
}

/// Maps one CSV row onto the engine (or, for `mint`, the token ledger).
async fn apply(
    engine: &OwnershipEngine,
    gateway: &InMemoryTokenGateway,
    op: Operation,
) -> rentledger::error::Result<()> {
    let caller = AccountId::new(op.caller);
    match op.op {
        OperationKind::List => {
            let listing = Listing {
                name: op.name.unwrap_or_default(),
                location: op.location.unwrap_or_default(),
                total_shares: op.shares.unwrap_or_default(),
                price_per_share: op.price.unwrap_or_default(),
                monthly_rent: op.rent.unwrap_or_default(),
                payment_token: AccountId::new(op.token.unwrap_or_default()),
            };
            engine.list_property(listing, &caller).await?;
            Ok(())
        }
        OperationKind::Verify => {
            engine
                .verify_property(property_id(op.property)?, op.verified.unwrap_or(true), &caller)
                .await
        }
        OperationKind::SetVerifier => {
            engine
                .set_verifier(AccountId::new(op.account.unwrap_or_default()), &caller)
                .await
        }
        OperationKind::Mint => {
            let token = AccountId::new(op.token.unwrap_or_default());
            if token.is_null() {
                return Err(LedgerError::InvalidInput("mint requires a token".into()));
            }
            gateway.mint(&token, &caller, op.amount.unwrap_or_default()).await
        }
        OperationKind::Buy => {
            let shares = op.shares.ok_or(LedgerError::InvalidAmount)?;
            engine.buy_shares(property_id(op.property)?, shares, &caller).await
        }
        OperationKind::PayRent => {
            let amount = op.amount.ok_or(LedgerError::InvalidAmount)?;
            engine.pay_rent(property_id(op.property)?, amount, &caller).await
        }
        OperationKind::Withdraw => engine.withdraw_rent(property_id(op.property)?, &caller).await,
    }
}

fn property_id(id: Option<u64>) -> rentledger::error::Result<PropertyId> {
    id.map(PropertyId)
        .ok_or_else(|| LedgerError::InvalidInput("missing property id".into()))
}

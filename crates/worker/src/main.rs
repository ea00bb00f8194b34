use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use carebill_core::EmployeeId;
use carebill_infra::{
    ensure_schema, BatchInvoiceRun, BillingConfig, CareRecords, Clock, InMemoryCareRecords,
    InMemoryInvoiceStore, InvoiceStore, PostgresCareRecords, PostgresInvoiceStore, SystemClock,
};

/// Employee the batch run's writes are attributed to when `BATCH_ACTOR_ID` is unset.
const DEFAULT_BATCH_ACTOR: EmployeeId = EmployeeId::from_raw(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    carebill_observability::init();

    let config = BillingConfig::from_env();
    let actor = batch_actor()?;

    if config.use_persistent_stores {
        let database_url = config
            .database_url
            .clone()
            .context("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")?;
        let pool = PgPool::connect(&database_url)
            .await
            .context("failed to connect to Postgres")?;
        ensure_schema(&pool)
            .await
            .context("failed to apply billing schema")?;

        tracing::info!("using Postgres stores");
        run_batch(
            Arc::new(PostgresCareRecords::new(pool.clone())),
            PostgresInvoiceStore::new(pool),
            config,
            actor,
        )
        .await
    } else {
        tracing::warn!("USE_PERSISTENT_STORES not set; running against empty in-memory stores");
        run_batch(
            Arc::new(InMemoryCareRecords::new()),
            InMemoryInvoiceStore::new(),
            config,
            actor,
        )
        .await
    }
}

fn batch_actor() -> anyhow::Result<EmployeeId> {
    match std::env::var("BATCH_ACTOR_ID") {
        Ok(raw) => raw
            .trim()
            .parse::<EmployeeId>()
            .with_context(|| format!("invalid BATCH_ACTOR_ID: {raw}")),
        Err(_) => {
            tracing::warn!(actor = %DEFAULT_BATCH_ACTOR, "BATCH_ACTOR_ID not set; using default");
            Ok(DEFAULT_BATCH_ACTOR)
        }
    }
}

async fn run_batch<R, S>(
    records: R,
    store: S,
    config: BillingConfig,
    actor: EmployeeId,
) -> anyhow::Result<()>
where
    R: CareRecords + Clone,
    S: InvoiceStore,
{
    let clock = SystemClock;
    let today = clock.today();
    let run = BatchInvoiceRun::new(records, store, clock, config);

    match run.run_if_due(today, actor).await? {
        Some(report) => tracing::info!(
            %today,
            generated = report.generated,
            skipped = report.skipped,
            failed = report.failed,
            "batch invoice run complete"
        ),
        None => tracing::info!(%today, "no batch invoice run due today"),
    }
    Ok(())
}

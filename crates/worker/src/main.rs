use clap::Parser;
use finsnap_core::builder::SnapshotBuilder;
use finsnap_core::storage::documents::{persist, PgDocumentSink};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod prompt;

#[derive(Debug, Parser)]
#[command(name = "finsnap_worker")]
struct Args {
    /// Ticker symbol. Prompted for interactively when omitted.
    #[arg(long)]
    ticker: Option<String>,

    /// Build and print the snapshot without writing to the database.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = finsnap_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    if let Err(err) = run(&settings, &args).await {
        sentry_anyhow::capture_anyhow(&err);
        tracing::error!(error = %err, "snapshot run failed");
        println!("\nError: {err:#}");
    }

    Ok(())
}

async fn run(settings: &finsnap_core::config::Settings, args: &Args) -> anyhow::Result<()> {
    let ticker = match args.ticker.as_deref() {
        Some(raw) => prompt::normalize_ticker(raw)?,
        None => {
            let stdin = std::io::stdin();
            prompt::read_ticker(&mut stdin.lock(), &mut std::io::stdout())?
        }
    };

    let provider = finsnap_core::ingest::yahoo::YahooClient::from_settings(settings)?;

    println!("\nFetching financial data...");
    let snapshot = SnapshotBuilder::new(&provider).build(&ticker).await;

    if args.dry_run {
        tracing::info!(%ticker, dry_run = true, "skipping persistence");
    } else {
        println!("\nSaving snapshot...");
        let pool = finsnap_core::storage::connect(settings).await?;
        finsnap_core::storage::migrate(&pool).await?;

        let sink = PgDocumentSink::from_settings(pool, settings)?;
        let document_id = persist(&sink, &snapshot).await?;
        tracing::debug!(%document_id, collection = sink.collection(), "snapshot stored");
        println!("Saved to collection {} successfully!", sink.collection());
    }

    println!("\nCompleted!");
    println!("{}", serde_json::to_string_pretty(&snapshot.to_document()?)?);
    Ok(())
}

fn init_sentry(settings: &finsnap_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

mod cli;

use cert_tracker::{
    error,
    import::{self, ImportResult, Importer, PlanTier},
    storage::{RecordStore, SqliteStore},
    utils, web, Config, ImportError,
};
use chrono::{Days, Utc};
use clap::Parser;
use cli::{Cli, Commands};
use colored::*;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("cert_tracker=debug,info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Serve => web::serve(&config).await,

        Commands::Import {
            file,
            account,
            format,
        } => {
            info!("Importing {} into account {}", file.display(), account);
            import_csv(&config, &file, &account, &format).await
        }

        Commands::Plan { account, tier } => set_plan(&config, &account, &tier).await,

        Commands::Expiring { account, days } => show_expiring(&config, &account, days).await,

        Commands::Stats { account, format } => show_stats(&config, &account, &format).await,

        Commands::Init => initialize(&config).await,
    };

    if let Err(e) = result {
        error!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }
}

fn open_store(config: &Config) -> error::Result<Arc<SqliteStore>> {
    Ok(Arc::new(SqliteStore::new(&config.database.path)?))
}

async fn import_csv(
    config: &Config,
    file: &Path,
    account: &str,
    format: &str,
) -> error::Result<()> {
    let rows = import::csv::read_rows_from_path(file)?;
    println!("Read {} rows from {}", rows.len(), file.display());

    let store = open_store(config)?;
    let importer = Importer::new(store, config.import.batch_size);
    let result = importer.import(account, rows).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_import_summary(&result);
    Ok(())
}

fn print_import_summary(result: &ImportResult) {
    println!("\n{}", "=== Import Summary ===".cyan().bold());
    println!("Rows imported:           {} ✓", result.success.to_string().green());
    println!("Rows failed:             {} ✗", result.errors.len().to_string().red());
    println!("Staff created:           {}", result.staff_created);
    println!("Templates created:       {}", result.templates_created);
    println!("Certifications created:  {}", result.certifications_created);

    if !result.errors.is_empty() {
        println!("\n{}", "Failed Rows:".yellow());
        utils::print_table_border(80);
        utils::print_table_row(&["Row", "Error"], &[6, 70]);
        utils::print_table_border(80);
        for err in &result.errors {
            utils::print_table_row(
                &[&err.row.to_string(), &utils::truncate(&err.error, 70)],
                &[6, 70],
            );
        }
        utils::print_table_border(80);
    }
}

async fn set_plan(config: &Config, account: &str, tier: &str) -> error::Result<()> {
    let tier: PlanTier = tier.parse().map_err(ImportError::Validation)?;
    let store = open_store(config)?;
    store.set_subscription_tier(account, tier.as_str()).await?;

    println!(
        "{} {} is now on the {} plan ({} staff)",
        "✓".green(),
        account,
        tier.to_string().cyan(),
        tier.staff_limit()
    );
    Ok(())
}

async fn show_expiring(config: &Config, account: &str, days: u32) -> error::Result<()> {
    let store = open_store(config)?;
    let today = Utc::now().date_naive();
    let until = today
        .checked_add_days(Days::new(u64::from(days)))
        .ok_or_else(|| ImportError::Validation(format!("{} days is out of range", days)))?;

    let expiring = store.expiring_certifications(account, today, until).await?;
    if expiring.is_empty() {
        println!("No certifications expire in the next {} days", days);
        return Ok(());
    }

    println!(
        "\n{}",
        format!("Certifications expiring in the next {} days:", days).yellow()
    );
    utils::print_table_border(100);
    utils::print_table_row(&["Staff", "Email", "Certification", "Expires"], &[24, 30, 20, 20]);
    utils::print_table_border(100);
    for cert in &expiring {
        utils::print_table_row(
            &[
                &utils::truncate(&cert.staff_name, 24),
                &utils::truncate(&cert.staff_email, 30),
                &utils::truncate(&cert.certification_name, 20),
                &utils::format_expiry(cert.expiry_date, today),
            ],
            &[24, 30, 20, 20],
        );
    }
    utils::print_table_border(100);
    Ok(())
}

async fn show_stats(config: &Config, account: &str, format: &str) -> error::Result<()> {
    let store = open_store(config)?;
    let stats = store.account_stats(account, Utc::now().date_naive()).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let plan = PlanTier::from_stored(stats.subscription_tier.as_deref());
    println!("{}", format!("=== Account {} ===", account).cyan().bold());
    println!("\nPlan:             {} ({} staff max)", plan, plan.staff_limit());
    println!("Staff members:    {}", stats.staff_members.to_string().green());
    println!("Templates:        {}", stats.templates);
    println!("Certifications:   {}", stats.certifications);
    println!("Expired:          {}", stats.expired_certifications.to_string().red());
    Ok(())
}

async fn initialize(config: &Config) -> error::Result<()> {
    println!("{}", "Initializing certification tracker...".green());
    let _store = open_store(config)?;
    println!("{}", "✓ Database initialized".green());
    println!("{}", "✓ Configuration loaded".green());
    println!("\n{}", "Configuration:".cyan());
    println!("  Database:       {}", config.database.path);
    println!("  Listen:         {}:{}", config.server.host, config.server.port);
    println!("  Auth URL:       {}", config.auth.url);
    println!("  Batch size:     {}", config.import.batch_size);
    println!("  Max rows:       {}", import::MAX_IMPORT_ROWS);

    println!("\n{}", "Ready to use! Try running:".cyan());
    println!("  {} to start the HTTP service", "cert-tracker serve".yellow());
    println!(
        "  {} to import a CSV export",
        "cert-tracker import staff.csv --account <id>".yellow()
    );
    Ok(())
}

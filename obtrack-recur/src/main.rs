//! obtrack-recur - command-line front end for the recurrence engine
//!
//! Every subcommand prints its result as pretty JSON on stdout; logs go to
//! stderr.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use obtrack_common::config::{RootFolderResolver, TomlConfig};
use obtrack_common::db::{init_database, schema_version};
use obtrack_common::time;
use obtrack_recur::{
    DateWindow, Frequency, ObligationKey, PlanFilter, RecurrenceService, RecurrenceSpec, Seed, SequenceRequest,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for obtrack-recur
#[derive(Parser, Debug)]
#[command(name = "obtrack-recur")]
#[command(about = "Recurring obligation generator for OBTRACK")]
#[command(version)]
struct Args {
    /// Data root folder (overrides OBTRACK_ROOT_FOLDER and the config file)
    #[arg(long, global = true)]
    root_folder: Option<PathBuf>,

    /// Config file (default: ~/.config/obtrack/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite file, bypassing root folder resolution
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create or upgrade the database
    Init,

    /// Show the next occurrences of a key without writing anything
    Preview(SequenceArgs),

    /// Create the next occurrences of a key
    Generate(SequenceArgs),

    /// List due dates inside a window that are not persisted yet
    Window(WindowArgs),

    /// Persist the coming months for every active company, state and type
    Plan(PlanArgs),
}

#[derive(clap::Args, Debug)]
struct PlanArgs {
    /// Months ahead of today (default from config)
    #[arg(long)]
    months: Option<u32>,

    /// Restrict to one company id
    #[arg(long)]
    company: Option<i64>,

    /// Restrict to one obligation type id
    #[arg(long = "type")]
    obligation_type: Option<i64>,

    /// Restrict to one state code
    #[arg(long)]
    jurisdiction: Option<String>,

    /// Restrict to obligation types whose name contains this text
    #[arg(long)]
    name: Option<String>,
}

impl PlanArgs {
    fn filter(&self) -> PlanFilter {
        PlanFilter {
            company_id: self.company,
            obligation_type_id: self.obligation_type,
            jurisdiction: self.jurisdiction.clone(),
            obligation_name: self.name.clone(),
        }
    }
}

#[derive(clap::Args, Debug)]
struct KeyArgs {
    #[arg(long)]
    company: i64,

    /// Two-letter state code
    #[arg(long)]
    jurisdiction: String,

    /// Obligation type id
    #[arg(long = "type")]
    obligation_type: i64,

    /// Obligation name filter
    #[arg(long)]
    name: Option<String>,
}

impl KeyArgs {
    fn key(&self) -> ObligationKey {
        let key = ObligationKey::new(self.company, self.jurisdiction.to_uppercase(), self.obligation_type);
        match &self.name {
            Some(name) => key.with_name(name.clone()),
            None => key,
        }
    }
}

/// Recurrence override; the obligation type's own recurrence applies otherwise
#[derive(clap::Args, Debug)]
struct SpecArgs {
    /// monthly, bimonthly, quarterly, semiannual, annual (or mensal, trimestral, ...)
    #[arg(long)]
    frequency: Option<Frequency>,

    #[arg(long)]
    anchor_day: Option<i64>,
}

impl SpecArgs {
    fn spec(&self) -> Result<Option<RecurrenceSpec>> {
        match (self.frequency, self.anchor_day) {
            (Some(frequency), Some(anchor_day)) => Ok(Some(RecurrenceSpec::new(frequency, anchor_day)?)),
            (None, None) => Ok(None),
            _ => bail!("--frequency and --anchor-day must be given together"),
        }
    }
}

#[derive(clap::Args, Debug)]
struct SequenceArgs {
    #[command(flatten)]
    key: KeyArgs,

    #[command(flatten)]
    spec: SpecArgs,

    /// Number of occurrences (default from config)
    #[arg(long)]
    count: Option<usize>,

    /// Seed competence (MM/YYYY), used when the key has no occurrence yet
    #[arg(long)]
    start_competence: Option<String>,

    /// Seed due date (YYYY-MM-DD); only its month and deadline offset carry
    /// over, later due dates fall on the anchor day (or the type's due day)
    #[arg(long)]
    start_due_date: Option<NaiveDate>,

    /// Seed delivery deadline (YYYY-MM-DD)
    #[arg(long)]
    start_delivery_deadline: Option<NaiveDate>,
}

impl SequenceArgs {
    fn request(&self, default_count: usize) -> Result<SequenceRequest> {
        let seed = match (&self.start_competence, self.start_due_date) {
            (Some(competence), Some(due_date)) => {
                let seed = Seed::new(competence.clone(), due_date);
                Some(match self.start_delivery_deadline {
                    Some(deadline) => seed.with_deadline(deadline),
                    None => seed,
                })
            }
            (None, None) => None,
            _ => bail!("--start-competence and --start-due-date must be given together"),
        };

        Ok(SequenceRequest {
            key: self.key.key(),
            spec: self.spec.spec()?,
            count: self.count.unwrap_or(default_count),
            seed,
        })
    }
}

#[derive(clap::Args, Debug)]
struct WindowArgs {
    #[command(flatten)]
    key: KeyArgs,

    #[command(flatten)]
    spec: SpecArgs,

    /// Window start (YYYY-MM-DD)
    #[arg(long)]
    from: NaiveDate,

    /// Window end, inclusive (YYYY-MM-DD)
    #[arg(long)]
    to: NaiveDate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    init_tracing(&config.logging.level);

    let db_path = match &args.database {
        Some(path) => path.clone(),
        None => {
            let root_folder = RootFolderResolver::new(args.root_folder.clone(), &config).resolve();
            config.database_path(&root_folder)
        }
    };
    info!("Database path: {}", db_path.display());

    let pool = init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;
    let service = RecurrenceService::new(pool.clone());
    let default_count = config.planning.default_count as usize;

    match args.command {
        Command::Init => {
            let version = schema_version(&pool).await?;
            print_json(&serde_json::json!({
                "database": db_path.display().to_string(),
                "schema_version": version,
            }))?;
        }
        Command::Preview(sequence) => {
            let response = service
                .preview(&sequence.request(default_count)?)
                .await
                .context("Preview failed")?;
            print_json(&response)?;
        }
        Command::Generate(sequence) => {
            let response = service
                .generate(&sequence.request(default_count)?, time::today())
                .await
                .context("Generation failed")?;
            print_json(&response)?;
        }
        Command::Window(window_args) => {
            let window = DateWindow::new(window_args.from, window_args.to)?;
            let occurrences = service
                .generate_window(&window_args.key.key(), window_args.spec.spec()?, &window)
                .await
                .context("Window generation failed")?;
            print_json(&occurrences)?;
        }
        Command::Plan(plan_args) => {
            let months = plan_args.months.unwrap_or(config.planning.months_ahead);
            let summary = service
                .plan_period(months, &plan_args.filter(), time::today())
                .await
                .context("Planning failed")?;
            print_json(&summary)?;
        }
    }

    Ok(())
}

fn init_tracing(level: &str) {
    let default_filter = format!("obtrack_recur={level},obtrack_common={level}");
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_plan_flags_build_filter() {
        let args = Args::try_parse_from([
            "obtrack-recur", "plan", "--type", "7", "--jurisdiction", "sp", "--name", "gia",
        ])
        .unwrap();
        let Command::Plan(plan_args) = args.command else {
            panic!("expected plan subcommand");
        };
        let filter = plan_args.filter();
        assert_eq!(filter.company_id, None);
        assert_eq!(filter.obligation_type_id, Some(7));
        assert_eq!(filter.jurisdiction.as_deref(), Some("sp"));
        assert_eq!(filter.obligation_name.as_deref(), Some("gia"));
    }

    #[test]
    fn test_start_due_date_help_names_anchor_day() {
        let mut command = Args::command();
        let generate = command.find_subcommand_mut("generate").unwrap();
        let arg = generate
            .get_arguments()
            .find(|a| a.get_id() == "start_due_date")
            .unwrap();
        let help = arg.get_help().unwrap().to_string();
        assert!(help.contains("anchor day"), "{help}");
    }
}

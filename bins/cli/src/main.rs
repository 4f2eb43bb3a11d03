//! MIS builder command line.
//!
//! Computes the report of a workbook (a ledger fixture plus a KPI template
//! and instance), drills down into a cell, and prints the supplemental
//! account prefix, journal and open invoice reports.

mod output;
mod workbook;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use misbuilder_core::domain::Domain;
use misbuilder_core::fiscal::PeriodResolver;
use misbuilder_core::mis::{ReportError, ReportService, ReportSettings, TargetMove, mode_filters};
use misbuilder_core::reports::{
    FinancialReportService, JournalReportRequest, OpenInvoiceRequest, PartnerSelection,
};
use misbuilder_shared::{AppConfig, AppError, LoggingConfig};

use output::OutputFormat;
use workbook::Workbook;

/// Management information reports over an accounting ledger
#[derive(Parser)]
#[command(name = "misbuilder", version, about)]
struct Cli {
    /// Workbook file: ledger fixture, template and instance
    #[arg(long, short, env = "MISBUILDER_WORKBOOK")]
    workbook: PathBuf,

    /// Date used when the instance has none (defaults to today)
    #[arg(long, global = true)]
    today: Option<NaiveDate>,

    /// Output format
    #[arg(long, value_enum, default_value = "table", global = true)]
    output: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the report of the workbook instance
    Compute,
    /// Build the move line listing behind a formula in one column
    Drilldown {
        /// Column name
        #[arg(long)]
        period: String,
        /// Formula, e.g. "bal[70%]"
        #[arg(long)]
        expr: String,
        /// Also fetch the listed move lines
        #[arg(long)]
        lines: bool,
    },
    /// Compute the account prefix lines of the workbook for one column
    Prefix {
        /// Column name (defaults to the first column)
        #[arg(long)]
        period: Option<String>,
    },
    /// List journal entries of the instance company
    Journal {
        /// First day
        #[arg(long)]
        from: NaiveDate,
        /// Last day
        #[arg(long)]
        to: NaiveDate,
        /// Journal codes (defaults to every journal of the company)
        #[arg(long = "journal")]
        journals: Vec<String>,
        /// Entries to list (defaults to the configured target move)
        #[arg(long, value_enum)]
        target_move: Option<TargetArg>,
    },
    /// List receivable and payable lines of the instance company still open
    OpenInvoices {
        /// Lines dated on or before this day are listed
        #[arg(long)]
        at: NaiveDate,
        /// Clearance date (defaults to --at)
        #[arg(long)]
        until: Option<NaiveDate>,
        /// Accounts to list
        #[arg(long, value_enum, default_value = "customer")]
        selection: SelectionArg,
        /// Partner names (defaults to every partner)
        #[arg(long = "partner")]
        partners: Vec<String>,
        /// Entries to list
        #[arg(long, value_enum, default_value = "all")]
        target_move: TargetArg,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SelectionArg {
    Customer,
    Supplier,
    CustomerSupplier,
}

impl From<SelectionArg> for PartnerSelection {
    fn from(arg: SelectionArg) -> Self {
        match arg {
            SelectionArg::Customer => Self::Customer,
            SelectionArg::Supplier => Self::Supplier,
            SelectionArg::CustomerSupplier => Self::CustomerSupplier,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetArg {
    Posted,
    All,
}

impl From<TargetArg> for TargetMove {
    fn from(arg: TargetArg) -> Self {
        match arg {
            TargetArg::Posted => Self::Posted,
            TargetArg::All => Self::All,
        }
    }
}

fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let (code, status) = err
                .downcast_ref::<AppError>()
                .map_or(("INTERNAL_ERROR", 1), |e| (e.error_code(), e.exit_code()));
            eprintln!("error[{code}]: {err:#}");
            ExitCode::from(u8::try_from(status).unwrap_or(1))
        }
    }
}

fn init_tracing(logging: &LoggingConfig) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.filter)))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load().map_err(AppError::from)?;
    init_tracing(&config.logging);

    let workbook = Workbook::load(&cli.workbook)?;
    info!(path = %cli.workbook.display(), "workbook loaded");
    let settings = ReportSettings::from_config(&config.report).map_err(AppError::from)?;
    let today = cli
        .today
        .unwrap_or_else(|| Utc::now().with_timezone(&settings.timezone).date_naive());
    let ledger = &workbook.ledger;
    let instance = &workbook.instance;

    match cli.command {
        Commands::Compute => {
            let matrix = ReportService::new(ledger, settings)
                .compute(&workbook.template, instance, today)
                .map_err(AppError::from)?;
            info!(rows = matrix.rows.len(), columns = matrix.header.len(), "report computed");
            output::matrix(cli.output, &matrix)
        }
        Commands::Drilldown { period, expr, lines } => {
            let action = ReportService::new(ledger, settings)
                .drilldown(instance, &period, &expr, today)
                .map_err(AppError::from)?;
            let listed = match (&action, lines) {
                (Some(action), true) => action
                    .lines(ledger)
                    .map_err(|e| AppError::from(ReportError::from(e)))?,
                _ => Vec::new(),
            };
            output::drilldown(cli.output, action.as_ref(), &listed)
        }
        Commands::Prefix { period } => {
            let column = match period {
                Some(name) => instance.period(&name).map_err(AppError::from)?,
                None => instance
                    .sorted_periods()
                    .first()
                    .copied()
                    .ok_or_else(|| AppError::Validation("Report instance has no periods".into()))?,
            };
            let resolver = PeriodResolver::new(ledger);
            let window = resolver
                .resolve(&column.spec(), instance.pivot_date(today), Some(instance.company_id))
                .map_err(|e| AppError::from(ReportError::from(e)))?;
            let filter = mode_filters(&resolver, &window, instance.target_move)
                .map_err(AppError::from)?
                .variation
                .with(Domain::eq("company_id", instance.company_id.into_inner()));
            let lines = FinancialReportService::new(ledger)
                .prefix_lines(&workbook.prefix_lines, &filter)
                .map_err(AppError::from)?;
            output::prefix_lines(cli.output, &column.name, &lines)
        }
        Commands::Journal {
            from,
            to,
            journals,
            target_move,
        } => {
            let request = JournalReportRequest {
                company_id: instance.company_id,
                date_from: from,
                date_to: to,
                target_move: target_move.map_or_else(|| config.report.target_move.into(), Into::into),
                journal_ids: ledger
                    .journals
                    .iter()
                    .filter(|j| journals.is_empty() || journals.contains(&j.code))
                    .map(|j| j.id)
                    .collect(),
            };
            let report = FinancialReportService::new(ledger)
                .journal_report(&request)
                .map_err(AppError::from)?;
            output::journal(cli.output, &report)
        }
        Commands::OpenInvoices {
            at,
            until,
            selection,
            partners,
            target_move,
        } => {
            let mut request = OpenInvoiceRequest::new(instance.company_id, at, selection.into());
            request.until_date = until;
            request.target_move = target_move.into();
            request.partner_ids = ledger
                .move_lines
                .iter()
                .filter(|l| l.partner_name.as_ref().is_some_and(|name| partners.contains(name)))
                .filter_map(|l| l.partner_id)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect();
            if !partners.is_empty() && request.partner_ids.is_empty() {
                return Err(AppError::Validation(format!("Unknown partners: {}", partners.join(", "))).into());
            }
            let report = FinancialReportService::new(ledger)
                .open_invoice_report(&request)
                .map_err(AppError::from)?;
            output::open_invoices(cli.output, &report)
        }
    }
}

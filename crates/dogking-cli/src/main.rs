// ============================================================================
// dogking - CLI front end for the community scoring event
// ============================================================================
// Usage:
//   dogking login NAME --password PSW [--remember]
//   dogking items [--element 1,2] [--weapon 3] [--acquired 1] [--custom]
//   dogking report [--date YYYY-MM-DD] [--add ID]... [--remove ID]...
//   dogking leaderboard [--details]
//   dogking dates / set-date scoring 2024-05-01
// ============================================================================

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use dogking_core::{
    admin_date, aggregate_items_through, build_chart, rank_users, visible_history, Catalog,
    FacetSelection, FilterMode, GateState, ItemDetailLoader, ScoreApi, ScoreError, ScoreSheet,
    SessionGate, SessionStore, SubmissionConfig, CUTOFF_DATE_ID, DEFAULT_API_URL,
    DEFAULT_POOL_KEY, SCORE_DATE_ID,
};
use std::sync::Arc;

/// Facet display names, 1-indexed by tag code.
const ELEMENTS: [&str; 6] = ["火", "水", "土", "風", "光", "闇"];
const WEAPONS: [&str; 10] = ["剣", "短剣", "槍", "斧", "杖", "銃", "格闘", "弓", "楽器", "刀"];
const ACQUISITIONS: [&str; 2] = ["普通", "贵族or季限"];

/// Scoring event client
#[derive(Parser)]
#[command(name = "dogking", version, about = "Report daily scores and browse the event leaderboard")]
struct Cli {
    /// API base URL (default: DOGKING_API_URL env var or the event server)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Path to the session store (default: ~/.dogking/session.redb)
    #[arg(long, global = true)]
    db_path: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and persist the session
    Login {
        name: String,

        #[arg(long)]
        password: String,

        /// Persist the credential pair for auto-restore (stored base64
        /// encoded, readable by anyone with access to the store file)
        #[arg(long)]
        remember: bool,
    },

    /// Create an account (log in separately afterwards)
    Register {
        name: String,

        #[arg(long)]
        password: String,

        #[arg(long)]
        confirm: String,
    },

    /// Clear the persisted session
    Logout,

    /// Show (and re-validate, when a credential is stored) the session
    Whoami,

    /// Browse the item catalog with facet filters
    Items {
        /// Element codes to include (1-6), comma separated
        #[arg(long, value_delimiter = ',')]
        element: Vec<u32>,

        /// Weapon type codes to include (1-10), comma separated
        #[arg(long, value_delimiter = ',')]
        weapon: Vec<u32>,

        /// Acquisition codes to include (1-2), comma separated
        #[arg(long, value_delimiter = ',')]
        acquired: Vec<u32>,

        /// Show only custom event items (overrides all facet filters)
        #[arg(long)]
        custom: bool,
    },

    /// View or edit the daily report for a date (submission is gated to
    /// the admin scoring date)
    Report {
        /// Date to open (default: the admin scoring date)
        #[arg(long)]
        date: Option<String>,

        /// Item ids to append to the basket
        #[arg(long = "add")]
        add: Vec<String>,

        /// Item ids to remove (first occurrence each)
        #[arg(long = "remove")]
        remove: Vec<String>,
    },

    /// View or edit the legacy shared score pool
    Pool {
        /// Pool key to open
        #[arg(long, default_value = DEFAULT_POOL_KEY)]
        key: String,

        #[arg(long = "add")]
        add: Vec<String>,

        #[arg(long = "remove")]
        remove: Vec<String>,
    },

    /// Per-date submission history for a user (dates before the cutoff)
    History {
        /// User id (default: the logged-in user)
        #[arg(long)]
        uid: Option<String>,
    },

    /// Ranking and cumulative score chart
    Leaderboard {
        /// Also fetch each user's item details (through the cutoff date)
        #[arg(long)]
        details: bool,
    },

    /// Show the admin dates (scoring date and cutoff date)
    Dates,

    /// Update an admin date
    SetDate {
        /// Which date: scoring or cutoff
        which: String,

        /// New date (YYYY-MM-DD)
        date: String,
    },
}

fn parse_which(s: &str) -> Result<u32> {
    match s.to_lowercase().as_str() {
        "scoring" | "score" => Ok(SCORE_DATE_ID),
        "cutoff" | "open" => Ok(CUTOFF_DATE_ID),
        _ => anyhow::bail!("Unknown date '{}'. Valid values: scoring, cutoff", s),
    }
}

fn facet_label<'a>(table: &'a [&'a str], code: Option<u32>) -> &'a str {
    match code {
        Some(code) => code
            .checked_sub(1)
            .and_then(|i| table.get(i as usize))
            .copied()
            .unwrap_or("?"),
        None => "-",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dogking_cli=info".parse().unwrap())
                .add_directive("dogking_core=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();

    let base_url = cli
        .api_url
        .clone()
        .or_else(|| std::env::var("DOGKING_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string());
    let api = Arc::new(ScoreApi::new(&base_url)?);
    let gate = SessionGate::new(SessionStore::open(cli.db_path.as_deref())?);

    info!("Using API at {}", api.base_url());

    match cli.command {
        Commands::Login {
            name,
            password,
            remember,
        } => cmd_login(&api, &gate, &name, &password, remember).await,
        Commands::Register {
            name,
            password,
            confirm,
        } => cmd_register(&api, &gate, &name, &password, &confirm).await,
        Commands::Logout => cmd_logout(&gate),
        Commands::Whoami => cmd_whoami(&api, &gate).await,
        Commands::Items {
            element,
            weapon,
            acquired,
            custom,
        } => cmd_items(&api, element, weapon, acquired, custom).await,
        Commands::Report { date, add, remove } => cmd_report(&api, &gate, date, add, remove).await,
        Commands::Pool { key, add, remove } => cmd_pool(&api, &key, add, remove).await,
        Commands::History { uid } => cmd_history(&api, &gate, uid).await,
        Commands::Leaderboard { details } => cmd_leaderboard(Arc::clone(&api), details).await,
        Commands::Dates => cmd_dates(&api).await,
        Commands::SetDate { which, date } => cmd_set_date(&api, &which, &date).await,
    }
}

async fn cmd_login(
    api: &ScoreApi,
    gate: &SessionGate,
    name: &str,
    password: &str,
    remember: bool,
) -> Result<()> {
    let uid = gate.login(api, name, password, remember).await?;
    println!("Logged in as {} (uid {})", name, uid);
    if remember {
        println!("Credential stored in {} for auto-restore.", gate.store().path().display());
    }
    Ok(())
}

async fn cmd_register(
    api: &ScoreApi,
    gate: &SessionGate,
    name: &str,
    password: &str,
    confirm: &str,
) -> Result<()> {
    let uid = gate.register(api, name, password, confirm).await?;
    println!("Registered {} (uid {}). Log in to start reporting.", name, uid);
    Ok(())
}

fn cmd_logout(gate: &SessionGate) -> Result<()> {
    gate.logout()?;
    println!("Session cleared.");
    Ok(())
}

async fn cmd_whoami(api: &ScoreApi, gate: &SessionGate) -> Result<()> {
    match gate.restore(api).await? {
        Some(uid) => println!("Logged in (uid {})", uid),
        None => println!("Not logged in."),
    }
    Ok(())
}

async fn cmd_items(
    api: &ScoreApi,
    element: Vec<u32>,
    weapon: Vec<u32>,
    acquired: Vec<u32>,
    custom: bool,
) -> Result<()> {
    let catalog = Catalog::new(api.get_all_items().await?);

    let selection = FacetSelection {
        element: element.into_iter().collect(),
        weapon: weapon.into_iter().collect(),
        acquisition: acquired.into_iter().collect(),
    };
    let mode = if custom {
        FilterMode::CustomOnly
    } else {
        FilterMode::Facets
    };

    let items = catalog.filter(&selection, mode);
    if items.is_empty() {
        println!("No items match.");
        return Ok(());
    }

    println!("{:<14}  {:<24}  {:<4}  {:<6}  {}", "ID", "NAME", "ELEM", "WEAPON", "ACQUIRED");
    println!("{}", "-".repeat(64));
    for item in &items {
        println!(
            "{:<14}  {:<24}  {:<4}  {:<6}  {}",
            item.id,
            item.name,
            facet_label(&ELEMENTS, item.details.zo),
            facet_label(&WEAPONS, item.details.bu),
            facet_label(&ACQUISITIONS, item.details.get),
        );
    }
    println!("\nTotal: {} of {} items", items.len(), catalog.len());
    Ok(())
}

async fn cmd_report(
    api: &ScoreApi,
    gate: &SessionGate,
    date: Option<String>,
    add: Vec<String>,
    remove: Vec<String>,
) -> Result<()> {
    let uid = gate
        .restore(api)
        .await?
        .ok_or(ScoreError::NotLoggedIn)?;

    let catalog = Catalog::new(api.get_all_items().await?);
    let mut sheet = ScoreSheet::load(api, SubmissionConfig::per_user_date(), Some(uid)).await?;

    let date = match date.or_else(|| sheet.gate().allowed_date().map(str::to_string)) {
        Some(date) => date,
        None => anyhow::bail!("No scoring date is set; pass --date explicitly"),
    };
    sheet.select_key(&date);

    match sheet.gate_state() {
        GateState::Editable => println!("{} is open for submission", date),
        GateState::ReadOnly => println!(
            "{} is read only (the scoring date is {})",
            date,
            sheet.gate().allowed_date().unwrap_or("unset")
        ),
    }

    if add.is_empty() && remove.is_empty() {
        print_basket(&sheet, &catalog);
        return Ok(());
    }

    for id in &add {
        sheet.add_item(id.clone());
    }
    for id in &remove {
        if !sheet.remove_item(id) {
            println!("  (id {} was not in the basket)", id);
        }
    }

    sheet.submit(api).await?;
    println!("Submitted. Server now has:");
    print_basket(&sheet, &catalog);
    Ok(())
}

async fn cmd_pool(api: &ScoreApi, key: &str, add: Vec<String>, remove: Vec<String>) -> Result<()> {
    let catalog = Catalog::new(api.get_all_items().await?);
    let mut sheet = ScoreSheet::load(api, SubmissionConfig::pool(), None).await?;
    sheet.select_key(key);

    if add.is_empty() && remove.is_empty() {
        println!("Pool keys: {}", sheet.entries().keys().cloned().collect::<Vec<_>>().join(", "));
        println!("Key {}:", key);
        print_basket(&sheet, &catalog);
        return Ok(());
    }

    for id in &add {
        sheet.add_item(id.clone());
    }
    for id in &remove {
        if !sheet.remove_item(id) {
            println!("  (id {} was not in the pool entry)", id);
        }
    }

    sheet.submit(api).await?;
    println!("Pool entry {} updated. Server now has:", key);
    print_basket(&sheet, &catalog);
    Ok(())
}

fn print_basket(sheet: &ScoreSheet, catalog: &Catalog) {
    let basket = sheet.basket();
    if basket.is_empty() {
        println!("  (empty)");
        return;
    }
    let resolved = basket.resolve(catalog);
    for item in &resolved {
        println!("  {:<14}  {}", item.id, item.name);
    }
    if resolved.len() < basket.len() {
        println!("  ({} id(s) not in the catalog, hidden)", basket.len() - resolved.len());
    }
}

async fn cmd_history(api: &ScoreApi, gate: &SessionGate, uid: Option<String>) -> Result<()> {
    let uid = match uid {
        Some(uid) => uid,
        None => gate.current_uid()?.ok_or(ScoreError::NotLoggedIn)?,
    };

    let catalog = Catalog::new(api.get_all_items().await?);
    let dates = api.ad_times().await?;
    let cutoff = admin_date(&dates, CUTOFF_DATE_ID);
    let scores = api.user_scores_by_date(&uid).await?;

    let history = visible_history(&scores, cutoff, &catalog);
    if history.is_empty() {
        println!("No submissions before the cutoff.");
        return Ok(());
    }

    for (date, items) in &history {
        println!("=== {} ({} items) ===", date, items.len());
        for item in items {
            println!("  {:<14}  {}", item.id, item.name);
        }
    }
    Ok(())
}

async fn cmd_leaderboard(api: Arc<ScoreApi>, details: bool) -> Result<()> {
    let ranked = rank_users(api.all_user_scores().await?);
    let daily = api.all_daily_scores().await?;
    let chart = build_chart(&daily);

    println!("=== Leaderboard ===");
    println!("{:<4}  {:<16}  {}", "RANK", "NAME", "TOTAL");
    println!("{}", "-".repeat(32));
    for (index, user) in ranked.iter().enumerate() {
        println!("{:<4}  {:<16}  {}", index + 1, user.name, user.total_score);
    }

    if !chart.dates.is_empty() {
        println!("\n=== Cumulative Daily Scores ===");
        let widths: Vec<usize> = chart
            .series
            .iter()
            .map(|s| s.name.chars().count().max(3))
            .collect();
        let header: Vec<String> = chart
            .series
            .iter()
            .zip(&widths)
            .map(|(s, &w)| format!("{:>width$}", s.name, width = w))
            .collect();
        println!("{:<12}  {}", "DATE", header.join("  "));
        for (row, date) in chart.dates.iter().enumerate() {
            let cells: Vec<String> = chart
                .series
                .iter()
                .zip(&widths)
                .map(|(s, &w)| format!("{:>width$}", s.points[row], width = w))
                .collect();
            println!("{:<12}  {}", date, cells.join("  "));
        }
    }

    if details {
        let admin_dates = api.ad_times().await?;
        let cutoff = admin_date(&admin_dates, CUTOFF_DATE_ID).map(str::to_string);
        let catalog = Catalog::new(api.get_all_items().await?);

        let uids: Vec<String> = chart.series.iter().map(|s| s.uid.clone()).collect();
        let loader = ItemDetailLoader::new(Arc::clone(&api));
        let Some(user_items) = loader.load(&uids, &catalog).await else {
            return Ok(());
        };

        println!("\n=== Item Details (through {}) ===", cutoff.as_deref().unwrap_or("today"));
        for series in &chart.series {
            let items = user_items
                .get(&series.uid)
                .map(|daily| aggregate_items_through(daily, cutoff.as_deref()))
                .unwrap_or_default();
            let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
            println!("{:<16}  {}", series.name, if names.is_empty() { "(no records)".to_string() } else { names.join(", ") });
        }
    }

    Ok(())
}

async fn cmd_dates(api: &ScoreApi) -> Result<()> {
    let dates = api.ad_times().await?;
    println!(
        "Scoring date: {}",
        admin_date(&dates, SCORE_DATE_ID).unwrap_or("(unset)")
    );
    println!(
        "Cutoff date:  {}",
        admin_date(&dates, CUTOFF_DATE_ID).unwrap_or("(unset)")
    );
    Ok(())
}

async fn cmd_set_date(api: &ScoreApi, which: &str, date: &str) -> Result<()> {
    let id = parse_which(which)?;
    let accepted = api.update_ad_time(id, date).await?;
    println!("{} date is now {}", which, accepted);
    Ok(())
}

//! Club Ledger command line
//!
//! Resolves the caller's token to an account, opens the configured store
//! and runs one subcommand against it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use cost_engine::{
    money::format_amount, Coupon, Decimal, Game, GameResult, MonthKey, RawFeeConfig, SessionConfig,
    SessionSummary, SlotEntry,
};
use persistence::{
    create_draft_store, create_in_memory_store, create_local_store_with_config, AccountId,
    BackendKind, DocumentStore,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use club_service::{
    import_session, initialize_logging, load_config, monthly_income, player_history,
    rebuild_rankings, AuthProvider, RecomputeTrigger, ServiceConfig, ServiceError, SessionDraft,
    SessionImport, SessionWorkflow, StaticAuthProvider,
};

#[derive(Parser)]
#[command(name = "club-ledger")]
#[command(about = "Session costs, coupons, payments and rankings for a badminton club")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Access token; falls back to CLUB_TOKEN
    #[arg(long, global = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a session (and optionally its fees and members) from a JSON file
    ImportSession {
        #[arg(long)]
        file: PathBuf,
    },

    /// Write the fee configuration of a session
    SetFees {
        #[arg(long)]
        session: String,
        /// Court bill split evenly across participants
        #[arg(long)]
        total: Option<Decimal>,
        /// Court fee per game played
        #[arg(long)]
        per_game: Option<Decimal>,
        /// Court fee per participant
        #[arg(long)]
        fixed: Option<Decimal>,
        #[arg(long)]
        shuttle_price: Decimal,
        #[arg(long)]
        organizer_fee: Decimal,
    },

    /// Show the per-player cost table of a session
    Summary {
        #[arg(long)]
        session: String,
    },

    /// Give an active coupon to a player of a session
    AssignCoupon {
        #[arg(long)]
        session: String,
        #[arg(long)]
        coupon: String,
        #[arg(long)]
        member: String,
    },

    /// Take back a coupon assignment by its position in the list
    RemoveCoupon {
        #[arg(long)]
        session: String,
        #[arg(long)]
        index: usize,
    },

    /// Create a new active coupon
    AddCoupon {
        #[arg(long)]
        id: String,
        #[arg(long)]
        amount: Decimal,
    },

    /// Flip a player's paid flag
    TogglePaid {
        #[arg(long)]
        session: String,
        #[arg(long)]
        player: String,
    },

    /// Add a game to the session's live draft
    RecordGame {
        #[arg(long)]
        session: String,
        #[arg(long)]
        a1: Option<String>,
        #[arg(long)]
        a2: Option<String>,
        #[arg(long)]
        b1: Option<String>,
        #[arg(long)]
        b2: Option<String>,
        #[arg(long, default_value_t = 0)]
        shuttles: u32,
        /// a, b, draw, or leave out while the game is still running
        #[arg(long, value_parser = parse_result)]
        result: Option<GameResult>,
    },

    /// Close the live draft and store its games as the session's own
    CloseDraft {
        #[arg(long)]
        session: String,
    },

    /// Record the session in the payment history and close it
    Finalize {
        #[arg(long)]
        session: String,
    },

    /// Show the ranking of a month (MM-YYYY)
    Ranking {
        #[arg(long)]
        month: MonthKey,
    },

    /// Income per month, or one player's sessions with --player
    Report {
        #[arg(long)]
        player: Option<String>,
        /// Recompute monthly rankings from the history instead
        #[arg(long)]
        rebuild_rankings: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let result = start(Cli::parse()).await;

    // Lookup failures exit with 2 and no error chain
    if let Some(service) = result.as_ref().err().and_then(lookup_failure) {
        eprintln!("{} {}", "Lookup failed:".yellow().bold(), service);
        std::process::exit(2);
    }
    result
}

async fn start(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    initialize_logging(&config.logging).context("Failed to initialize logging")?;
    info!("Starting club-ledger v{}", env!("CARGO_PKG_VERSION"));

    let auth = StaticAuthProvider::from_config(&config.auth)?;
    let token = cli
        .token
        .clone()
        .or_else(|| std::env::var("CLUB_TOKEN").ok())
        .context("No token given; pass --token or set CLUB_TOKEN")?;
    let account = auth.resolve(&token).await?;

    match config.persistence.backend {
        BackendKind::Local => {
            let mut store = create_local_store_with_config(config.persistence.clone())?;
            store.initialize().await?;
            run(cli.command, Arc::new(store), account, &config).await
        }
        BackendKind::Memory => {
            let mut store = create_in_memory_store(config.persistence.clone());
            store.initialize().await?;
            run(cli.command, Arc::new(store), account, &config).await
        }
    }
}

/// The service error behind `error`, when it is a lookup failure
fn lookup_failure(error: &anyhow::Error) -> Option<&ServiceError> {
    error.downcast_ref::<ServiceError>().filter(|service| service.is_lookup())
}

async fn run<S: DocumentStore>(
    command: Commands,
    store: Arc<S>,
    account: AccountId,
    config: &ServiceConfig,
) -> Result<()> {
    let currency = config.service.currency.as_str();

    match command {
        Commands::ImportSession { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let import: SessionImport = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            let session_id = import.session.id.clone();
            let added = import_session(store.as_ref(), &account, import).await?;
            println!(
                "{} session {} ({} new member(s))",
                "Imported".green().bold(),
                session_id,
                added
            );
        }

        Commands::SetFees { session, total, per_game, fixed, shuttle_price, organizer_fee } => {
            let mut raw = RawFeeConfig::new()
                .with_shuttle_price(shuttle_price)
                .with_organizer_fee(organizer_fee);
            if let Some(amount) = total {
                raw = raw.with_total_court_fee(amount);
            }
            if let Some(amount) = per_game {
                raw = raw.with_per_game_court_fee(amount);
            }
            if let Some(amount) = fixed {
                raw = raw.with_fixed_per_person_court_fee(amount);
            }

            let mut workflow = SessionWorkflow::load(store, account, &session).await?;
            workflow.update_fee_config(raw).await?;
            match workflow.validated_config() {
                Ok(_) => print_summary(&config.service.club_name, workflow.summary(), currency),
                Err(e) => println!("{} {}", "Fees saved but not usable:".yellow().bold(), e),
            }
        }

        Commands::Summary { session } => {
            let mut workflow = SessionWorkflow::load(store, account, &session).await?;
            if let Err(e) = workflow.validated_config() {
                println!("{} {}", "Fee configuration:".yellow().bold(), e);
            }
            let summary = workflow.recompute(RecomputeTrigger::Manual);
            print_summary(&config.service.club_name, summary, currency);
            for (index, assignment) in workflow.assignments().iter().enumerate() {
                println!(
                    "  coupon #{index}: {} -> {} ({} {currency})",
                    assignment.coupon_id,
                    assignment.member_name,
                    format_amount(assignment.discount_amount)
                );
            }
        }

        Commands::AssignCoupon { session, coupon, member } => {
            let mut workflow = SessionWorkflow::load(store, account, &session).await?;
            workflow.assign_coupon(&coupon, &member).await?;
            println!("{} coupon {} to {}", "Assigned".green().bold(), coupon, member);
            print_summary(&config.service.club_name, workflow.summary(), currency);
        }

        Commands::RemoveCoupon { session, index } => {
            let mut workflow = SessionWorkflow::load(store, account, &session).await?;
            let removed = workflow.remove_coupon(index).await?;
            println!(
                "{} coupon {} from {}",
                "Removed".green().bold(),
                removed.coupon_id,
                removed.member_name
            );
        }

        Commands::AddCoupon { id, amount } => {
            if store.get_coupon(&account, &id).await?.is_some() {
                anyhow::bail!("Coupon {id} already exists");
            }
            store.put_coupon(&account, &Coupon::new(id.as_str(), amount)).await?;
            println!(
                "{} coupon {} worth {} {currency}",
                "Added".green().bold(),
                id,
                format_amount(amount)
            );
        }

        Commands::TogglePaid { session, player } => {
            let mut workflow = SessionWorkflow::load(store, account, &session).await?;
            let paid = workflow.toggle_paid(&player).await?;
            let state = if paid { "paid".green() } else { "unpaid".red() };
            println!("{} is now {}", player, state);
        }

        Commands::RecordGame { session, a1, a2, b1, b2, shuttles, result } => {
            let kv = create_draft_store(&config.persistence);
            let workflow = SessionWorkflow::load(store, account.clone(), &session).await?;
            let mut draft = match SessionDraft::load(&kv, &account, &session).await? {
                Some(draft) => draft,
                None => workflow.draft(),
            };

            let game = Game {
                a1: a1.map(SlotEntry::new),
                a2: a2.map(SlotEntry::new),
                b1: b1.map(SlotEntry::new),
                b2: b2.map(SlotEntry::new),
                shuttles_used: shuttles,
                result: result.unwrap_or_default(),
            };
            let index = draft.live.add_game(game)?;
            draft.save(&kv).await?;

            let parsed = SessionConfig::parse(&draft.raw_config).ok();
            let totals = draft.live.running_totals(parsed.as_ref());
            println!("{} game #{} in draft of {}", "Recorded".green().bold(), index, session);
            println!(
                "{} finished, {} running, {} shuttle(s)",
                totals.finished_games, totals.unset_games, totals.shuttles_used
            );
            if let (Some(shuttle), Some(court)) = (totals.shuttle_cost, totals.court_cost) {
                println!(
                    "Projected shuttle {} {currency}, court {} {currency}",
                    format_amount(shuttle),
                    format_amount(court)
                );
            }
        }

        Commands::CloseDraft { session } => {
            let kv = create_draft_store(&config.persistence);
            let draft = SessionDraft::load(&kv, &account, &session)
                .await?
                .with_context(|| format!("No draft stored for session {session}"))?;
            let mut workflow = SessionWorkflow::load(store, account, &session).await?;
            workflow.close_draft(draft.clone()).await?;
            draft.discard(&kv).await?;
            println!("{} draft of {}", "Closed".green().bold(), session);
            print_summary(&config.service.club_name, workflow.summary(), currency);
        }

        Commands::Finalize { session } => {
            let mut workflow = SessionWorkflow::load(store, account, &session).await?;
            let outcome = workflow.finalize().await?;
            println!(
                "{} session {} as history entry #{} ({} {currency})",
                "Finalized".green().bold(),
                session,
                outcome.sequence,
                format_amount(outcome.record.grand_total)
            );
            println!(
                "{} players ranked in {}",
                outcome.ranking.entries.len(),
                outcome.ranking.month
            );
        }

        Commands::Ranking { month } => {
            match store.get_ranking(&account, month).await? {
                Some(ranking) => {
                    println!("{}", format!("Ranking {month}").cyan().bold());
                    println!(
                        "{:<4} {:<20} {:>5} {:>5} {:>5} {:>5} {:>6}",
                        "#", "Player", "G", "W", "D", "L", "Score"
                    );
                    for (position, (name, entry)) in ranking.standings().into_iter().enumerate() {
                        println!(
                            "{:<4} {:<20} {:>5} {:>5} {:>5} {:>5} {:>6}",
                            position + 1,
                            name,
                            entry.games_played,
                            entry.wins,
                            entry.draws(),
                            entry.losses(),
                            entry.score
                        );
                    }
                }
                None => println!("No ranking recorded for {month}"),
            }
        }

        Commands::Report { player, rebuild_rankings: rebuild } => {
            let records: Vec<_> =
                store.read_history(&account).await?.into_iter().map(|entry| entry.record).collect();

            if let Some(name) = player {
                println!("{}", format!("Sessions of {name}").cyan().bold());
                for row in player_history(&records, &name) {
                    let paid = if row.summary.is_paid { "paid".green() } else { "unpaid".red() };
                    println!(
                        "{}  {:<24} {:>3} games {:>10} {currency}  {}",
                        row.date,
                        row.session_name,
                        row.summary.games_played,
                        format_amount(row.summary.total),
                        paid
                    );
                }
            } else if rebuild {
                for (month, ranking) in rebuild_rankings(&records) {
                    let leader = ranking.standings().first().map(|(name, _)| name.to_string());
                    println!(
                        "{}  {} players, leader {}",
                        month,
                        ranking.entries.len(),
                        leader.unwrap_or_else(|| "-".to_string())
                    );
                }
            } else {
                println!("{}", format!("{} income", config.service.club_name).cyan().bold());
                for (month, income) in monthly_income(&records) {
                    println!(
                        "{}  {:>3} session(s) {:>4} player(s) {:>12} {currency}",
                        month,
                        income.sessions,
                        income.players.len(),
                        format_amount(income.collected)
                    );
                }
            }
        }
    }

    Ok(())
}

fn parse_result(value: &str) -> std::result::Result<GameResult, String> {
    match value.to_ascii_lowercase().as_str() {
        "a" | "teama" => Ok(GameResult::TeamA),
        "b" | "teamb" => Ok(GameResult::TeamB),
        "draw" => Ok(GameResult::Draw),
        "unset" => Ok(GameResult::Unset),
        other => Err(format!("unknown result {other:?}, expected a, b, draw or unset")),
    }
}

fn print_summary(club_name: &str, summary: &SessionSummary, currency: &str) {
    if summary.is_empty() {
        println!("{}", "No players to charge yet".yellow());
        return;
    }

    println!("{}", club_name.cyan().bold());
    println!(
        "{:<20} {:>5} {:>5} {:>5} {:>9} {:>9} {:>9} {:>9} {:>9}  {}",
        "Player", "G", "W", "Pts", "Shuttle", "Court", "Org", "Coupon", "Total", "Paid"
    );
    for player in summary.players() {
        let discount = player.discount.as_ref().map(|d| d.amount).unwrap_or(Decimal::ZERO);
        let paid = if player.is_paid { "yes".green() } else { "no".red() };
        println!(
            "{:<20} {:>5} {:>5} {:>5} {:>9} {:>9} {:>9} {:>9} {:>9}  {}",
            player.name,
            player.games_played,
            player.wins,
            player.score,
            format_amount(player.shuttle_cost),
            format_amount(player.court_share),
            format_amount(player.organizer_share),
            format_amount(discount),
            format_amount(player.total),
            paid
        );
    }
    println!(
        "{} {} {currency} (outstanding {} {currency})",
        "Grand total:".bold(),
        format_amount(summary.grand_total()),
        format_amount(summary.outstanding_total())
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use club_service::config::AuthConfig;

    #[tokio::test]
    async fn test_unknown_token_is_a_lookup_failure() {
        let mut config = AuthConfig::default();
        config.tokens.insert("secret".to_string(), "club-a".to_string());
        let auth = StaticAuthProvider::from_config(&config).unwrap();

        let error: anyhow::Error = auth.resolve("wrong").await.unwrap_err().into();
        assert!(matches!(lookup_failure(&error), Some(ServiceError::Unauthenticated)));

        let other = anyhow::Error::from(ServiceError::configuration("bad level"));
        assert!(lookup_failure(&other).is_none());
        assert!(lookup_failure(&anyhow::anyhow!("plain")).is_none());
    }
}

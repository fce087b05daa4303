use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeDelta, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use scoreboard_core::{
    capture::{manual_score, parse_recognized_score, ScoreStabilizer},
    clients::{http_client, CabinetClient, HttpCatalog, LeaderboardClient, TableCatalog},
    AppConfig, CabinetId, Day, DuplicateDisposition, HighScoreType, ScanEvent, ScanOptions,
    ScanReport, Scanner, Score, ScoreModel, ScoreboardDocument, Seconds, Table, TableSummary, Vr,
    WebTableId,
};

/// Window for `tables --recent`.
const RECENT_DAYS: i64 = 3;

#[derive(Parser)]
#[command(name = "scoreboard", version, about = "High scores for a virtual pinball cabinet")]
pub(crate) struct Cli {
    /// Score document to use instead of the configured one.
    #[arg(long, global = true)]
    pub(crate) document: Option<PathBuf>,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// List tables with the owner's best score.
    Tables(TableListing),
    /// Details and scoreboard of one table.
    Show { cabinet_id: String },
    /// Pull data from the cabinet, the leaderboard or the catalog.
    Scan {
        #[arg(value_enum, default_value_t = ScanTarget::All)]
        target: ScanTarget,
    },
    /// Show tables that share a score store.
    Duplicates {
        /// Include groups that need no attention.
        #[arg(long)]
        all: bool,
    },
    /// Attribute a shared score store to this table's design.
    Resolve { cabinet_id: String },
    /// Record a score by hand.
    AddScore {
        cabinet_id: String,
        score: String,
        /// Defaults to the configured owner initials.
        #[arg(long)]
        initials: Option<String>,
    },
    /// Delete a recorded score.
    RemoveScore {
        cabinet_id: String,
        initials: String,
        score: String,
    },
    /// Settle on a score from several recognized readings.
    Capture {
        #[arg(required = true)]
        readings: Vec<String>,
        /// Record the result for this table.
        #[arg(long)]
        table: Option<String>,
    },
    /// Time played per day.
    Activity {
        #[arg(long, default_value_t = 14, value_parser = clap::value_parser!(i64).range(0..))]
        days: i64,
    },
    /// Search the community table catalog.
    Catalog {
        query: String,
        /// Print preview image links.
        #[arg(long)]
        images: bool,
    },
}

#[derive(Args, Default)]
pub(crate) struct TableListing {
    /// Include disabled tables.
    #[arg(long)]
    all: bool,
    /// Only tables scored in the last three days.
    #[arg(long)]
    recent: bool,
    /// Only tables playable in this mode.
    #[arg(long, value_enum)]
    vr: Option<VrMode>,
    #[arg(long, value_enum, default_value_t = TableOrder::Name)]
    sort: TableOrder,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub(crate) enum VrMode {
    Full,
    Partial,
    Flat,
}

impl From<VrMode> for Vr {
    fn from(mode: VrMode) -> Self {
        match mode {
            VrMode::Full => Vr::Full,
            VrMode::Partial => Vr::Partial,
            VrMode::Flat => Vr::Flat,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum TableOrder {
    #[default]
    Name,
    Score,
    Status,
    Type,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ScanTarget {
    Tables,
    Scores,
    ResetScores,
    Leaderboard,
    Activity,
    Names,
    All,
}

pub(crate) async fn run(
    command: Command,
    config: &AppConfig,
    document: &mut ScoreboardDocument,
) -> Result<()> {
    match command {
        Command::Tables(listing) => list_tables(document.model(), config, &listing),
        Command::Show { cabinet_id } => show(document.model(), config, &cabinet_id)?,
        Command::Scan { target } => scan(target, config, document).await?,
        Command::Duplicates { all } => list_duplicates(document.model(), all),
        Command::Resolve { cabinet_id } => resolve(document, &cabinet_id)?,
        Command::AddScore {
            cabinet_id,
            score,
            initials,
        } => {
            let value =
                parse_recognized_score(&score).with_context(|| format!("not a score: {score}"))?;
            let initials = initials.unwrap_or_else(|| config.owner_initials.clone());
            add_score(document, &cabinet_id, Score::new(initials, value))?;
        }
        Command::RemoveScore {
            cabinet_id,
            initials,
            score,
        } => {
            let value =
                parse_recognized_score(&score).with_context(|| format!("not a score: {score}"))?;
            remove_score(document, &cabinet_id, Score::new(initials, value))?;
        }
        Command::Capture { readings, table } => {
            let mut stabilizer = ScoreStabilizer::new();
            for reading in &readings {
                stabilizer.observe_text(reading);
            }
            match stabilizer.suggestion() {
                Some(value) => {
                    println!("{}", group_digits(value));
                    if let Some(cabinet_id) = table {
                        let score = manual_score(&config.owner_initials, value);
                        add_score(document, &cabinet_id, score)?;
                    }
                }
                None => println!("no stable reading"),
            }
        }
        Command::Activity { days } => list_activity(document.model(), days)?,
        Command::Catalog { query, images } => {
            let catalog = TableCatalog::new(HttpCatalog::new(
                http_client(config.request_timeout())?,
                config.catalog_url.clone(),
            ));
            for entry in catalog.find(&query).await? {
                let installed = document.model().tables_with_web_id(&entry.id).count();
                let marker = if installed > 0 {
                    format!("  [{installed} installed]")
                } else {
                    String::new()
                };
                println!("{:<10} {}{marker}", entry.id, entry.title());
                if images {
                    if let Some(url) = entry.table_url() {
                        println!("           table      {url}");
                    }
                    if let Some(url) = entry.backglass_url() {
                        println!("           backglass  {url}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn select_tables(
    model: &ScoreModel,
    owner: &str,
    listing: &TableListing,
    now: DateTime<Utc>,
) -> Vec<TableSummary> {
    let recent = now - TimeDelta::days(RECENT_DAYS);
    let mut summaries = TableSummary::all(model, owner)
        .into_iter()
        .filter(|summary| listing.all || !summary.table.disabled)
        .filter(|summary| !listing.recent || summary.last_score_date.is_some_and(|d| d > recent))
        .filter(|summary| {
            listing
                .vr
                .map_or(true, |mode| summary.table.vr.matches(mode.into()))
        })
        .collect::<Vec<_>>();

    // stable sorts keep the name order within equal keys
    match listing.sort {
        TableOrder::Name => {}
        TableOrder::Score => summaries.sort_by(|a, b| b.score.cmp(&a.score)),
        TableOrder::Status => summaries.sort_by_key(|s| s.table.comparable_score_status()),
        TableOrder::Type => summaries.sort_by_key(|s| s.table.comparable_score_type()),
    }
    summaries
}

fn list_tables(model: &ScoreModel, config: &AppConfig, listing: &TableListing) {
    for summary in select_tables(model, &config.owner_initials, listing, Utc::now()) {
        let table = &summary.table;
        let rank = if summary.rank > 0 {
            format!("{}/{}", summary.rank, summary.rank_count)
        } else {
            "-".to_string()
        };
        let status = table
            .score_status
            .map(|status| status.to_string())
            .unwrap_or_default();
        println!(
            "{:>5}  {:>14}  {:>6}  {:<13}  {}{}",
            table.cabinet_id,
            group_digits(summary.score),
            rank,
            status,
            table.long_display_name(),
            if table.disabled { " (disabled)" } else { "" }
        );
    }
}

async fn scan(
    target: ScanTarget,
    config: &AppConfig,
    document: &mut ScoreboardDocument,
) -> Result<()> {
    if target == ScanTarget::ResetScores {
        let cleared = document.model_mut().reset_score_status();
        println!("cleared {cleared} score statuses");
        if cleared > 0 {
            document.mark_changed();
        }
        return Ok(());
    }

    let http = http_client(config.request_timeout())?;
    let cabinet = CabinetClient::new(http.clone(), config.studio_base_url());
    let leaderboard = LeaderboardClient::new(http.clone(), config.leaderboard_url.clone());

    let (sender, receiver) = mpsc::channel(64);
    let printer = tokio::spawn(print_events(receiver));
    let scanner =
        Scanner::new(cabinet, leaderboard, ScanOptions::from_config(config)).with_events(sender);

    let model = document.model_mut();
    let report: ScanReport = match target {
        ScanTarget::Tables => scanner.scan_tables(model).await?,
        ScanTarget::Scores => scanner.scan_scores(model).await,
        ScanTarget::Leaderboard => scanner.scan_leaderboard(model).await,
        ScanTarget::Activity => scanner.scan_activity(model).await?,
        ScanTarget::Names => {
            let catalog = TableCatalog::new(HttpCatalog::new(http, config.catalog_url.clone()));
            scanner.refresh_catalog_names(model, &catalog).await?
        }
        ScanTarget::All => scanner.scan_all(model).await?,
        ScanTarget::ResetScores => ScanReport::default(),
    };
    drop(scanner);
    printer.await?;

    println!(
        "{} checked, {} changes, {} failures",
        report.total,
        report.changes.len(),
        report.failures.len()
    );
    if report.changed() {
        document.mark_changed();
    }
    Ok(())
}

async fn print_events(mut receiver: mpsc::Receiver<ScanEvent>) {
    let mut progress_shown = false;
    while let Some(event) = receiver.recv().await {
        match event {
            ScanEvent::Progress { done, total } => {
                eprint!("\r{done}/{total}");
                progress_shown = true;
            }
            ScanEvent::Message(text) => {
                if progress_shown {
                    eprintln!();
                    progress_shown = false;
                }
                println!("{text}");
            }
        }
    }
    if progress_shown {
        eprintln!();
    }
}

fn list_duplicates(model: &ScoreModel, all: bool) {
    let groups = scoreboard_core::build_duplicates(model);
    for (score_id, group) in &groups {
        if !group.is_duplicated() {
            continue;
        }
        let disposition = group.disposition();
        if !all && !disposition.needs_work() {
            continue;
        }
        println!("{score_id}  {}", disposition_label(disposition));
        let primary = group.primary_table().map(|table| &table.cabinet_id);
        for table in group.tables() {
            let marker = if Some(&table.cabinet_id) == primary {
                "*"
            } else {
                " "
            };
            println!(
                "  {marker} {:>5}  {:<10}  {}{}",
                table.cabinet_id,
                table.web_id,
                table.long_display_name(),
                if table.disabled { " (disabled)" } else { "" }
            );
        }
    }
}

fn disposition_label(disposition: DuplicateDisposition) -> &'static str {
    match disposition {
        DuplicateDisposition::AllMatch => "same design",
        DuplicateDisposition::AllEnabledMatch => "same design (enabled)",
        DuplicateDisposition::AllDisabled => "all disabled",
        DuplicateDisposition::NeedsPrimary => "attributed",
        DuplicateDisposition::Mismatch => "needs a primary",
    }
}

fn show(model: &ScoreModel, config: &AppConfig, cabinet_id: &str) -> Result<()> {
    let table = find_table(model, cabinet_id)?;
    let cabinet = CabinetClient::new(
        http_client(config.request_timeout())?,
        config.studio_base_url(),
    );

    println!("{}", table.long_display_name());
    println!("  cabinet id  {}", table.cabinet_id);
    println!("  design      {} ({})", design_name(model, &table.web_id), table.web_id);
    println!("  score id    {}", table.score_id);
    println!("  type        {}", score_type_label(table.comparable_score_type()));
    println!("  status      {}", table.comparable_score_status());
    println!("  mode        {}", vr_label(table.vr));
    if table.disabled {
        println!("  disabled");
    }
    println!("  wheel       {}", cabinet.wheel_image_url(&table.cabinet_id));

    if let Some(owner) = model.representative(&table.score_id) {
        if owner.cabinet_id != table.cabinet_id {
            println!(
                "  scores shown under {} ({})",
                owner.long_display_name(),
                owner.cabinet_id
            );
        }
    }
    if model.has_misconfigured_scores(&table) {
        println!("  scores belong to another design; see `duplicates`");
    }

    let scoreboard = model.scoreboard_for(&table);
    if scoreboard.is_empty() {
        println!("no scores");
    }
    for (index, score) in scoreboard.entries().iter().enumerate() {
        let marker = if score.is_local(&config.owner_initials) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker}{:>3}  {:<4} {:>14}  {}",
            index + 1,
            score.initials,
            group_digits(score.score),
            score.date.with_timezone(&Local).format("%Y-%m-%d")
        );
    }
    Ok(())
}

fn score_type_label(kind: HighScoreType) -> &'static str {
    match kind {
        HighScoreType::NvRam => "NVRam",
        HighScoreType::Em => "EM",
        HighScoreType::VpReg => "VPReg",
        HighScoreType::Na => "N/A",
    }
}

fn vr_label(vr: Vr) -> &'static str {
    match vr {
        Vr::Full => "VR",
        Vr::Partial => "VR capable",
        Vr::Flat => "flat",
    }
}

fn find_table(model: &ScoreModel, cabinet_id: &str) -> Result<Table> {
    let id = CabinetId::new(cabinet_id);
    model
        .table(&id)
        .cloned()
        .with_context(|| format!("no table with cabinet id {id}"))
}

fn resolve(document: &mut ScoreboardDocument, cabinet_id: &str) -> Result<()> {
    let table = find_table(document.model(), cabinet_id)?;
    document.model_mut().set_scores_web_id(&table);
    document.mark_changed();

    let group = scoreboard_core::duplicates_for(document.model(), &table.score_id);
    println!(
        "{} now holds the scores for {} ({})",
        table.long_display_name(),
        table.score_id,
        disposition_label(group.disposition())
    );
    Ok(())
}

fn add_score(document: &mut ScoreboardDocument, cabinet_id: &str, score: Score) -> Result<()> {
    let table = find_table(document.model(), cabinet_id)?;
    let line = format!("{} {}", score.initials, group_digits(score.score));
    if document.model_mut().record_score(&table, score) {
        document.mark_changed();
        println!("{}: added {line}", table.long_display_name());
    } else {
        println!("{}: {line} already recorded", table.long_display_name());
    }
    Ok(())
}

fn remove_score(document: &mut ScoreboardDocument, cabinet_id: &str, score: Score) -> Result<()> {
    let table = find_table(document.model(), cabinet_id)?;
    let line = format!("{} {}", score.initials, group_digits(score.score));
    if document.model_mut().remove_score(&table, &score) {
        document.mark_changed();
        println!("{}: removed {line}", table.long_display_name());
    } else {
        println!("{}: no score {line}", table.long_display_name());
    }
    Ok(())
}

fn activity_range(now: DateTime<Utc>, days: i64) -> Result<(Day, Day)> {
    let from = TimeDelta::try_days(days)
        .and_then(|span| now.checked_sub_signed(span))
        .with_context(|| format!("--days {days} is out of range"))?;
    Ok((Day::from_datetime(from), Day::from_datetime(now)))
}

fn list_activity(model: &ScoreModel, days: i64) -> Result<()> {
    let (from, to) = activity_range(Utc::now(), days)?;

    let mut total = Seconds(0);
    for record in model.activity().days_between(from, to) {
        println!(
            "{}  {:>12}  {} tables",
            record.date_code,
            record.total().to_string(),
            record.tables_played
        );
        for (web_id, play) in &record.plays {
            println!(
                "    {:>12}  {}",
                Seconds(play.time_played_secs).to_string(),
                design_name(model, web_id)
            );
        }
        total = total + record.total();
    }
    println!("total {total}");
    Ok(())
}

fn design_name(model: &ScoreModel, web_id: &WebTableId) -> String {
    if let Some(info) = model.table_info(web_id) {
        return info.name.clone();
    }
    model
        .tables_with_web_id(web_id)
        .next()
        .map(|table| table.name.clone())
        .unwrap_or_else(|| web_id.to_string())
}

fn group_digits(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, digit) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if value < 0 {
        grouped.insert(0, '-');
    }
    grouped
}

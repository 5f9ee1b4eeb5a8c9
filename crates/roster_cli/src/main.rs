//! Roster CLI.
//!
//! # Responsibility
//! - Open a roster database, optionally seed it, and print one page of
//!   members as the JSON page envelope.
//! - Keep output deterministic so it can be diffed in scripts.

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use roster_core::{
    init_logging, open_db_with_config, with_session, CoreConfig, MemberService,
    SqliteMemberRepository,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "roster")]
#[command(about = "Lists roster members page by page")]
struct Cli {
    /// SQLite database file; created and migrated when missing.
    #[arg(long)]
    db: PathBuf,
    /// JSON configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Absolute directory for rolling log files.
    #[arg(long)]
    log_dir: Option<String>,
    /// Insert `user0..user{N-1}` before listing.
    #[arg(long)]
    seed: Option<u32>,
    #[arg(long)]
    page: Option<u32>,
    #[arg(long)]
    size: Option<u32>,
    /// Sort as `property[,asc|desc]`.
    #[arg(long)]
    sort: Option<String>,
    /// Print member DTOs with team names instead of members.
    #[arg(long)]
    dto: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => CoreConfig::from_file(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => CoreConfig::default(),
    };

    let log_dir = cli.log_dir.as_deref().or(config.logging.dir.as_deref());
    if let Some(dir) = log_dir {
        init_logging(&config.logging.level, dir).context("Failed to initialize logging")?;
    }

    let mut conn = open_db_with_config(&cli.db, &config.database)
        .with_context(|| format!("Failed to open database '{}'", cli.db.display()))?;

    let output = with_session(&mut conn, config.session, |session| {
        let repo = SqliteMemberRepository::new(session);
        let mut service = MemberService::new(repo, config.paging.clone());
        if let Some(count) = cli.seed {
            service.seed_members(count)?;
        }

        let sort = cli.sort.as_deref();
        let json = if cli.dto {
            let request = service.dto_page_request(cli.page, cli.size, sort)?;
            serde_json::to_string_pretty(&service.list_member_dtos(&request)?)
        } else {
            let request = service.page_request(cli.page, cli.size, sort)?;
            serde_json::to_string_pretty(&service.list_members(&request)?)
        };
        Ok(json)
    })
    .context("Failed to list members")?
    .context("Failed to encode page")?;

    info!("event=cli_list module=cli status=ok dto={}", cli.dto);
    println!("{output}");
    Ok(())
}

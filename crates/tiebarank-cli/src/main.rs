use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{error, info, warn};

use tiebarank_core::auth::{HmacTokens, TokenIssuer};
use tiebarank_core::{Divider, RankConfig, RankRequest, Result};
use tiebarank_service::RankService;

#[derive(Parser, Debug)]
#[command(name = "tiebarank", version, about = "Community leaderboard crawler")]
struct Args {
    /// Config file. Falls back to TIEBARANK_CONFIG, then ~/.tiebarank/tiebarank.toml.
    #[arg(long, env = "TIEBARANK_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show one leaderboard page.
    Page {
        #[arg(default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },
    /// Crawl a range of ranking pages into the store.
    Crawl {
        #[arg(long, default_value_t = 1)]
        from: u32,
        #[arg(long)]
        to: u32,
    },
    /// Resolve the boundary rank for a level, as a peer shard would ask.
    Resolve {
        #[arg(long)]
        level: u32,
        /// Previous boundary; the scan starts from its page.
        #[arg(long, default_value_t = 1)]
        estimate: u64,
    },
    /// Per-level ranks and their change since the previous day.
    Distribution {
        /// YYYY-MM-DD on the site's clock; defaults to today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List tracked level boundaries, or seed one with --level and --rank.
    Dividers {
        #[arg(long, requires = "rank")]
        level: Option<u32>,
        #[arg(long, requires = "level")]
        rank: Option<u64>,
    },
    /// Freeze today's level map as a daily snapshot.
    Snapshot {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Search stored members by name or nickname.
    Search { keyword: String },
    /// Follower and post counters.
    Totals,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tiebarank=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = RankConfig::load(args.config.as_deref()).unwrap_or_else(|e| {
        warn!("Config load failed ({}), using defaults", e);
        RankConfig::default()
    });

    // the service owns the store connection and cache; both close when it drops
    let service = RankService::from_config(config)?;
    if let Err(e) = run(&service, args.cmd).await {
        error!(code = e.code(), transient = e.is_transient(), error = %e, "command failed");
        print(&serde_json::json!({ "error": e.code(), "message": e.to_string() }))?;
        drop(service);
        std::process::exit(1);
    }
    info!("done");
    Ok(())
}

async fn run(service: &RankService, cmd: Command) -> Result<()> {
    match cmd {
        Command::Page { page, page_size } => print(&service.list_page(page, page_size).await?),
        Command::Crawl { from, to } => {
            let stored = service.crawl_members(from..=to).await?;
            print(&serde_json::json!({ "stored": stored }))
        }
        Command::Resolve { level, estimate } => {
            // sign locally so the request passes the same check a peer's would
            let tokens = HmacTokens::new(&service.config().auth.secret);
            let request = RankRequest {
                token: tokens.issue(&estimate.to_string()),
                rank: estimate,
                level,
            };
            print(&service.resolve_boundary(request).await?)
        }
        Command::Distribution { date } => {
            let date = date.unwrap_or_else(|| service.today());
            print(&service.daily_distribution(date).await?)
        }
        Command::Dividers { level, rank } => {
            if let (Some(level), Some(rank)) = (level, rank) {
                service.seed_divider(Divider { level, rank })?;
            }
            print(&service.dividers()?)
        }
        Command::Snapshot { date } => {
            let date = date.unwrap_or_else(|| service.today());
            let captured = service.capture_snapshot(date).await?;
            print(&serde_json::json!({ "date": date, "captured": captured }))
        }
        Command::Search { keyword } => print(&service.search_members(&keyword).await?),
        Command::Totals => print(&service.community_totals().await?),
    }
}

fn print<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_distribution_date() {
        let args = Args::parse_from(["tiebarank", "distribution", "--date", "2024-03-01"]);
        match args.cmd {
            Command::Distribution { date } => {
                assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn dividers_seed_needs_both_flags() {
        let args = Args::parse_from(["tiebarank", "dividers", "--level", "12", "--rank", "40"]);
        assert!(matches!(
            args.cmd,
            Command::Dividers { level: Some(12), rank: Some(40) }
        ));
        assert!(Args::try_parse_from(["tiebarank", "dividers", "--level", "12"]).is_err());
        let list = Args::parse_from(["tiebarank", "dividers"]);
        assert!(matches!(list.cmd, Command::Dividers { level: None, rank: None }));
    }

    #[test]
    fn page_defaults() {
        let args = Args::parse_from(["tiebarank", "page"]);
        assert!(matches!(args.cmd, Command::Page { page: 1, page_size: 20 }));
    }
}

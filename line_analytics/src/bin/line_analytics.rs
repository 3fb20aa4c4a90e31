use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use line_analytics::{
    config::{AnalyticsConfig, load_config_path},
    db::connection::connect_mysql,
    metadata::{MetadataRegistry, TenantId},
    partition::{FactTable, PartitionManager},
    spec::LineId,
};

#[derive(Parser)]
#[command(version, about = "Line analytics maintenance CLI")]
struct Cli {
    /// Config file; defaults to $LINE_ANALYTICS_CONFIG, then built-in defaults.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<String>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    Partitions(PartitionsCmd),
    Cache(CacheCmd),
}

#[derive(Args)]
struct PartitionsCmd {
    #[command(subcommand)]
    sub: PartitionsSub,
}

#[derive(Args)]
struct Target {
    #[arg(long)]
    line: i64,
    #[arg(long, value_enum, default_value_t = Kind::All)]
    kind: Kind,
}

#[derive(Subcommand)]
enum PartitionsSub {
    /// Create the line's fact tables with monthly partitions.
    Create {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        months_ahead: Option<u32>,
        /// First partition month (any day in it); defaults to this month.
        #[arg(long, value_name = "YYYY-MM-DD")]
        start: Option<NaiveDate>,
    },
    /// Add partitions so the configured number of months ahead exists.
    Extend {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        months_ahead: Option<u32>,
    },
    /// Drop partitions older than the retention window.
    Prune {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        keep: Option<u32>,
    },
    /// Print partitions with row estimates.
    List {
        #[command(flatten)]
        target: Target,
    },
}

#[derive(Args)]
struct CacheCmd {
    #[command(subcommand)]
    sub: CacheSub,
}

#[derive(Subcommand)]
enum CacheSub {
    /// Load reference data once and print cache counts.
    Stats {
        #[arg(long, default_value = "default")]
        tenant: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Detections,
    Downtime,
    All,
}

impl Kind {
    fn tables(self) -> &'static [FactTable] {
        match self {
            Kind::Detections => &[FactTable::Detections],
            Kind::Downtime => &[FactTable::Downtime],
            Kind::All => &FactTable::ALL,
        }
    }
}

fn load_config(path: Option<String>) -> Result<AnalyticsConfig> {
    match path.or_else(|| shared_utils::env::optional_env_var("LINE_ANALYTICS_CONFIG")) {
        Some(p) => load_config_path(&p),
        None => Ok(AnalyticsConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config)?;
    let url = cfg.database_url()?;
    let mut conn = connect_mysql(&url)
        .await
        .context("connect to MySQL")?;
    let manager = PartitionManager::new();

    match cli.cmd {
        Cmd::Partitions(PartitionsCmd { sub }) => match sub {
            PartitionsSub::Create {
                target,
                months_ahead,
                start,
            } => {
                let line = LineId::new(target.line)?;
                let months = months_ahead.unwrap_or(cfg.partitions.months_ahead);
                for fact in target.kind.tables() {
                    let created = manager
                        .create_table_with_partitions(&mut conn, *fact, line, start, months)
                        .await?;
                    let table = fact.table_name(line);
                    if created {
                        println!("{table}: created with {months} monthly partitions");
                    } else {
                        println!("{table}: already exists");
                    }
                }
            }
            PartitionsSub::Extend {
                target,
                months_ahead,
            } => {
                let line = LineId::new(target.line)?;
                let months = months_ahead.unwrap_or(cfg.partitions.months_ahead);
                for fact in target.kind.tables() {
                    let table = fact.table_name(line);
                    let added = manager
                        .ensure_partitions_ahead(&mut conn, &table, months)
                        .await?;
                    println!("{table}: added {added} partitions");
                }
            }
            PartitionsSub::Prune { target, keep } => {
                let line = LineId::new(target.line)?;
                let keep = keep.unwrap_or(cfg.partitions.months_to_keep);
                for fact in target.kind.tables() {
                    let table = fact.table_name(line);
                    let dropped = manager.drop_old_partitions(&mut conn, &table, keep).await?;
                    println!("{table}: dropped {dropped} partitions");
                }
            }
            PartitionsSub::List { target } => {
                let line = LineId::new(target.line)?;
                for fact in target.kind.tables() {
                    let table = fact.table_name(line);
                    println!("{table}");
                    for p in manager.get_existing_partitions(&mut conn, &table).await? {
                        println!(
                            "  {:<8} < {:<10} ~{} rows",
                            p.name,
                            p.description.as_deref().unwrap_or("?"),
                            p.row_estimate
                        );
                    }
                }
            }
        },
        Cmd::Cache(CacheCmd {
            sub: CacheSub::Stats { tenant },
        }) => {
            let registry = MetadataRegistry::new(cfg.cache.ttl());
            let cache = registry
                .get_or_create(&TenantId::new(tenant), &mut conn)
                .await?;
            let s = cache.stats();
            println!(
                "tenant {} v{}: {} lines, {} areas, {} products, {} filters, {} shifts",
                s.tenant, s.version, s.lines, s.areas, s.products, s.filters, s.shifts
            );
        }
    }

    Ok(())
}

use clap::{Parser, Subcommand};
use shared_dedupe_rs::{
    Category, CategoryRegistry, DedupeFacade, DedupeSettings,
    ExactFingerprintSet, FixedClock, ProgressCounters, RedisStore,
    SessionRecord, SessionStore, StoreHandle, common::bits2hr, compose,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Redis URL (defaults to REDIS_URL from the environment)
    #[arg(long, global = true)]
    redis_url: Option<String>,

    /// Day bucket to use instead of today's date (YYYY-MM-DD)
    #[arg(long, global = true)]
    day: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an item was already processed
    Exists {
        /// goods, post, user, img or attach
        category: Category,
        source: String,
        /// Category fields, e.g. `<url> <timestamp>` for posts
        fields: Vec<String>,
    },

    /// Mark an item as processed
    Add {
        category: Category,
        source: String,
        fields: Vec<String>,
    },

    /// Print the fingerprint of raw fields
    Fingerprint {
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// Read or write a source's cookies
    Cookie {
        #[command(subcommand)]
        operation: CookieCommands,
    },

    /// Read or write a site's page counters
    Pages {
        #[command(subcommand)]
        operation: PagesCommands,
    },

    /// Remove a fingerprint from a source's dupefilter so it is crawled again
    Forget { source: String, fingerprint: String },

    /// Display filter parameters
    Info {
        /// Estimate the false positive rate after this many inserts
        #[arg(short, long, default_value = "1000000")]
        items: usize,
    },
}

#[derive(Subcommand)]
enum CookieCommands {
    Get {
        source: String,
    },
    Set {
        source: String,
        /// JSON object of cookie name to value
        json: String,
        /// Expiry in seconds; 0 or less keeps the cookies until overwritten
        #[arg(long, default_value = "0", allow_negative_numbers = true)]
        ttl: i64,
    },
}

#[derive(Subcommand)]
enum PagesCommands {
    Get {
        site: String,
    },
    Set {
        site: String,
        #[arg(long)]
        total: Option<u64>,
        #[arg(long)]
        crawled: Option<u64>,
    },
    /// Atomically add to the crawled counter
    Incr {
        site: String,
        #[arg(default_value = "1", allow_negative_numbers = true)]
        delta: i64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let mut settings = DedupeSettings::from_env()?;
    if let Some(url) = cli.redis_url {
        settings.redis_url = url;
    }

    let store: StoreHandle =
        RedisStore::new(&settings.redis_url)?.into_handle();

    match cli.command {
        Commands::Exists {
            category,
            source,
            fields,
        } => {
            let facade = facade(&store, &settings, cli.day)?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            let seen = facade.exists(category, &source, &fields)?;
            println!("{}", if seen { "seen" } else { "new" });
        }
        Commands::Add {
            category,
            source,
            fields,
        } => {
            let facade = facade(&store, &settings, cli.day)?;
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            facade.add(category, &source, &fields)?;
            println!(
                "added {}",
                facade.fingerprint(category, &source, &fields)?
            );
        }
        Commands::Fingerprint { fields } => {
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            println!("{}", compose(&fields)?);
        }
        Commands::Cookie { operation } => {
            let sessions = SessionStore::new(store);
            match operation {
                CookieCommands::Get { source } => {
                    let record = sessions.get(&source)?;
                    println!("{}", serde_json::to_string_pretty(&record)?);
                }
                CookieCommands::Set { source, json, ttl } => {
                    let record: SessionRecord = serde_json::from_str(&json)?;
                    sessions.try_set(&source, &record, ttl)?;
                    println!("stored {} cookie(s) for {source}", record.len());
                }
            }
        }
        Commands::Pages { operation } => {
            let counters = ProgressCounters::new(store);
            match operation {
                PagesCommands::Get { site } => {
                    let show = |v: Option<u64>| {
                        v.map_or_else(|| "-".to_string(), |n| n.to_string())
                    };
                    println!("total:   {}", show(counters.get_total(&site)?));
                    println!("crawled: {}", show(counters.get_crawled(&site)?));
                }
                PagesCommands::Set {
                    site,
                    total,
                    crawled,
                } => {
                    if let Some(total) = total {
                        counters.set_total(&site, total)?;
                    }
                    if let Some(crawled) = crawled {
                        counters.set_crawled(&site, crawled)?;
                    }
                }
                PagesCommands::Incr { site, delta } => {
                    let crawled = counters.incr_crawled(&site, delta)?;
                    println!("crawled: {crawled}");
                }
            }
        }
        Commands::Forget {
            source,
            fingerprint,
        } => {
            let set = ExactFingerprintSet::new(store);
            if set.remove(&source, &fingerprint)? {
                println!("removed {fingerprint} from {source}");
            } else {
                println!("{fingerprint} was not in {source}");
            }
        }
        Commands::Info { items } => {
            let registry =
                CategoryRegistry::new(store, settings.registry_config()?)?;
            println!("Redis: {}", settings.redis_url);
            for category in Category::ALL {
                let filter = registry.filter(category);
                println!(
                    "{:<8} {:<22} m={:<12} k={:<3} size={:<10} fpr@{}={:.6}",
                    category.as_str(),
                    filter.name(),
                    filter.bit_size(),
                    filter.num_hashes(),
                    bits2hr(filter.bit_size()),
                    items,
                    filter.estimated_false_positive_rate(items),
                );
            }
        }
    }

    Ok(())
}

fn facade(
    store: &StoreHandle,
    settings: &DedupeSettings,
    day: Option<String>,
) -> shared_dedupe_rs::Result<DedupeFacade> {
    let registry = Arc::new(CategoryRegistry::new(
        store.clone(),
        settings.registry_config()?,
    )?);
    Ok(match day {
        Some(day) => {
            DedupeFacade::with_clock(registry, Arc::new(FixedClock::new(day)))
        }
        None => DedupeFacade::new(registry),
    })
}

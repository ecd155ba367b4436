use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use shop_rater::{
    load_listings, parse_query_field, response_rate_from_percent, train_rating_model,
    PipelineConfig, PredictionQuery,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Estimate the star rating a new listing would get in a product category.
#[derive(Parser, Debug)]
#[command(name = "shop-rater", version, about)]
struct Cli {
    /// CSV export of listing records
    #[arg(long, env = "SHOP_RATER_DATA")]
    data: PathBuf,

    /// Product category to train on (all rows when omitted)
    #[arg(long)]
    category: Option<String>,

    /// TOML file with pipeline settings
    #[arg(long, env = "SHOP_RATER_CONFIG")]
    config: Option<PathBuf>,

    /// Seed for the split and the forest
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trees in the forest
    #[arg(long)]
    trees: Option<usize>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Minimum price (RM)
    #[arg(long, default_value = "10", value_parser = non_negative("price-min"))]
    price_min: f64,

    /// Maximum price (RM)
    #[arg(long, default_value = "50", value_parser = non_negative("price-max"))]
    price_max: f64,

    /// Stock sold
    #[arg(long, default_value = "100", value_parser = non_negative("sold"))]
    sold: f64,

    /// Item ratings
    #[arg(long, default_value = "100", value_parser = non_negative("ratings"))]
    ratings: f64,

    /// Seller ratings
    #[arg(long, default_value = "100", value_parser = non_negative("seller-ratings"))]
    seller_ratings: f64,

    /// Seller response rate (%)
    #[arg(long, default_value = "90", value_parser = non_negative("response-rate"))]
    response_rate: f64,

    /// Followers
    #[arg(long, default_value = "5", value_parser = non_negative("followers"))]
    followers: f64,
}

fn non_negative(field: &'static str) -> impl Fn(&str) -> Result<f64, String> + Clone {
    move |text| parse_query_field(field, text).map_err(|e| e.to_string())
}

/// The listing to rate, checked before any training work starts.
fn listing_query(cli: &Cli) -> shop_rater::Result<PredictionQuery> {
    let query = PredictionQuery {
        price_min: cli.price_min,
        price_max: cli.price_max,
        sold: cli.sold,
        ratings: cli.ratings,
        seller_ratings: cli.seller_ratings,
        response_rate: response_rate_from_percent(cli.response_rate),
        followers: cli.followers,
    };
    query.validate()?;
    Ok(query)
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("shop_rater={}", level.to_lowercase())));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// Training and rating entry point
// Steps
// 1. Load the listing export for one category
// 2. Train and score the forest
// 3. Rate the listing described on the command line
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    debug!("shop-rater v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config.seed = seed;
    }
    if let Some(trees) = cli.trees {
        config.forest.n_estimators = trees;
    }

    let query = listing_query(&cli).context("checking listing inputs")?;

    // 1. Load the listing export
    let df = load_listings(&cli.data, cli.category.as_deref())
        .with_context(|| format!("loading listings from {}", cli.data.display()))?;

    // 2. Train the model and report held-out accuracy
    let rater = train_rating_model(df, &config).context("training rating model")?;
    println!("Prediction accuracy: {}%", rater.accuracy_percent());

    // 3. Rate the hypothetical listing
    let estimate = rater.estimate(&query).context("estimating rating")?;
    println!("Item rating estimate (Stars): {}", estimate.rounded());

    Ok(())
}

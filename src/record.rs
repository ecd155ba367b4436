//! Listing records, their column schema, and the CSV loader that stands in for
//! the upstream record store.

use std::fmt;
use std::path::Path;

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{RaterError, Result};

/// A field of a listing record, named the way the store exports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Category,
    Label,
    Stars,
    Ratings,
    Sold,
    PriceMin,
    PriceMax,
    Stock,
    Seller,
    SellerRatings,
    Products,
    ResponseRate,
    ResponseTime,
    Joined,
    Followers,
    Url,
}

impl Column {
    /// Column header in the listing export
    pub const fn header(self) -> &'static str {
        match self {
            Column::Category => "Category",
            Column::Label => "Label",
            Column::Stars => "Stars",
            Column::Ratings => "Ratings",
            Column::Sold => "Sold",
            Column::PriceMin => "PriceMin",
            Column::PriceMax => "PriceMax",
            Column::Stock => "Stock",
            Column::Seller => "Seller",
            Column::SellerRatings => "SellerRatings",
            Column::Products => "Products",
            Column::ResponseRate => "ResponseRate",
            Column::ResponseTime => "ResponseTime",
            Column::Joined => "Joined",
            Column::Followers => "Followers",
            Column::Url => "URL",
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}

/// Numeric columns kept by projection, in matrix order. The target comes first.
///
/// Stock and Products take part in each row's norm but are never model inputs.
pub const NUMERIC_COLUMNS: [Column; 10] = [
    Column::Stars,
    Column::Ratings,
    Column::Sold,
    Column::PriceMin,
    Column::PriceMax,
    Column::Stock,
    Column::SellerRatings,
    Column::Products,
    Column::ResponseRate,
    Column::Followers,
];

/// Identifier, text and categorical columns discarded by projection.
pub const IDENTIFIER_COLUMNS: [Column; 6] = [
    Column::Category,
    Column::Label,
    Column::Seller,
    Column::ResponseTime,
    Column::Joined,
    Column::Url,
];

/// Model input columns, in the order the regressor sees them.
pub const FEATURE_COLUMNS: [Column; 7] = [
    Column::Ratings,
    Column::Sold,
    Column::PriceMin,
    Column::PriceMax,
    Column::SellerRatings,
    Column::ResponseRate,
    Column::Followers,
];

/// The value being predicted.
pub const TARGET_COLUMN: Column = Column::Stars;

/// Product categories mined from the store.
pub const CATEGORIES: [&str; 24] = [
    "Automotive",
    "Baby & Toys",
    "Cameras & Drones",
    "Computer & Accessories",
    "Fashion Accessories",
    "Games, Books & Hobbies",
    "Gaming & Consoles",
    "Groceries & Pets",
    "Health & Beauty",
    "Home Appliances",
    "Home & Living",
    "Men's Bags & Wallets",
    "Men's Clothing",
    "Men's Shoes",
    "Mobile & Gadgets",
    "Muslim Fashion",
    "Sports & Outdoor",
    "Tickets & Vouchers",
    "Travel & Luggage",
    "Watches",
    "Women's Bags",
    "Women's Clothing",
    "Women's Shoes",
    "Others",
];

pub fn known_categories() -> &'static [&'static str] {
    &CATEGORIES
}

/// One listing as exported by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub category: String,
    pub label: String,
    pub stars: f64,
    pub ratings: i64,
    pub sold: i64,
    pub price_min: f64,
    pub price_max: f64,
    pub stock: i64,
    pub seller: String,
    pub seller_ratings: i64,
    pub products: i64,
    /// Fraction in [0, 1]
    pub response_rate: f64,
    pub response_time: String,
    pub joined: String,
    pub followers: i64,
    pub url: String,
}

/// Build a listing frame with the export's headers from in-memory records.
pub fn records_to_frame(records: &[RawRecord]) -> Result<DataFrame> {
    let text = |f: fn(&RawRecord) -> &str| records.iter().map(f).collect::<Vec<&str>>();
    let int = |f: fn(&RawRecord) -> i64| records.iter().map(f).collect::<Vec<i64>>();
    let float = |f: fn(&RawRecord) -> f64| records.iter().map(f).collect::<Vec<f64>>();

    let columns = vec![
        Series::new(Column::Category.header(), text(|r| &r.category)),
        Series::new(Column::Label.header(), text(|r| &r.label)),
        Series::new(Column::Stars.header(), float(|r| r.stars)),
        Series::new(Column::Ratings.header(), int(|r| r.ratings)),
        Series::new(Column::Sold.header(), int(|r| r.sold)),
        Series::new(Column::PriceMin.header(), float(|r| r.price_min)),
        Series::new(Column::PriceMax.header(), float(|r| r.price_max)),
        Series::new(Column::Stock.header(), int(|r| r.stock)),
        Series::new(Column::Seller.header(), text(|r| &r.seller)),
        Series::new(Column::SellerRatings.header(), int(|r| r.seller_ratings)),
        Series::new(Column::Products.header(), int(|r| r.products)),
        Series::new(Column::ResponseRate.header(), float(|r| r.response_rate)),
        Series::new(Column::ResponseTime.header(), text(|r| &r.response_time)),
        Series::new(Column::Joined.header(), text(|r| &r.joined)),
        Series::new(Column::Followers.header(), int(|r| r.followers)),
        Series::new(Column::Url.header(), text(|r| &r.url)),
    ];

    Ok(DataFrame::new(columns)?)
}

/// Load a listing export, keep one category, and drop rows with missing
/// numeric values.
pub fn load_listings(path: impl AsRef<Path>, category: Option<&str>) -> Result<DataFrame> {
    let path = path.as_ref();
    let df = CsvReader::from_path(path)?.has_header(true).finish()?;

    info!(
        rows = df.height(),
        columns = df.width(),
        path = %path.display(),
        "Loaded listing export"
    );

    let df = match category {
        Some(category) => filter_category(df, category)?,
        None => df,
    };

    drop_incomplete_rows(df)
}

fn filter_category(df: DataFrame, category: &str) -> Result<DataFrame> {
    if !CATEGORIES.contains(&category) {
        warn!(category, "Category is not one of the known store categories");
    }

    if df.column(Column::Category.header()).is_err() {
        return Err(RaterError::schema(
            "loading",
            format!("missing column '{}'", Column::Category),
        ));
    }

    let filtered = df
        .lazy()
        .filter(col(Column::Category.header()).eq(lit(category)))
        .collect()?;

    info!(category, rows = filtered.height(), "Filtered listings by category");
    Ok(filtered)
}

// Missing numeric columns are left for projection to report.
fn drop_incomplete_rows(df: DataFrame) -> Result<DataFrame> {
    let present: Vec<&str> = NUMERIC_COLUMNS
        .iter()
        .map(|c| c.header())
        .filter(|name| df.column(name).is_ok())
        .collect();

    let before = df.height();
    let mut with_nulls = Vec::new();
    for name in &present {
        let nulls = df.column(name)?.null_count();
        if nulls > 0 {
            warn!(column = *name, nulls, rows = before, "Listings missing a value");
            with_nulls.push((*name, nulls));
        }
    }

    let df = df.drop_nulls(Some(present.as_slice()))?;

    if df.height() < before {
        info!(dropped = before - df.height(), "Dropped listings with missing values");
    }

    if before > 0 && df.height() == 0 {
        let all_null: Vec<&str> = with_nulls
            .iter()
            .filter(|(_, nulls)| *nulls == before)
            .map(|(name, _)| *name)
            .collect();
        let culprits = if all_null.is_empty() {
            with_nulls.iter().map(|(name, _)| *name).collect()
        } else {
            all_null
        };
        return Err(RaterError::schema(
            "loading",
            format!(
                "every listing is missing a value in {}",
                culprits.join(", ")
            ),
        ));
    }

    Ok(df)
}

#[cfg(test)]
pub(crate) fn sample_record(stars: f64) -> RawRecord {
    RawRecord {
        category: "Watches".to_string(),
        label: "Steel watch".to_string(),
        stars,
        ratings: 10,
        sold: 100,
        price_min: 10.0,
        price_max: 50.0,
        stock: 1000,
        seller: "acme".to_string(),
        seller_ratings: 100,
        products: 250,
        response_rate: 0.9,
        response_time: "within hours".to_string(),
        joined: "2019-03-01".to_string(),
        followers: 5,
        url: "https://shop.example/item/1".to_string(),
    }
}

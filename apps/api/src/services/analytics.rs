use crate::error::{ApiError, Result};
use crate::models::{parse_price, AnalyticsResponse, PriceStats, RankedCounts};
use crate::services::lifecycle::ServiceStatus;
use ndarray::Array1;
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

pub const TOP_N: usize = 10;

#[derive(Debug, Clone, Default)]
struct DatasetRow {
    brand: Option<String>,
    category: Option<String>,
    price: Option<f64>,
}

/// Read-only product table used for analytics.
#[derive(Debug, Clone, Default)]
pub struct ProductDataset {
    rows: Vec<DatasetRow>,
    has_categories: bool,
}

impl ProductDataset {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            ApiError::DatasetError(format!("Cannot open {}: {}", path.display(), e))
        })?;
        Self::from_reader(file)
    }

    /// Parse CSV with a header row. `brand` and `price` columns are
    /// required, `categories` is optional.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let column = |name: &str| headers.iter().position(|h| h == name);

        let brand_idx = column("brand")
            .ok_or_else(|| ApiError::DatasetError("Dataset has no 'brand' column".to_string()))?;
        let price_idx = column("price")
            .ok_or_else(|| ApiError::DatasetError("Dataset has no 'price' column".to_string()))?;
        let category_idx = column("categories");

        let mut rows = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            let field = |idx: usize| {
                record
                    .get(idx)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };

            rows.push(DatasetRow {
                brand: field(brand_idx),
                category: category_idx.and_then(field),
                price: record.get(price_idx).and_then(parse_price),
            });
        }

        debug!(
            "Parsed {} dataset rows (categories column: {})",
            rows.len(),
            category_idx.is_some()
        );

        Ok(Self {
            rows,
            has_categories: category_idx.is_some(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn snapshot(&self) -> AnalyticsResponse {
        let top_categories = if self.has_categories {
            top_counts(self.rows.iter().filter_map(|r| r.category.as_deref()), TOP_N)
        } else {
            RankedCounts::default()
        };

        let prices: Vec<f64> = self.rows.iter().filter_map(|r| r.price).collect();

        AnalyticsResponse {
            total_products: self.rows.len(),
            top_brands: top_counts(self.rows.iter().filter_map(|r| r.brand.as_deref()), TOP_N),
            top_categories,
            price_stats: price_stats(&prices),
        }
    }
}

/// Most frequent values, ties in first-seen order.
pub fn top_counts<'a>(values: impl Iterator<Item = &'a str>, limit: usize) -> RankedCounts {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<(&str, usize)> = Vec::new();

    for value in values {
        match positions.get(value) {
            Some(&idx) => counts[idx].1 += 1,
            None => {
                positions.insert(value, counts.len());
                counts.push((value, 1));
            }
        }
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.truncate(limit);

    RankedCounts(
        counts
            .into_iter()
            .map(|(value, count)| (value.to_string(), count))
            .collect(),
    )
}

/// Standard deviation uses the sample divisor (n - 1); it is 0 for fewer
/// than two prices. An empty series yields all zeros.
pub fn price_stats(prices: &[f64]) -> PriceStats {
    if prices.is_empty() {
        return PriceStats::default();
    }

    let values = Array1::from(prices.to_vec());
    let min = values.fold(f64::INFINITY, |acc, &p| acc.min(p));
    let max = values.fold(f64::NEG_INFINITY, |acc, &p| acc.max(p));
    // Summation error can push the mean of identical values just past them.
    let mean = values.mean().unwrap_or(0.0).clamp(min, max);
    let std = if values.len() > 1 { values.std(1.0) } else { 0.0 };

    let mut sorted = prices.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };

    PriceStats {
        min,
        max,
        mean,
        median,
        std,
    }
}

#[derive(Clone)]
pub struct AnalyticsService {
    dataset: ServiceStatus<Arc<ProductDataset>>,
}

impl AnalyticsService {
    pub fn new(dataset: ServiceStatus<Arc<ProductDataset>>) -> Self {
        Self { dataset }
    }

    pub fn dataset_loaded(&self) -> bool {
        self.dataset.is_ready()
    }

    pub fn analytics(&self) -> Result<AnalyticsResponse> {
        let dataset = self.dataset.ready().ok_or_else(|| {
            ApiError::ServiceUnavailable("Dataset not loaded. Check server logs.".to_string())
        })?;
        Ok(dataset.snapshot())
    }
}

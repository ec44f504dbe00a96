use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use moka::future::Cache;
use once_cell::sync::Lazy;
use sqlx::MySqlPool;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::model::holiday::Holiday;

/// Holidays keyed by calendar year. Every calendar, summary and approval
/// reads them, while writes are rare admin edits that invalidate the year.
static HOLIDAY_CACHE: Lazy<Cache<i32, Arc<Vec<Holiday>>>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(16)
        .time_to_live(Duration::from_secs(3600))
        .build()
});

/// Bumped on every invalidation; a load that straddles a bump may hold
/// pre-write rows and must not stay cached
static GENERATION: AtomicU64 = AtomicU64::new(0);

pub async fn cached(year: i32) -> Option<Arc<Vec<Holiday>>> {
    HOLIDAY_CACHE.get(&year).await
}

#[cfg(test)]
async fn store(year: i32, holidays: Vec<Holiday>) -> Arc<Vec<Holiday>> {
    let holidays = Arc::new(holidays);
    HOLIDAY_CACHE.insert(year, holidays.clone()).await;
    holidays
}

/// Call after the holiday write has committed
pub async fn invalidate(year: i32) {
    GENERATION.fetch_add(1, Ordering::SeqCst);
    HOLIDAY_CACHE.invalidate(&year).await;
}

/// Read-through for one year; concurrent misses share a single load
async fn load_year<F>(year: i32, load: F) -> Result<Arc<Vec<Holiday>>, sqlx::Error>
where
    F: Future<Output = Result<Vec<Holiday>, sqlx::Error>>,
{
    let generation = GENERATION.load(Ordering::SeqCst);

    let holidays = HOLIDAY_CACHE
        .try_get_with(year, async move { load.await.map(Arc::new) })
        .await
        .map_err(|e| Arc::try_unwrap(e).unwrap_or_else(|e| sqlx::Error::Protocol(e.to_string())))?;

    if GENERATION.load(Ordering::SeqCst) != generation {
        HOLIDAY_CACHE.invalidate(&year).await;
    }
    Ok(holidays)
}

/// All holidays of `year`, applicable or not, ordered by date
pub async fn holidays_for_year(pool: &MySqlPool, year: i32) -> Result<Arc<Vec<Holiday>>, sqlx::Error> {
    load_year(year, async move {
        let rows = sqlx::query_as::<_, Holiday>(
            r#"
            SELECT id, date, name, applicable
            FROM holidays
            WHERE YEAR(date) = ?
            ORDER BY date
            "#,
        )
        .bind(year)
        .fetch_all(pool)
        .await?;

        tracing::debug!(year, count = rows.len(), "Holiday cache miss");
        Ok(rows)
    })
    .await
}

pub async fn holidays_between(
    pool: &MySqlPool,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<Vec<Holiday>, sqlx::Error> {
    let mut out = Vec::new();
    for year in from.year()..=to.year() {
        let holidays = holidays_for_year(pool, year).await?;
        out.extend(
            holidays
                .iter()
                .filter(|h| h.date >= from && h.date <= to)
                .cloned(),
        );
    }
    Ok(out)
}

/// Load the given years up front so the first calendar request is warm
pub async fn warmup_holiday_cache(pool: &MySqlPool, years: &[i32]) -> Result<()> {
    let mut total = 0usize;
    for year in years {
        total += holidays_for_year(pool, *year).await?.len();
    }

    tracing::info!(years = ?years, total, "Holiday cache warmup complete");
    Ok(())
}

// Search engine: parses a request, resolves it against the catalog, then runs
// the result page and the facets side by side.

use crate::cache::{CacheStore, ResultCache};
use crate::catalog::ReferenceData;
use crate::config::{CacheTtls, Settings};
use crate::error::SearchError;
use crate::facets::{FacetCalculator, FacetSnapshot};
use crate::filters::{parse_criteria, EntityRef, ParserLimits, RangeViolation};
use crate::history::SearchHistoryRecorder;
use crate::models::{Actor, Brand, CarModel, FilterOptions, ListingSummary};
use crate::pagination::{Page, PageRequest, SortDirection, SortField, SortSpec};
use crate::predicate::{predicate_for, resolve, Predicate};
use crate::repository::{ListingRepository, NumericField};
use futures::TryFutureExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Result envelope of one search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<ListingSummary>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
    pub sort: SortField,
    pub order: SortDirection,
    pub facets: FacetSnapshot,
    /// Parameters whose values were ignored.
    pub rejected_params: Vec<String>,
    /// Ranges with min above max. They are still applied and match nothing.
    pub range_errors: Vec<RangeViolation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularBrand {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub listing_count: u64,
}

/// Marketplace overview. Everything is computed over live listings only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingStats {
    pub total_active_listings: u64,
    pub price_stats: Option<PriceStats>,
    /// Brands with the most live listings, at most five.
    pub popular_brands: Vec<PopularBrand>,
    /// The five newest live listings.
    pub recent_listings: Vec<ListingSummary>,
}

// Aggregates that share the facet TTL; the live counter has its own
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StatsAggregates {
    price_stats: Option<PriceStats>,
    popular_brands: Vec<PopularBrand>,
    recent_listings: Vec<ListingSummary>,
}

const STATS_TOP: usize = 5;

pub struct SearchEngine {
    repository: Arc<dyn ListingRepository>,
    catalog: Arc<dyn ReferenceData>,
    cache: ResultCache,
    facets: FacetCalculator,
    history: SearchHistoryRecorder,
    ttls: CacheTtls,
    settings: Settings,
}

impl SearchEngine {
    pub fn new(
        settings: &Settings,
        repository: Arc<dyn ListingRepository>,
        catalog: Arc<dyn ReferenceData>,
        store: Arc<dyn CacheStore>,
        history: SearchHistoryRecorder,
    ) -> Self {
        let cache = ResultCache::new(store);
        let ttls = settings.cache_ttls();
        let facets = FacetCalculator::new(
            repository.clone(),
            cache.clone(),
            ttls.facets,
            settings.city_facet_limit,
        );
        Self {
            repository,
            catalog,
            cache,
            facets,
            history,
            ttls,
            settings: settings.clone(),
        }
    }

    // The year bound moves with the calendar, so limits are built per request
    fn limits(&self) -> ParserLimits {
        ParserLimits::from_settings(&self.settings)
    }

    pub async fn search(
        &self,
        params: &HashMap<String, String>,
        actor: Option<&Actor>,
    ) -> Result<SearchResponse, SearchError> {
        let parsed = parse_criteria(params, &self.limits());
        let criteria = parsed.criteria;

        let resolution = resolve(&criteria.filters, self.catalog.as_ref()).await?;
        let predicate = predicate_for(&resolution, None);

        let (total_count, listings, facets) = futures::try_join!(
            self.repository.count(&predicate).err_into::<SearchError>(),
            self.repository
                .find_page(&predicate, criteria.sort, criteria.page)
                .err_into::<SearchError>(),
            self.facets.snapshot(&resolution),
        )?;

        let page = Page::new(listings, total_count, criteria.page).map(|l| ListingSummary::from(&l));
        tracing::info!(
            total = total_count,
            page = page.page,
            returned = page.items.len(),
            rejected = parsed.rejected.len(),
            "Search completed"
        );

        self.history.record(actor, params, total_count);

        Ok(SearchResponse {
            results: page.items,
            total_count,
            page: page.page,
            page_size: page.page_size,
            total_pages: page.total_pages,
            has_next: page.has_next,
            has_previous: page.has_previous,
            sort: criteria.sort.field,
            order: criteria.sort.direction,
            facets,
            rejected_params: parsed.rejected,
            range_errors: parsed.range_errors,
        })
    }

    /// Facets alone, for refreshing filter controls without a result page.
    pub async fn facets(&self, params: &HashMap<String, String>) -> Result<FacetSnapshot, SearchError> {
        let parsed = parse_criteria(params, &self.limits());
        let resolution = resolve(&parsed.criteria.filters, self.catalog.as_ref()).await?;
        self.facets.snapshot(&resolution).await
    }

    pub async fn brands(&self) -> Result<Vec<Brand>, SearchError> {
        let brands = self
            .cache
            .get_or_compute("reference:brands", self.ttls.reference, || self.catalog.brands())
            .await?;
        Ok(brands)
    }

    /// Brands with at least one live listing.
    pub async fn active_brands(&self) -> Result<Vec<Brand>, SearchError> {
        self.cache
            .get_or_compute("facet:active_brands", self.ttls.facets, || async {
                let live = self.repository.live_brand_ids().await?;
                let brands = self.catalog.brands().await?;
                Ok::<_, SearchError>(
                    brands.into_iter().filter(|b| live.contains(&b.id)).collect::<Vec<_>>(),
                )
            })
            .await
    }

    /// Models of a brand given by id or slug; `None` when the brand is unknown.
    pub async fn models_for_brand(
        &self,
        brand: &EntityRef,
    ) -> Result<Option<Vec<CarModel>>, SearchError> {
        let Some(brand) = self.catalog.find_brand(brand).await? else {
            return Ok(None);
        };
        let key = format!("reference:models:{}", brand.id);
        let models = self
            .cache
            .get_or_compute(&key, self.ttls.facets, || self.catalog.models_for_brand(brand.id))
            .await?;
        Ok(Some(models))
    }

    pub async fn stats(&self) -> Result<ListingStats, SearchError> {
        let live = Predicate::live();
        let total_active_listings = self
            .cache
            .get_or_compute("counter:live_listings", self.ttls.counters, || {
                self.repository.count(&live)
            })
            .await?;
        let aggregates = self
            .cache
            .get_or_compute("stats:listings", self.ttls.facets, || self.stats_aggregates(&live))
            .await?;
        Ok(ListingStats {
            total_active_listings,
            price_stats: aggregates.price_stats,
            popular_brands: aggregates.popular_brands,
            recent_listings: aggregates.recent_listings,
        })
    }

    async fn stats_aggregates(&self, live: &Predicate) -> Result<StatsAggregates, SearchError> {
        let newest = PageRequest { page: 1, page_size: STATS_TOP as u32 };
        let (range, average, brand_counts, recent, brands) = futures::try_join!(
            self.repository.numeric_range(live, NumericField::Price).err_into::<SearchError>(),
            self.repository.average(live, NumericField::Price).err_into::<SearchError>(),
            self.repository.count_by_brand(live).err_into::<SearchError>(),
            self.repository
                .find_page(live, SortSpec::default(), newest)
                .err_into::<SearchError>(),
            self.catalog.brands().err_into::<SearchError>(),
        )?;

        let price_stats = range.zip(average).map(|(range, avg)| PriceStats {
            avg,
            min: range.min,
            max: range.max,
        });

        let mut brand_counts = brand_counts;
        // Most listings first; ties go to the lower brand id
        brand_counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        let popular_brands = brand_counts
            .into_iter()
            .filter_map(|(id, listing_count)| {
                brands.iter().find(|b| b.id == id).map(|brand| PopularBrand {
                    id,
                    name: brand.name.clone(),
                    slug: brand.slug.clone(),
                    listing_count,
                })
            })
            .take(STATS_TOP)
            .collect();

        Ok(StatsAggregates {
            price_stats,
            popular_brands,
            recent_listings: recent.iter().map(ListingSummary::from).collect(),
        })
    }

    pub fn options(&self) -> FilterOptions {
        FilterOptions::all()
    }
}

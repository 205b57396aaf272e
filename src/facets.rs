// Facet calculator: the values still selectable for each filter control.
//
// Every facet is computed over the live set restricted by the context minus
// that facet's own field, and cached separately under that narrowed context.

use crate::cache::ResultCache;
use crate::error::{RepositoryError, SearchError};
use crate::predicate::{build_predicate, FacetField, FilterContext, Resolution};
use crate::repository::{CountField, ListingRepository, NumericField, NumericRange, TextField};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FacetRange<T> {
    pub min: T,
    pub max: T,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorFacets {
    pub exterior: Vec<String>,
    pub interior: Vec<String>,
}

/// Selectable values under a filter context. `Default` is the snapshot of an
/// empty set: every range null, every list empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetSnapshot {
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub mileage_min: Option<u32>,
    pub mileage_max: Option<u32>,
    pub engine_volume_range: Option<FacetRange<f64>>,
    pub engine_power_range: Option<FacetRange<u32>>,
    pub distinct_body_types: Vec<String>,
    pub distinct_colors: ColorFacets,
    pub distinct_cities: Vec<String>,
    pub distinct_regions: Vec<String>,
    pub door_options: Vec<u8>,
    pub seat_options: Vec<u8>,
}

// Aggregates are stored as f64; integer fields convert back losslessly
fn typed<T>(range: Option<NumericRange>, convert: fn(f64) -> T) -> Option<FacetRange<T>> {
    range.map(|r| FacetRange {
        min: convert(r.min),
        max: convert(r.max),
    })
}

#[derive(Clone)]
pub struct FacetCalculator {
    repository: Arc<dyn ListingRepository>,
    cache: ResultCache,
    ttl: Duration,
    city_limit: usize,
}

impl FacetCalculator {
    pub fn new(
        repository: Arc<dyn ListingRepository>,
        cache: ResultCache,
        ttl: Duration,
        city_limit: usize,
    ) -> Self {
        Self {
            repository,
            cache,
            ttl,
            city_limit,
        }
    }

    pub async fn snapshot(&self, resolution: &Resolution) -> Result<FacetSnapshot, SearchError> {
        let context = match resolution {
            Resolution::Context(context) => context,
            Resolution::NoMatch => return Ok(FacetSnapshot::default()),
        };

        let (
            (price, year, mileage, engine_volume, engine_power),
            (body_types, colors_exterior, colors_interior, cities, regions),
            (doors, seats),
        ) = futures::try_join!(
            async {
                futures::try_join!(
                    self.numeric(context, FacetField::Price, NumericField::Price),
                    self.numeric(context, FacetField::Year, NumericField::Year),
                    self.numeric(context, FacetField::Mileage, NumericField::Mileage),
                    self.numeric(context, FacetField::EngineVolume, NumericField::EngineVolume),
                    self.numeric(context, FacetField::EnginePower, NumericField::EnginePower),
                )
            },
            async {
                futures::try_join!(
                    self.text(context, FacetField::BodyType, TextField::BodyType, None),
                    self.text(context, FacetField::ColorExterior, TextField::ColorExterior, None),
                    self.text(context, FacetField::ColorInterior, TextField::ColorInterior, None),
                    self.text(context, FacetField::City, TextField::City, Some(self.city_limit)),
                    self.text(context, FacetField::Region, TextField::Region, None),
                )
            },
            async {
                futures::try_join!(
                    self.counts(context, FacetField::Doors, CountField::Doors),
                    self.counts(context, FacetField::Seats, CountField::Seats),
                )
            },
        )?;

        let price = typed(price, |v| v);
        let year = typed(year, |v| v as i32);
        let mileage = typed(mileage, |v| v as u32);

        Ok(FacetSnapshot {
            price_min: price.map(|r| r.min),
            price_max: price.map(|r| r.max),
            year_min: year.map(|r| r.min),
            year_max: year.map(|r| r.max),
            mileage_min: mileage.map(|r| r.min),
            mileage_max: mileage.map(|r| r.max),
            engine_volume_range: typed(engine_volume, |v| v),
            engine_power_range: typed(engine_power, |v| v as u32),
            distinct_body_types: body_types,
            distinct_colors: ColorFacets {
                exterior: colors_exterior,
                interior: colors_interior,
            },
            distinct_cities: cities,
            distinct_regions: regions,
            door_options: doors,
            seat_options: seats,
        })
    }

    // Runs `compute` through the cache, keyed by the context with `pivot` cleared
    async fn cached<T, F, Fut>(
        &self,
        context: &FilterContext,
        pivot: FacetField,
        compute: F,
    ) -> Result<T, RepositoryError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RepositoryError>>,
    {
        let scoped = context.without(pivot);
        let kind = format!("facet:{}", pivot.as_str());
        self.cache
            .get_or_compute_for(&kind, &scoped, self.ttl, compute)
            .await
    }

    async fn numeric(
        &self,
        context: &FilterContext,
        pivot: FacetField,
        field: NumericField,
    ) -> Result<Option<NumericRange>, RepositoryError> {
        let predicate = build_predicate(context, Some(pivot));
        self.cached(context, pivot, || self.repository.numeric_range(&predicate, field))
            .await
    }

    async fn text(
        &self,
        context: &FilterContext,
        pivot: FacetField,
        field: TextField,
        limit: Option<usize>,
    ) -> Result<Vec<String>, RepositoryError> {
        let predicate = build_predicate(context, Some(pivot));
        let values = self
            .cached(context, pivot, || self.repository.distinct_text(&predicate, field, limit))
            .await?;
        tracing::debug!(facet = pivot.as_str(), values = values.len(), "Facet computed");
        Ok(values)
    }

    async fn counts(
        &self,
        context: &FilterContext,
        pivot: FacetField,
        field: CountField,
    ) -> Result<Vec<u8>, RepositoryError> {
        let predicate = build_predicate(context, Some(pivot));
        self.cached(context, pivot, || self.repository.distinct_counts(&predicate, field))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCacheStore;
    use crate::filters::RangeFilter;
    use crate::models::{Listing, ListingStatus};
    use crate::repository::InMemoryListingRepository;
    use crate::testing::listing;

    fn calculator(listings: Vec<Listing>) -> FacetCalculator {
        FacetCalculator::new(
            Arc::new(InMemoryListingRepository::new(listings)),
            ResultCache::new(Arc::new(MemoryCacheStore::new(256))),
            Duration::from_secs(300),
            50,
        )
    }

    // Ten Toyotas priced 500 000 ..= 1 500 000 plus one BMW outside that range
    fn toyotas_and_a_bmw() -> Vec<Listing> {
        let mut listings: Vec<Listing> = (0..10u64)
            .map(|i| {
                let mut l = listing(i + 1);
                l.price = 500_000.0 + i as f64 * 1_000_000.0 / 9.0;
                l
            })
            .collect();
        listings[9].price = 1_500_000.0;
        let mut bmw = listing(11);
        bmw.brand_id = 2;
        bmw.brand_name = "BMW".into();
        bmw.model_id = 20;
        bmw.price = 9_000_000.0;
        bmw.city = "Kazan".into();
        listings.push(bmw);
        listings
    }

    #[tokio::test]
    async fn brand_context_bounds_the_price_facet() {
        let facets = calculator(toyotas_and_a_bmw());
        let context = FilterContext { brand: Some(1), ..Default::default() };
        let snapshot = facets.snapshot(&Resolution::Context(context)).await.unwrap();
        assert_eq!(snapshot.price_min, Some(500_000.0));
        assert_eq!(snapshot.price_max, Some(1_500_000.0));
        assert_eq!(snapshot.distinct_cities, vec!["Moscow".to_string()]);
    }

    #[tokio::test]
    async fn own_filter_does_not_narrow_its_facet() {
        let facets = calculator(toyotas_and_a_bmw());
        let context = FilterContext {
            brand: Some(1),
            price: RangeFilter { min: Some(2_000_000.0), max: None },
            ..Default::default()
        };
        let snapshot = facets.snapshot(&Resolution::Context(context)).await.unwrap();
        // Price still shows what the brand alone allows
        assert_eq!(snapshot.price_min, Some(500_000.0));
        // Other facets are restricted by the price filter, which matches nothing
        assert_eq!(snapshot.year_min, None);
        assert!(snapshot.distinct_body_types.is_empty());
    }

    #[tokio::test]
    async fn no_match_yields_the_empty_snapshot() {
        let facets = calculator(toyotas_and_a_bmw());
        let snapshot = facets.snapshot(&Resolution::NoMatch).await.unwrap();
        assert_eq!(snapshot, FacetSnapshot::default());
    }

    #[tokio::test]
    async fn inactive_listings_do_not_contribute() {
        let mut sold = listing(1);
        sold.status = ListingStatus::Sold;
        sold.year = 1995;
        sold.color_exterior = "red".into();
        let facets = calculator(vec![sold, listing(2)]);
        let snapshot = facets
            .snapshot(&Resolution::Context(FilterContext::default()))
            .await
            .unwrap();
        assert_eq!(snapshot.year_min, Some(2018));
        assert_eq!(snapshot.distinct_colors.exterior, vec!["white".to_string()]);
        assert_eq!(snapshot.door_options, vec![4]);
        assert_eq!(snapshot.engine_power_range, Some(FacetRange { min: 181, max: 181 }));
    }

    #[tokio::test]
    async fn price_bounds_used_as_filters_keep_the_result_set() {
        let listings = toyotas_and_a_bmw();
        let facets = calculator(listings.clone());
        let context = FilterContext { brand: Some(1), ..Default::default() };
        let snapshot = facets
            .snapshot(&Resolution::Context(context.clone()))
            .await
            .unwrap();

        let tightened = FilterContext {
            price: RangeFilter { min: snapshot.price_min, max: snapshot.price_max },
            ..context.clone()
        };
        let before = build_predicate(&context, None);
        let after = build_predicate(&tightened, None);
        let count = |p: &crate::predicate::Predicate| listings.iter().filter(|l| p.matches(l)).count();
        assert_eq!(count(&before), count(&after));
        assert_eq!(count(&after), 10);
    }

    #[tokio::test]
    async fn city_facet_is_capped() {
        let listings: Vec<Listing> = (1..=5)
            .map(|id| {
                let mut l = listing(id);
                l.city = format!("City {id}");
                l
            })
            .collect();
        let facets = FacetCalculator::new(
            Arc::new(InMemoryListingRepository::new(listings)),
            ResultCache::new(Arc::new(MemoryCacheStore::new(256))),
            Duration::from_secs(300),
            3,
        );
        let snapshot = facets
            .snapshot(&Resolution::Context(FilterContext::default()))
            .await
            .unwrap();
        assert_eq!(snapshot.distinct_cities.len(), 3);
    }
}

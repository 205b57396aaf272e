// Listing storage as seen by the search engine

use crate::error::RepositoryError;
use crate::models::Listing;
use crate::pagination::{sort_and_slice, PageRequest, SortSpec};
use crate::predicate::Predicate;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericField {
    Price,
    Year,
    Mileage,
    EngineVolume,
    EnginePower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextField {
    BodyType,
    ColorExterior,
    ColorInterior,
    City,
    Region,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountField {
    Doors,
    Seats,
}

/// Min/max aggregate. Absent rather than empty when nothing matched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: f64,
    pub max: f64,
}

#[async_trait]
pub trait ListingRepository: Send + Sync {
    async fn count(&self, predicate: &Predicate) -> Result<u64, RepositoryError>;

    /// One sorted page of matching listings.
    async fn find_page(
        &self,
        predicate: &Predicate,
        sort: SortSpec,
        page: PageRequest,
    ) -> Result<Vec<Listing>, RepositoryError>;

    /// Listings without a value for `field` are ignored.
    async fn numeric_range(
        &self,
        predicate: &Predicate,
        field: NumericField,
    ) -> Result<Option<NumericRange>, RepositoryError>;

    /// Mean of `field`; listings without a value are ignored.
    async fn average(
        &self,
        predicate: &Predicate,
        field: NumericField,
    ) -> Result<Option<f64>, RepositoryError>;

    /// Number of matching listings per brand id, ordered by brand id.
    async fn count_by_brand(&self, predicate: &Predicate) -> Result<Vec<(u64, u64)>, RepositoryError>;

    /// Distinct non-blank values in ascending order, at most `limit` of them.
    async fn distinct_text(
        &self,
        predicate: &Predicate,
        field: TextField,
        limit: Option<usize>,
    ) -> Result<Vec<String>, RepositoryError>;

    async fn distinct_counts(
        &self,
        predicate: &Predicate,
        field: CountField,
    ) -> Result<Vec<u8>, RepositoryError>;

    /// Brands that currently have at least one live listing.
    async fn live_brand_ids(&self) -> Result<Vec<u64>, RepositoryError>;
}

fn numeric_value(listing: &Listing, field: NumericField) -> Option<f64> {
    match field {
        NumericField::Price => Some(listing.price),
        NumericField::Year => Some(f64::from(listing.year)),
        NumericField::Mileage => Some(f64::from(listing.mileage)),
        NumericField::EngineVolume => listing.engine_volume,
        NumericField::EnginePower => listing.engine_power.map(f64::from),
    }
}

fn text_value(listing: &Listing, field: TextField) -> &str {
    match field {
        TextField::BodyType => &listing.body_type,
        TextField::ColorExterior => &listing.color_exterior,
        TextField::ColorInterior => &listing.color_interior,
        TextField::City => &listing.city,
        TextField::Region => &listing.region,
    }
}

fn count_value(listing: &Listing, field: CountField) -> Option<u8> {
    match field {
        CountField::Doors => listing.doors,
        CountField::Seats => listing.seats,
    }
}

/// Repository over listings held in memory, evaluating predicates directly.
#[derive(Debug, Default)]
pub struct InMemoryListingRepository {
    listings: RwLock<Vec<Listing>>,
}

impl InMemoryListingRepository {
    pub fn new(listings: Vec<Listing>) -> Self {
        Self { listings: RwLock::new(listings) }
    }
}

#[async_trait]
impl ListingRepository for InMemoryListingRepository {
    async fn count(&self, predicate: &Predicate) -> Result<u64, RepositoryError> {
        if predicate.is_nothing() {
            return Ok(0);
        }
        let listings = self.listings.read().await;
        Ok(listings.iter().filter(|l| predicate.matches(l)).count() as u64)
    }

    async fn find_page(
        &self,
        predicate: &Predicate,
        sort: SortSpec,
        page: PageRequest,
    ) -> Result<Vec<Listing>, RepositoryError> {
        if predicate.is_nothing() {
            return Ok(Vec::new());
        }
        let listings = self.listings.read().await;
        let matching: Vec<Listing> = listings
            .iter()
            .filter(|l| predicate.matches(l))
            .cloned()
            .collect();
        Ok(sort_and_slice(matching, sort, page))
    }

    async fn numeric_range(
        &self,
        predicate: &Predicate,
        field: NumericField,
    ) -> Result<Option<NumericRange>, RepositoryError> {
        let listings = self.listings.read().await;
        let range = listings
            .iter()
            .filter(|l| predicate.matches(l))
            .filter_map(|l| numeric_value(l, field))
            .fold(None, |acc: Option<NumericRange>, value| {
                Some(match acc {
                    Some(range) => NumericRange {
                        min: range.min.min(value),
                        max: range.max.max(value),
                    },
                    None => NumericRange { min: value, max: value },
                })
            });
        Ok(range)
    }

    async fn average(
        &self,
        predicate: &Predicate,
        field: NumericField,
    ) -> Result<Option<f64>, RepositoryError> {
        let listings = self.listings.read().await;
        let (sum, count) = listings
            .iter()
            .filter(|l| predicate.matches(l))
            .filter_map(|l| numeric_value(l, field))
            .fold((0.0, 0u64), |(sum, count), value| (sum + value, count + 1));
        Ok((count > 0).then(|| sum / count as f64))
    }

    async fn count_by_brand(&self, predicate: &Predicate) -> Result<Vec<(u64, u64)>, RepositoryError> {
        let listings = self.listings.read().await;
        let mut counts: BTreeMap<u64, u64> = BTreeMap::new();
        for listing in listings.iter().filter(|l| predicate.matches(l)) {
            *counts.entry(listing.brand_id).or_default() += 1;
        }
        Ok(counts.into_iter().collect())
    }

    async fn distinct_text(
        &self,
        predicate: &Predicate,
        field: TextField,
        limit: Option<usize>,
    ) -> Result<Vec<String>, RepositoryError> {
        let listings = self.listings.read().await;
        let values: BTreeSet<&str> = listings
            .iter()
            .filter(|l| predicate.matches(l))
            .map(|l| text_value(l, field).trim())
            .filter(|v| !v.is_empty())
            .collect();
        Ok(values
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(str::to_string)
            .collect())
    }

    async fn distinct_counts(
        &self,
        predicate: &Predicate,
        field: CountField,
    ) -> Result<Vec<u8>, RepositoryError> {
        let listings = self.listings.read().await;
        let values: BTreeSet<u8> = listings
            .iter()
            .filter(|l| predicate.matches(l))
            .filter_map(|l| count_value(l, field))
            .collect();
        Ok(values.into_iter().collect())
    }

    async fn live_brand_ids(&self) -> Result<Vec<u64>, RepositoryError> {
        let listings = self.listings.read().await;
        let ids: BTreeSet<u64> = listings
            .iter()
            .filter(|l| l.is_live())
            .map(|l| l.brand_id)
            .collect();
        Ok(ids.into_iter().collect())
    }
}

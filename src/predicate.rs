// Composes validated filters into a predicate over listings.
//
// A `Predicate` is a plain conjunction of clauses so that any repository can
// translate it (the in-memory one evaluates it directly). Because it is a pure
// conjunction, the order in which filters are added never changes the result.

use crate::catalog::ReferenceData;
use crate::error::CatalogError;
use crate::filters::{EntityRef, Filters, RangeFilter};
use crate::models::{
    Condition, DriveType, FuelType, Listing, OwnerType, SteeringSide, TransmissionType,
};
use serde::{Deserialize, Serialize};

/// Filters with brand and model resolved to catalog identifiers.
pub type FilterContext = Filters<u64>;

/// A filter field that also has a facet. Computing a facet for one of these
/// excludes the field's own filter from the restriction (pivot exclusion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetField {
    Price,
    Year,
    Mileage,
    EngineVolume,
    EnginePower,
    BodyType,
    ColorExterior,
    ColorInterior,
    City,
    Region,
    Doors,
    Seats,
}

impl FacetField {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Year => "year",
            Self::Mileage => "mileage",
            Self::EngineVolume => "engine_volume",
            Self::EnginePower => "engine_power",
            Self::BodyType => "body_type",
            Self::ColorExterior => "color_exterior",
            Self::ColorInterior => "color_interior",
            Self::City => "city",
            Self::Region => "region",
            Self::Doors => "doors",
            Self::Seats => "seats",
        }
    }
}

impl FilterContext {
    /// The same context with `field`'s filter cleared.
    pub fn without(&self, field: FacetField) -> FilterContext {
        let mut scoped = self.clone();
        match field {
            FacetField::Price => scoped.price = RangeFilter::default(),
            FacetField::Year => scoped.year = RangeFilter::default(),
            FacetField::Mileage => scoped.mileage = RangeFilter::default(),
            FacetField::EngineVolume => scoped.engine_volume = RangeFilter::default(),
            FacetField::EnginePower => scoped.engine_power = RangeFilter::default(),
            FacetField::BodyType => scoped.body_type = None,
            FacetField::ColorExterior => scoped.color_exterior = None,
            FacetField::ColorInterior => scoped.color_interior = None,
            FacetField::City => scoped.city = None,
            FacetField::Region => scoped.region = None,
            FacetField::Doors => scoped.doors = RangeFilter::default(),
            FacetField::Seats => scoped.seats = RangeFilter::default(),
        }
        scoped
    }
}

/// Outcome of resolving brand/model references against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Context(FilterContext),
    /// A referenced brand or model does not exist: the search matches nothing.
    NoMatch,
}

/// Looks brand and model up by id or slug. A model is only looked up within
/// the selected brand, so a model of another brand resolves to `NoMatch`.
/// Without a brand the model is looked up across all brands.
pub async fn resolve(
    filters: &Filters<EntityRef>,
    catalog: &dyn ReferenceData,
) -> Result<Resolution, CatalogError> {
    let brand_id = match &filters.brand {
        Some(reference) => match catalog.find_brand(reference).await? {
            Some(brand) => Some(brand.id),
            None => {
                tracing::debug!(?reference, "Brand not found, search matches nothing");
                return Ok(Resolution::NoMatch);
            }
        },
        None => None,
    };

    let model_id = match &filters.model {
        Some(reference) => match catalog.find_model(reference, brand_id).await? {
            Some(model) => Some(model.id),
            None => {
                tracing::debug!(?reference, ?brand_id, "Model not found, search matches nothing");
                return Ok(Resolution::NoMatch);
            }
        },
        None => None,
    };

    Ok(Resolution::Context(filters.clone().with_refs(brand_id, model_id)))
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// Active and published.
    Live,
    Nothing,
    Brand(u64),
    Model(u64),
    /// Case-insensitive substring of title, description, model, brand or VIN.
    Text(String),
    BodyType(String),
    FuelType(FuelType),
    TransmissionType(TransmissionType),
    DriveType(DriveType),
    Condition(Condition),
    OwnerType(OwnerType),
    SteeringWheel(SteeringSide),
    ColorExterior(String),
    ColorInterior(String),
    City(String),
    Region(String),
    Price(RangeFilter<f64>),
    Year(RangeFilter<i32>),
    Mileage(RangeFilter<u32>),
    EngineVolume(RangeFilter<f64>),
    EnginePower(RangeFilter<u32>),
    Doors(RangeFilter<u8>),
    Seats(RangeFilter<u8>),
    ServiceHistory,
    Tuning,
}

fn contains_folded(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

fn optional_in<T: PartialOrd + Copy>(value: Option<T>, range: &RangeFilter<T>) -> bool {
    value.is_some_and(|v| range.contains(v))
}

impl Clause {
    // Text values in clauses are already lower-cased by the filter parser
    pub fn matches(&self, listing: &Listing) -> bool {
        match self {
            Clause::Live => listing.is_live(),
            Clause::Nothing => false,
            Clause::Brand(id) => listing.brand_id == *id,
            Clause::Model(id) => listing.model_id == *id,
            Clause::Text(needle) => {
                contains_folded(&listing.title, needle)
                    || contains_folded(&listing.description, needle)
                    || contains_folded(&listing.model_name, needle)
                    || contains_folded(&listing.brand_name, needle)
                    || listing.vin.as_deref().is_some_and(|vin| contains_folded(vin, needle))
            }
            Clause::BodyType(value) => listing.body_type.to_lowercase() == *value,
            Clause::FuelType(value) => listing.fuel_type == Some(*value),
            Clause::TransmissionType(value) => listing.transmission_type == Some(*value),
            Clause::DriveType(value) => listing.drive_type == Some(*value),
            Clause::Condition(value) => listing.condition == Some(*value),
            Clause::OwnerType(value) => listing.owner_type == Some(*value),
            Clause::SteeringWheel(value) => listing.steering_wheel == Some(*value),
            Clause::ColorExterior(value) => listing.color_exterior.to_lowercase() == *value,
            Clause::ColorInterior(value) => listing.color_interior.to_lowercase() == *value,
            Clause::City(value) => contains_folded(&listing.city, value),
            Clause::Region(value) => contains_folded(&listing.region, value),
            Clause::Price(range) => range.contains(listing.price),
            Clause::Year(range) => range.contains(listing.year),
            Clause::Mileage(range) => range.contains(listing.mileage),
            Clause::EngineVolume(range) => optional_in(listing.engine_volume, range),
            Clause::EnginePower(range) => optional_in(listing.engine_power, range),
            Clause::Doors(range) => optional_in(listing.doors, range),
            Clause::Seats(range) => optional_in(listing.seats, range),
            Clause::ServiceHistory => listing.service_history,
            Clause::Tuning => listing.has_tuning,
        }
    }
}

/// Conjunction of clauses.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    clauses: Vec<Clause>,
}

impl Predicate {
    /// Every live listing.
    pub fn live() -> Self {
        Self { clauses: vec![Clause::Live] }
    }

    pub fn nothing() -> Self {
        Self { clauses: vec![Clause::Nothing] }
    }

    pub fn with(mut self, clause: Clause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn and(mut self, other: Predicate) -> Self {
        self.clauses.extend(other.clauses);
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn is_nothing(&self) -> bool {
        self.clauses.contains(&Clause::Nothing)
    }

    pub fn matches(&self, listing: &Listing) -> bool {
        self.clauses.iter().all(|clause| clause.matches(listing))
    }
}

fn push_range<T>(clauses: &mut Vec<Clause>, range: RangeFilter<T>, clause: fn(RangeFilter<T>) -> Clause)
where
    T: PartialOrd + Copy,
{
    if !range.is_open() {
        clauses.push(clause(range));
    }
}

/// Builds the predicate for `context`, leaving out `pivot`'s own filter when given.
pub fn build_predicate(context: &FilterContext, pivot: Option<FacetField>) -> Predicate {
    let scoped;
    let context = match pivot {
        Some(field) => {
            scoped = context.without(field);
            &scoped
        }
        None => context,
    };

    let mut clauses = vec![Clause::Live];

    if let Some(id) = context.brand {
        clauses.push(Clause::Brand(id));
    }
    if let Some(id) = context.model {
        clauses.push(Clause::Model(id));
    }
    if let Some(query) = &context.query {
        clauses.push(Clause::Text(query.clone()));
    }
    if let Some(value) = &context.body_type {
        clauses.push(Clause::BodyType(value.clone()));
    }
    if let Some(value) = context.fuel_type {
        clauses.push(Clause::FuelType(value));
    }
    if let Some(value) = context.transmission_type {
        clauses.push(Clause::TransmissionType(value));
    }
    if let Some(value) = context.drive_type {
        clauses.push(Clause::DriveType(value));
    }
    if let Some(value) = context.condition {
        clauses.push(Clause::Condition(value));
    }
    if let Some(value) = context.owner_type {
        clauses.push(Clause::OwnerType(value));
    }
    if let Some(value) = context.steering_wheel {
        clauses.push(Clause::SteeringWheel(value));
    }
    if let Some(value) = &context.color_exterior {
        clauses.push(Clause::ColorExterior(value.clone()));
    }
    if let Some(value) = &context.color_interior {
        clauses.push(Clause::ColorInterior(value.clone()));
    }
    if let Some(value) = &context.city {
        clauses.push(Clause::City(value.clone()));
    }
    if let Some(value) = &context.region {
        clauses.push(Clause::Region(value.clone()));
    }

    push_range(&mut clauses, context.price, Clause::Price);
    push_range(&mut clauses, context.year, Clause::Year);
    push_range(&mut clauses, context.mileage, Clause::Mileage);
    push_range(&mut clauses, context.engine_volume, Clause::EngineVolume);
    push_range(&mut clauses, context.engine_power, Clause::EnginePower);
    push_range(&mut clauses, context.doors, Clause::Doors);
    push_range(&mut clauses, context.seats, Clause::Seats);

    if context.service_history {
        clauses.push(Clause::ServiceHistory);
    }
    if context.has_tuning {
        clauses.push(Clause::Tuning);
    }

    Predicate { clauses }
}

/// Predicate for a resolution; `NoMatch` collapses to [`Predicate::nothing`].
pub fn predicate_for(resolution: &Resolution, pivot: Option<FacetField>) -> Predicate {
    match resolution {
        Resolution::Context(context) => build_predicate(context, pivot),
        Resolution::NoMatch => Predicate::nothing(),
    }
}

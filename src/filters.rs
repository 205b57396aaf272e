// Turns raw query-string parameters into typed, validated search criteria.
//
// Nothing in here fails a search: malformed values are dropped and reported
// back through `ParsedCriteria::rejected`, inverted ranges are kept and
// reported through `ParsedCriteria::range_errors`.

use crate::config::Settings;
use crate::models::{
    Choice, Condition, DriveType, FuelType, OwnerType, SteeringSide, TransmissionType,
};
use crate::pagination::{PageRequest, SortDirection, SortField, SortSpec};
use chrono::Datelike;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

const MIN_YEAR: i32 = 1900;
const MAX_PRICE: f64 = 1e10;
const MAX_MILEAGE: u32 = 5_000_000;
const MAX_ENGINE_VOLUME: f64 = 20.0;
const MAX_ENGINE_POWER: u32 = 3000;
const DOOR_BOUNDS: (u8, u8) = (2, 5);
const SEAT_BOUNDS: (u8, u8) = (2, 9);

// Literal clients send for "any value" in select controls
const ANY: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("not a valid number: {0}")]
    Malformed(String),
    #[error("value out of range: {0}")]
    OutOfBounds(String),
    #[error("unknown value: {0}")]
    Unknown(String),
}

/// Brand or model as the client referred to it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityRef {
    Id(u64),
    Slug(String),
}

impl EntityRef {
    pub fn from_param(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || raw.eq_ignore_ascii_case(ANY) {
            return None;
        }
        if raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = raw.parse() {
                return Some(Self::Id(id));
            }
        }
        Some(Self::Slug(raw.to_lowercase()))
    }
}

/// Inclusive bounds; either side may be open.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeFilter<T> {
    pub min: Option<T>,
    pub max: Option<T>,
}

impl<T> Default for RangeFilter<T> {
    fn default() -> Self {
        Self { min: None, max: None }
    }
}

impl<T: PartialOrd + Copy> RangeFilter<T> {
    pub fn exact(value: T) -> Self {
        Self { min: Some(value), max: Some(value) }
    }

    pub fn is_open(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    pub fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }

    pub fn contains(&self, value: T) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

/// The filtering part of a search. `E` is how brand and model are referenced:
/// [`EntityRef`] straight from the client, `u64` once resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filters<E> {
    pub query: Option<String>,
    pub brand: Option<E>,
    pub model: Option<E>,

    pub body_type: Option<String>,
    pub fuel_type: Option<FuelType>,
    pub transmission_type: Option<TransmissionType>,
    pub drive_type: Option<DriveType>,
    pub condition: Option<Condition>,
    pub owner_type: Option<OwnerType>,
    pub steering_wheel: Option<SteeringSide>,
    pub color_exterior: Option<String>,
    pub color_interior: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,

    pub price: RangeFilter<f64>,
    pub year: RangeFilter<i32>,
    pub mileage: RangeFilter<u32>,
    pub engine_volume: RangeFilter<f64>,
    pub engine_power: RangeFilter<u32>,
    pub doors: RangeFilter<u8>,
    pub seats: RangeFilter<u8>,

    pub service_history: bool,
    pub has_tuning: bool,
}

impl<E> Default for Filters<E> {
    fn default() -> Self {
        Self {
            query: None,
            brand: None,
            model: None,
            body_type: None,
            fuel_type: None,
            transmission_type: None,
            drive_type: None,
            condition: None,
            owner_type: None,
            steering_wheel: None,
            color_exterior: None,
            color_interior: None,
            city: None,
            region: None,
            price: RangeFilter::default(),
            year: RangeFilter::default(),
            mileage: RangeFilter::default(),
            engine_volume: RangeFilter::default(),
            engine_power: RangeFilter::default(),
            doors: RangeFilter::default(),
            seats: RangeFilter::default(),
            service_history: false,
            has_tuning: false,
        }
    }
}

impl<E> Filters<E> {
    /// Same filters with brand and model replaced.
    pub fn with_refs<F>(self, brand: Option<F>, model: Option<F>) -> Filters<F> {
        Filters {
            query: self.query,
            brand,
            model,
            body_type: self.body_type,
            fuel_type: self.fuel_type,
            transmission_type: self.transmission_type,
            drive_type: self.drive_type,
            condition: self.condition,
            owner_type: self.owner_type,
            steering_wheel: self.steering_wheel,
            color_exterior: self.color_exterior,
            color_interior: self.color_interior,
            city: self.city,
            region: self.region,
            price: self.price,
            year: self.year,
            mileage: self.mileage,
            engine_volume: self.engine_volume,
            engine_power: self.engine_power,
            doors: self.doors,
            seats: self.seats,
            service_history: self.service_history,
            has_tuning: self.has_tuning,
        }
    }
}

/// One validated search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingCriteria {
    pub filters: Filters<EntityRef>,
    pub sort: SortSpec,
    pub page: PageRequest,
}

/// A range whose lower bound exceeds its upper bound. Both bounds stay applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeViolation {
    pub field: String,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCriteria {
    pub criteria: ListingCriteria,
    /// Parameter keys whose values were dropped.
    pub rejected: Vec<String>,
    pub range_errors: Vec<RangeViolation>,
}

#[derive(Debug, Clone, Copy)]
pub struct ParserLimits {
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub current_year: i32,
}

impl ParserLimits {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            default_page_size: settings.default_page_size.max(1),
            max_page_size: settings.max_page_size.max(1),
            current_year: chrono::Utc::now().year(),
        }
    }
}

// Each parse_* helper handles one value and never looks at other fields.

fn parse_number<T: FromStr>(raw: &str) -> Result<T, ParseError> {
    raw.parse::<T>().map_err(|_| ParseError::Malformed(raw.to_string()))
}

fn within<T: PartialOrd + Display>(value: T, low: T, high: T) -> Result<T, ParseError> {
    if value < low || value > high {
        return Err(ParseError::OutOfBounds(value.to_string()));
    }
    Ok(value)
}

fn parse_price(raw: &str) -> Result<f64, ParseError> {
    let value: f64 = parse_number(raw)?;
    if !value.is_finite() || value <= 0.0 || value > MAX_PRICE {
        return Err(ParseError::OutOfBounds(raw.to_string()));
    }
    Ok(value)
}

fn parse_engine_volume(raw: &str) -> Result<f64, ParseError> {
    let value: f64 = parse_number(raw)?;
    if !value.is_finite() || value <= 0.0 || value > MAX_ENGINE_VOLUME {
        return Err(ParseError::OutOfBounds(raw.to_string()));
    }
    Ok(value)
}

fn parse_flag(raw: &str) -> Result<bool, ParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ParseError::Unknown(raw.to_string())),
    }
}

// Walks the raw parameters, recording every key it had to drop
struct FieldReader<'a> {
    params: &'a HashMap<String, String>,
    rejected: Vec<String>,
    range_errors: Vec<RangeViolation>,
}

impl<'a> FieldReader<'a> {
    fn new(params: &'a HashMap<String, String>) -> Self {
        Self { params, rejected: Vec::new(), range_errors: Vec::new() }
    }

    // Trimmed, non-empty raw value
    fn raw(&self, key: &str) -> Option<&'a str> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn value<T>(&mut self, key: &str, parse: impl Fn(&str) -> Result<T, ParseError>) -> Option<T> {
        let raw = self.raw(key)?;
        match parse(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Dropping invalid search parameter");
                self.rejected.push(key.to_string());
                None
            }
        }
    }

    fn text(&mut self, key: &str) -> Option<String> {
        self.raw(key)
            .filter(|v| !v.eq_ignore_ascii_case(ANY))
            .map(|v| v.to_lowercase())
    }

    fn choice<C: Choice>(&mut self, key: &str) -> Option<C> {
        if self.raw(key).is_some_and(|v| v.eq_ignore_ascii_case(ANY)) {
            return None;
        }
        self.value(key, |raw| C::from_param(raw).ok_or_else(|| ParseError::Unknown(raw.to_string())))
    }

    fn range<T>(
        &mut self,
        field: &str,
        parse: impl Fn(&str) -> Result<T, ParseError>,
    ) -> RangeFilter<T>
    where
        T: PartialOrd + Copy + Into<f64>,
    {
        let min = self.value(&format!("min_{field}"), &parse);
        let max = self.value(&format!("max_{field}"), &parse);
        let range = RangeFilter { min, max };
        if let (Some(min), Some(max)) = (min, max) {
            if range.is_inverted() {
                self.range_errors.push(RangeViolation {
                    field: field.to_string(),
                    min: min.into(),
                    max: max.into(),
                });
            }
        }
        range
    }

    fn flag(&mut self, key: &str) -> bool {
        self.value(key, parse_flag).unwrap_or(false)
    }
}

/// Parses a flat parameter map. Never fails; see [`ParsedCriteria`].
pub fn parse_criteria(params: &HashMap<String, String>, limits: &ParserLimits) -> ParsedCriteria {
    let mut reader = FieldReader::new(params);
    let max_year = limits.current_year + 1;

    let filters = Filters {
        query: reader.raw("search").map(|q| q.to_lowercase()),
        brand: reader.raw("brand").and_then(EntityRef::from_param),
        model: reader.raw("model").and_then(EntityRef::from_param),

        body_type: reader.text("body_type"),
        fuel_type: reader.choice("fuel_type"),
        transmission_type: reader.choice("transmission_type"),
        drive_type: reader.choice("drive_type"),
        condition: reader.choice("condition"),
        owner_type: reader.choice("owner_type"),
        steering_wheel: reader.choice("steering_wheel"),
        color_exterior: reader.text("color_exterior"),
        color_interior: reader.text("color_interior"),
        city: reader.text("city"),
        region: reader.text("region"),

        price: reader.range("price", parse_price),
        year: reader.range("year", |raw| within(parse_number(raw)?, MIN_YEAR, max_year)),
        mileage: reader.range("mileage", |raw| within(parse_number(raw)?, 0, MAX_MILEAGE)),
        engine_volume: reader.range("engine_volume", parse_engine_volume),
        engine_power: reader.range("engine_power", |raw| {
            within(parse_number(raw)?, 1, MAX_ENGINE_POWER)
        }),
        doors: reader
            .value("doors", |raw| within(parse_number(raw)?, DOOR_BOUNDS.0, DOOR_BOUNDS.1))
            .map(RangeFilter::exact)
            .unwrap_or_default(),
        seats: reader
            .value("seats", |raw| within(parse_number(raw)?, SEAT_BOUNDS.0, SEAT_BOUNDS.1))
            .map(RangeFilter::exact)
            .unwrap_or_default(),

        service_history: reader.flag("has_service_history"),
        has_tuning: reader.flag("has_tuning"),
    };

    let sort = SortSpec {
        field: reader.value("sort", |raw| {
            SortField::from_param(raw).ok_or_else(|| ParseError::Unknown(raw.to_string()))
        })
        .unwrap_or_default(),
        direction: reader.value("order", |raw| {
            SortDirection::from_param(raw).ok_or_else(|| ParseError::Unknown(raw.to_string()))
        })
        .unwrap_or_default(),
    };

    let page = reader
        .value("page", parse_number::<i64>)
        .map_or(1, |p| p.clamp(1, i64::from(u32::MAX)) as u32);
    let page_size = reader
        .value("page_size", parse_number::<i64>)
        .map_or(limits.default_page_size.min(limits.max_page_size), |size| {
            size.clamp(1, i64::from(limits.max_page_size)) as u32
        });

    ParsedCriteria {
        criteria: ListingCriteria {
            filters,
            sort,
            page: PageRequest { page, page_size },
        },
        rejected: reader.rejected,
        range_errors: reader.range_errors,
    }
}

// Data structures shared by the engine, the repository and the HTTP layer
// e.g., Listing, catalog entities, summaries returned to the frontend

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A closed set of string values accepted from query parameters.
pub trait Choice: Copy + Sized + 'static {
    const ALL: &'static [Self];

    fn as_str(self) -> &'static str;

    fn from_param(raw: &str) -> Option<Self> {
        let raw = raw.trim().to_lowercase();
        Self::ALL.iter().copied().find(|c| c.as_str() == raw)
    }

    fn values() -> Vec<&'static str> {
        Self::ALL.iter().map(|c| c.as_str()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FuelType {
    Petrol,
    Diesel,
    Electric,
    Hybrid,
    Gas,
    PetrolGas,
}

impl Choice for FuelType {
    const ALL: &'static [Self] = &[
        Self::Petrol,
        Self::Diesel,
        Self::Electric,
        Self::Hybrid,
        Self::Gas,
        Self::PetrolGas,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Petrol => "petrol",
            Self::Diesel => "diesel",
            Self::Electric => "electric",
            Self::Hybrid => "hybrid",
            Self::Gas => "gas",
            Self::PetrolGas => "petrol_gas",
        }
    }

    // "petrol+gas" arrives as "petrol gas" once the query string is decoded
    fn from_param(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "petrol+gas" | "petrol gas" | "petrol_gas" => Some(Self::PetrolGas),
            other => Self::ALL.iter().copied().find(|c| c.as_str() == other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransmissionType {
    Manual,
    Automatic,
    Robot,
    Variator,
}

impl Choice for TransmissionType {
    const ALL: &'static [Self] = &[Self::Manual, Self::Automatic, Self::Robot, Self::Variator];

    fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Automatic => "automatic",
            Self::Robot => "robot",
            Self::Variator => "variator",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveType {
    Front,
    Rear,
    Full,
    AllWheel,
    FourWheel,
}

impl Choice for DriveType {
    const ALL: &'static [Self] = &[
        Self::Front,
        Self::Rear,
        Self::Full,
        Self::AllWheel,
        Self::FourWheel,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Front => "front",
            Self::Rear => "rear",
            Self::Full => "full",
            Self::AllWheel => "all_wheel",
            Self::FourWheel => "four_wheel",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    Used,
    Salvage,
    SpareParts,
}

impl Choice for Condition {
    const ALL: &'static [Self] = &[Self::New, Self::Used, Self::Salvage, Self::SpareParts];

    fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Used => "used",
            Self::Salvage => "salvage",
            Self::SpareParts => "spare_parts",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Private,
    Dealer,
}

impl Choice for OwnerType {
    const ALL: &'static [Self] = &[Self::Private, Self::Dealer];

    fn as_str(self) -> &'static str {
        match self {
            Self::Private => "private",
            Self::Dealer => "dealer",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SteeringSide {
    Left,
    Right,
}

impl Choice for SteeringSide {
    const ALL: &'static [Self] = &[Self::Left, Self::Right];

    fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Draft,
    Active,
    Sold,
    Expired,
    Banned,
    Pending,
}

#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    RUB,
    USD,
    EUR,
    KZT,
}

// A single listing as stored by the repository
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub vin: Option<String>,

    // Price & basic vehicle info
    pub price: f64,
    #[serde(default)]
    pub currency: Currency,
    pub year: i32,
    pub mileage: u32,

    // Catalog references, denormalized for text search and summaries
    #[serde(default)]
    pub brand_id: u64,
    #[serde(default)]
    pub brand_name: String,
    pub model_id: u64,
    #[serde(default)]
    pub model_name: String,
    #[serde(default)]
    pub body_type: String,

    // Technical characteristics
    pub fuel_type: Option<FuelType>,
    pub transmission_type: Option<TransmissionType>,
    pub drive_type: Option<DriveType>,
    pub condition: Option<Condition>,
    pub owner_type: Option<OwnerType>,
    pub steering_wheel: Option<SteeringSide>,
    pub engine_volume: Option<f64>,
    pub engine_power: Option<u32>,
    pub doors: Option<u8>,
    pub seats: Option<u8>,
    #[serde(default)]
    pub color_exterior: String,
    #[serde(default)]
    pub color_interior: String,
    #[serde(default)]
    pub service_history: bool,
    #[serde(default)]
    pub has_tuning: bool,

    // Location
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub region: String,

    // Lifecycle
    pub status: ListingStatus,
    #[serde(default = "default_true")]
    pub is_published: bool,
    #[serde(default)]
    pub views_count: u64,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Listing {
    /// Active and published: the only listings search and facets may see.
    pub fn is_live(&self) -> bool {
        self.status == ListingStatus::Active && self.is_published
    }
}

// What the frontend needs to render one row of the result list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListingSummary {
    pub id: u64,
    pub title: String,
    pub price: f64,
    pub currency: Currency,
    pub year: i32,
    pub mileage: u32,
    pub brand: String,
    pub model: String,
    pub city: String,
    pub thumbnail: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&Listing> for ListingSummary {
    fn from(listing: &Listing) -> Self {
        Self {
            id: listing.id,
            title: listing.title.clone(),
            price: listing.price,
            currency: listing.currency,
            year: listing.year,
            mileage: listing.mileage,
            brand: listing.brand_name.clone(),
            model: listing.model_name.clone(),
            city: listing.city.clone(),
            thumbnail: listing.thumbnail.clone(),
            created_at: listing.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    pub id: u64,
    pub name: String,
    pub slug: String,
    pub country: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarModel {
    pub id: u64,
    pub brand_id: u64,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub body_type: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Authenticated caller of a search, identified by the token subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
}

// One row of the search history audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHistoryRecord {
    pub actor: Option<String>,
    pub query: String,
    pub filters: BTreeMap<String, String>,
    pub result_count: u64,
    pub created_at: DateTime<Utc>,
}

// Enumerated filter domains, served to populate select controls
#[derive(Debug, Clone, Serialize)]
pub struct FilterOptions {
    pub fuel_types: Vec<&'static str>,
    pub transmission_types: Vec<&'static str>,
    pub drive_types: Vec<&'static str>,
    pub conditions: Vec<&'static str>,
    pub owner_types: Vec<&'static str>,
    pub steering_sides: Vec<&'static str>,
}

impl FilterOptions {
    pub fn all() -> Self {
        Self {
            fuel_types: FuelType::values(),
            transmission_types: TransmissionType::values(),
            drive_types: DriveType::values(),
            conditions: Condition::values(),
            owner_types: OwnerType::values(),
            steering_sides: SteeringSide::values(),
        }
    }
}

// Fixtures shared by the unit tests

use crate::catalog::InMemoryCatalog;
use crate::models::{Brand, CarModel, Currency, FuelType, Listing, ListingStatus};
use chrono::{Duration, TimeZone, Utc};

/// A live Toyota Camry; `id` also orders `created_at`.
pub fn listing(id: u64) -> Listing {
    Listing {
        id,
        title: format!("Listing {id}"),
        description: String::new(),
        vin: None,
        price: 1_000_000.0,
        currency: Currency::RUB,
        year: 2018,
        mileage: 50_000,
        brand_id: 1,
        brand_name: "Toyota".into(),
        model_id: 10,
        model_name: "Camry".into(),
        body_type: "sedan".into(),
        fuel_type: Some(FuelType::Petrol),
        transmission_type: None,
        drive_type: None,
        condition: None,
        owner_type: None,
        steering_wheel: None,
        engine_volume: Some(2.5),
        engine_power: Some(181),
        doors: Some(4),
        seats: Some(5),
        color_exterior: "white".into(),
        color_interior: "black".into(),
        service_history: false,
        has_tuning: false,
        city: "Moscow".into(),
        region: "Moscow".into(),
        status: ListingStatus::Active,
        is_published: true,
        views_count: 0,
        thumbnail: None,
        created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(id as i64),
    }
}

pub fn catalog_fixture() -> InMemoryCatalog {
    let brand = |id, name: &str, slug: &str| Brand {
        id,
        name: name.into(),
        slug: slug.into(),
        country: None,
        is_active: true,
    };
    let model = |id, brand_id, name: &str, slug: &str, body: &str| CarModel {
        id,
        brand_id,
        name: name.into(),
        slug: slug.into(),
        body_type: body.into(),
        is_active: true,
    };
    InMemoryCatalog::new(
        vec![brand(1, "Toyota", "toyota"), brand(2, "BMW", "bmw")],
        vec![
            model(10, 1, "Camry", "camry", "sedan"),
            model(11, 1, "RAV4", "rav4", "suv"),
            model(20, 2, "X5", "x5", "suv"),
        ],
    )
}

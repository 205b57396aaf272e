// Reference data: brands and models, looked up by id or slug

use crate::error::CatalogError;
use crate::filters::EntityRef;
use crate::models::{Brand, CarModel, Listing};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

#[async_trait]
pub trait ReferenceData: Send + Sync {
    /// Active brands ordered by name.
    async fn brands(&self) -> Result<Vec<Brand>, CatalogError>;

    async fn find_brand(&self, reference: &EntityRef) -> Result<Option<Brand>, CatalogError>;

    /// Looks a model up, restricted to `brand_id`'s models when given.
    async fn find_model(
        &self,
        reference: &EntityRef,
        brand_id: Option<u64>,
    ) -> Result<Option<CarModel>, CatalogError>;

    /// Active models of a brand ordered by name.
    async fn models_for_brand(&self, brand_id: u64) -> Result<Vec<CarModel>, CatalogError>;
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    brands: Vec<Brand>,
    models: Vec<CarModel>,
}

impl InMemoryCatalog {
    pub fn new(mut brands: Vec<Brand>, mut models: Vec<CarModel>) -> Self {
        brands.sort_by(|a, b| a.name.cmp(&b.name));
        models.sort_by(|a, b| a.name.cmp(&b.name));
        Self { brands, models }
    }

    fn model(&self, id: u64) -> Option<&CarModel> {
        self.models.iter().find(|m| m.id == id)
    }

    fn brand(&self, id: u64) -> Option<&Brand> {
        self.brands.iter().find(|b| b.id == id)
    }
}

fn matches_ref(reference: &EntityRef, id: u64, slug: &str) -> bool {
    match reference {
        EntityRef::Id(wanted) => *wanted == id,
        EntityRef::Slug(wanted) => slug.eq_ignore_ascii_case(wanted),
    }
}

#[async_trait]
impl ReferenceData for InMemoryCatalog {
    async fn brands(&self) -> Result<Vec<Brand>, CatalogError> {
        Ok(self.brands.iter().filter(|b| b.is_active).cloned().collect())
    }

    async fn find_brand(&self, reference: &EntityRef) -> Result<Option<Brand>, CatalogError> {
        Ok(self
            .brands
            .iter()
            .find(|b| matches_ref(reference, b.id, &b.slug))
            .cloned())
    }

    async fn find_model(
        &self,
        reference: &EntityRef,
        brand_id: Option<u64>,
    ) -> Result<Option<CarModel>, CatalogError> {
        Ok(self
            .models
            .iter()
            .filter(|m| brand_id.is_none_or(|id| m.brand_id == id))
            .find(|m| matches_ref(reference, m.id, &m.slug))
            .cloned())
    }

    async fn models_for_brand(&self, brand_id: u64) -> Result<Vec<CarModel>, CatalogError> {
        Ok(self
            .models
            .iter()
            .filter(|m| m.brand_id == brand_id && m.is_active)
            .cloned()
            .collect())
    }
}

// On-disk seed for the in-memory collaborators
#[derive(Debug, Deserialize)]
pub struct SeedData {
    pub brands: Vec<Brand>,
    pub models: Vec<CarModel>,
    #[serde(default)]
    pub listings: Vec<Listing>,
}

impl SeedData {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        let mut seed: SeedData = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse seed file {}", path.display()))?;
        seed.denormalize()?;
        Ok(seed)
    }

    // Listings in the seed only name their model; copy brand/model details in
    fn denormalize(&mut self) -> Result<()> {
        let catalog = InMemoryCatalog::new(self.brands.clone(), self.models.clone());
        let mut seen = HashSet::new();
        for listing in &mut self.listings {
            if !seen.insert(listing.id) {
                anyhow::bail!("Duplicate listing id {} in seed", listing.id);
            }
            let model = catalog
                .model(listing.model_id)
                .with_context(|| format!("Listing {} references unknown model {}", listing.id, listing.model_id))?;
            let brand = catalog
                .brand(model.brand_id)
                .with_context(|| format!("Model {} references unknown brand {}", model.id, model.brand_id))?;
            listing.brand_id = brand.id;
            listing.brand_name = brand.name.clone();
            listing.model_name = model.name.clone();
            if listing.body_type.is_empty() {
                listing.body_type = model.body_type.clone();
            }
        }
        Ok(())
    }

    pub fn into_parts(self) -> (InMemoryCatalog, Vec<Listing>) {
        (InMemoryCatalog::new(self.brands, self.models), self.listings)
    }
}

// Sorting and page slicing for search results

use crate::models::Listing;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    #[default]
    CreatedAt,
    Price,
    Year,
    Mileage,
    ViewsCount,
}

impl SortField {
    // Accepts "price" as well as the "-price" shorthand some clients send
    pub fn from_param(raw: &str) -> Option<Self> {
        match raw.trim().trim_start_matches('-') {
            "created_at" => Some(Self::CreatedAt),
            "price" => Some(Self::Price),
            "year" => Some(Self::Year),
            "mileage" => Some(Self::Mileage),
            "views_count" => Some(Self::ViewsCount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn from_param(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

/// Sort specification. The default is newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

impl SortSpec {
    /// Orders two listings; equal keys fall back to ascending id so page
    /// boundaries stay stable between identical requests.
    pub fn compare(&self, a: &Listing, b: &Listing) -> Ordering {
        let primary = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::Price => a.price.total_cmp(&b.price),
            SortField::Year => a.year.cmp(&b.year),
            SortField::Mileage => a.mileage.cmp(&b.mileage),
            SortField::ViewsCount => a.views_count.cmp(&b.views_count),
        };
        let primary = match self.direction {
            SortDirection::Asc => primary,
            SortDirection::Desc => primary.reverse(),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.page_size as usize
    }

    pub fn limit(&self) -> usize {
        self.page_size as usize
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, request: PageRequest) -> Self {
        let page_size = u64::from(request.page_size.max(1));
        let total_pages = total_count.div_ceil(page_size) as u32;
        Self {
            items,
            total_count,
            page: request.page,
            page_size: request.page_size,
            total_pages,
            has_next: u64::from(request.page) * page_size < total_count,
            has_previous: request.page > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_previous: self.has_previous,
        }
    }
}

/// Sorts `listings` in place and returns the requested window.
pub fn sort_and_slice(mut listings: Vec<Listing>, sort: SortSpec, request: PageRequest) -> Vec<Listing> {
    listings.sort_by(|a, b| sort.compare(a, b));
    listings
        .into_iter()
        .skip(request.offset())
        .take(request.limit())
        .collect()
}

use pitchside_shared::Money;
use serde::{Deserialize, Serialize};

use crate::category::ALL_CATEGORIES;
use crate::{CatalogError, Product};

pub const MAX_PAGE_SIZE: u32 = 100;

/// Query string of `GET /api/products`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceLow,
    PriceHigh,
    Rating,
    Name,
}

impl ProductSort {
    /// Unknown values fall back to newest first, like the storefront expects.
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price-low") => ProductSort::PriceLow,
            Some("price-high") => ProductSort::PriceHigh,
            Some("rating") => ProductSort::Rating,
            Some("name") => ProductSort::Name,
            _ => ProductSort::Newest,
        }
    }

    /// ORDER BY fragment; `p` is the products alias. Ties are broken by id so paging is stable.
    pub fn order_by(&self) -> &'static str {
        match self {
            ProductSort::Newest => "p.created_at DESC, p.id DESC",
            ProductSort::PriceLow => "p.price_minor ASC, p.id ASC",
            ProductSort::PriceHigh => "p.price_minor DESC, p.id ASC",
            ProductSort::Rating => "p.rating DESC, p.id ASC",
            ProductSort::Name => "p.name ASC, p.id ASC",
        }
    }
}

/// Normalized, validated listing filter
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFilter {
    pub category: Option<String>,
    pub min_price: Option<Money>,
    pub max_price: Option<Money>,
    pub search: Option<String>,
    pub sort: ProductSort,
    pub page: u32,
    pub limit: u32,
}

impl ProductQuery {
    pub fn into_filter(self, default_limit: u32) -> Result<ProductFilter, CatalogError> {
        let category = self
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty() && c != ALL_CATEGORIES);
        let search = self
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let min_price = self.min_price.map(Money::from_major);
        let max_price = self.max_price.map(Money::from_major);
        if let (Some(min), Some(max)) = (min_price, max_price) {
            if min > max {
                return Err(CatalogError::Validation(
                    "minPrice cannot be greater than maxPrice".into(),
                ));
            }
        }

        let page = self.page.unwrap_or(1);
        if page == 0 {
            return Err(CatalogError::Validation("page must be at least 1".into()));
        }
        let limit = self.limit.unwrap_or(default_limit);
        if limit == 0 || limit > MAX_PAGE_SIZE {
            return Err(CatalogError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }

        Ok(ProductFilter {
            category,
            min_price,
            max_price,
            search,
            sort: ProductSort::parse(self.sort_by.as_deref()),
            page,
            limit,
        })
    }
}

impl ProductFilter {
    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    /// ILIKE pattern for the name search.
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_ref().map(|s| {
            let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{}%", escaped)
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
    pub page: u32,
    pub total_pages: i64,
}

impl ProductPage {
    pub fn new(products: Vec<Product>, total: i64, filter: &ProductFilter) -> Self {
        let limit = filter.limit as i64;
        Self {
            products,
            total,
            page: filter.page,
            total_pages: (total + limit - 1) / limit,
        }
    }
}

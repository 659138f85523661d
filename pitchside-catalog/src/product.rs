use chrono::{DateTime, Utc};
use pitchside_shared::Money;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::CatalogError;

/// Product availability in the storefront
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Inactive,
    OutOfStock,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Inactive => "inactive",
            ProductStatus::OutOfStock => "out_of_stock",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProductStatus::Active),
            "inactive" => Ok(ProductStatus::Inactive),
            "out_of_stock" => Ok(ProductStatus::OutOfStock),
            other => Err(CatalogError::Validation(format!("Unknown product status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub image: Option<String>,
    pub stock: i32,
    pub status: ProductStatus,
    pub rating: f64,
    pub review_count: i32,
    pub sales_count: i32,
    pub badge: Option<String>,
    pub category_id: i32,
    /// Category name, joined in for listing pages.
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn is_purchasable(&self) -> bool {
        self.status == ProductStatus::Active && self.stock > 0
    }

    /// Keeps status consistent with stock: an active product with nothing left is out of stock,
    /// and an out-of-stock product that was refilled becomes active again.
    pub fn sync_status(&mut self) {
        match self.status {
            ProductStatus::Active if self.stock == 0 => self.status = ProductStatus::OutOfStock,
            ProductStatus::OutOfStock if self.stock > 0 => self.status = ProductStatus::Active,
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price: Money,
    pub original_price: Option<Money>,
    pub image: Option<String>,
    #[serde(default)]
    pub stock: i32,
    pub status: Option<ProductStatus>,
    pub rating: Option<f64>,
    pub badge: Option<String>,
    pub category_id: i32,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), CatalogError> {
        validate_fields(
            &self.name,
            self.price,
            self.original_price,
            self.stock,
            self.rating.unwrap_or(0.0),
        )
    }

    /// Status the row is stored with.
    pub fn initial_status(&self) -> ProductStatus {
        match self.status.unwrap_or_default() {
            ProductStatus::Active if self.stock == 0 => ProductStatus::OutOfStock,
            status => status,
        }
    }
}

/// Partial update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Money>,
    pub original_price: Option<Money>,
    pub image: Option<String>,
    pub stock: Option<i32>,
    pub status: Option<ProductStatus>,
    pub rating: Option<f64>,
    pub review_count: Option<i32>,
    pub badge: Option<String>,
    pub category_id: Option<i32>,
}

impl ProductPatch {
    /// Applies the patch and re-validates the result.
    pub fn apply(&self, product: &mut Product) -> Result<(), CatalogError> {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(original) = self.original_price {
            product.original_price = Some(original);
        }
        if let Some(image) = &self.image {
            product.image = Some(image.clone());
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(status) = self.status {
            product.status = status;
        }
        if let Some(rating) = self.rating {
            product.rating = rating;
        }
        if let Some(count) = self.review_count {
            if count < 0 {
                return Err(CatalogError::Validation("reviewCount cannot be negative".into()));
            }
            product.review_count = count;
        }
        if let Some(badge) = &self.badge {
            product.badge = Some(badge.clone());
        }
        if let Some(category_id) = self.category_id {
            product.category_id = category_id;
        }

        validate_fields(
            &product.name,
            product.price,
            product.original_price,
            product.stock,
            product.rating,
        )?;
        product.sync_status();
        product.updated_at = Utc::now();
        Ok(())
    }
}

fn validate_fields(
    name: &str,
    price: Money,
    original_price: Option<Money>,
    stock: i32,
    rating: f64,
) -> Result<(), CatalogError> {
    if name.trim().is_empty() {
        return Err(CatalogError::Validation("name should not be empty".into()));
    }
    if !price.is_positive() {
        return Err(CatalogError::Validation("price must be a positive number".into()));
    }
    if let Some(original) = original_price {
        if original < price {
            return Err(CatalogError::Validation(
                "originalPrice cannot be lower than price".into(),
            ));
        }
    }
    if stock < 0 {
        return Err(CatalogError::Validation("stock cannot be negative".into()));
    }
    if !(0.0..=5.0).contains(&rating) {
        return Err(CatalogError::Validation("rating must be between 0 and 5".into()));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn sample_product(id: i32, stock: i32) -> Product {
    let now = Utc::now();
    Product {
        id,
        name: format!("Ball {}", id),
        description: None,
        price: Money::from_minor(4500),
        original_price: None,
        image: None,
        stock,
        status: ProductStatus::Active,
        rating: 4.0,
        review_count: 0,
        sales_count: 0,
        badge: None,
        category_id: 1,
        category: Some("Balls".into()),
        created_at: now,
        updated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(stock: i32) -> NewProduct {
        NewProduct {
            name: "Match ball".into(),
            description: None,
            price: Money::from_minor(8900),
            original_price: Some(Money::from_minor(9900)),
            image: None,
            stock,
            status: None,
            rating: None,
            badge: Some("New".into()),
            category_id: 1,
        }
    }

    #[test]
    fn test_new_product_validation() {
        assert!(new_product(3).validate().is_ok());

        let mut cheap = new_product(3);
        cheap.original_price = Some(Money::from_minor(100));
        assert!(matches!(cheap.validate(), Err(CatalogError::Validation(_))));

        let mut free = new_product(3);
        free.price = Money::ZERO;
        assert!(free.validate().is_err());
    }

    #[test]
    fn test_zero_stock_starts_out_of_stock() {
        assert_eq!(new_product(0).initial_status(), ProductStatus::OutOfStock);
        assert_eq!(new_product(5).initial_status(), ProductStatus::Active);

        let mut hidden = new_product(0);
        hidden.status = Some(ProductStatus::Inactive);
        assert_eq!(hidden.initial_status(), ProductStatus::Inactive);
    }

    #[test]
    fn test_patch_refill_reactivates() {
        let mut product = sample_product(1, 0);
        product.status = ProductStatus::OutOfStock;

        let patch = ProductPatch { stock: Some(10), ..Default::default() };
        patch.apply(&mut product).unwrap();
        assert_eq!(product.status, ProductStatus::Active);

        let bad = ProductPatch { stock: Some(-1), ..Default::default() };
        assert!(bad.apply(&mut product).is_err());
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&ProductStatus::OutOfStock).unwrap();
        assert_eq!(json, "\"out_of_stock\"");
        assert_eq!("inactive".parse::<ProductStatus>().unwrap(), ProductStatus::Inactive);
    }
}

pub mod product;
pub mod category;
pub mod query;
pub mod inventory;

pub use product::{Product, ProductStatus, NewProduct, ProductPatch};
pub use category::{Category, NewCategory, CategoryPatch};
pub use query::{ProductQuery, ProductFilter, ProductSort, ProductPage};
pub use inventory::{apply_sale, resize_sale, restock};

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient stock for product {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: i32,
        requested: i32,
        available: i32,
    },
}

impl CatalogError {
    pub fn product_not_found(id: i32) -> Self {
        CatalogError::NotFound(format!("Product with ID {} not found", id))
    }

    pub fn category_not_found(id: i32) -> Self {
        CatalogError::NotFound(format!("Category with ID {} not found", id))
    }
}

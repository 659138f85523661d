use crate::{CatalogError, Product, ProductStatus};
use std::cmp::Ordering;

/// Takes `quantity` units out of stock for a sale.
///
/// The product must be active and hold enough units. Sales are counted and a product whose
/// stock reaches zero flips to out of stock.
pub fn apply_sale(product: &mut Product, quantity: i32) -> Result<(), CatalogError> {
    if quantity <= 0 {
        return Err(CatalogError::Validation("quantity must be a positive number".into()));
    }
    if product.status == ProductStatus::Inactive {
        return Err(CatalogError::Conflict(format!(
            "Product {} is not available for sale",
            product.id
        )));
    }
    if product.stock < quantity {
        return Err(CatalogError::InsufficientStock {
            product_id: product.id,
            requested: quantity,
            available: product.stock,
        });
    }

    product.stock -= quantity;
    product.sales_count += quantity;
    product.sync_status();
    Ok(())
}

/// Puts units back after a cancelled or deleted order.
pub fn restock(product: &mut Product, quantity: i32) {
    product.stock += quantity.max(0);
    product.sales_count = product.sales_count.saturating_sub(quantity.max(0)).max(0);
    product.sync_status();
}

/// Moves stock when a sold line goes from `before` to `after` units.
pub fn resize_sale(product: &mut Product, before: i32, after: i32) -> Result<(), CatalogError> {
    match after.cmp(&before) {
        Ordering::Greater => apply_sale(product, after - before),
        Ordering::Less => {
            restock(product, before - after);
            Ok(())
        }
        Ordering::Equal => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::sample_product;

    #[test]
    fn test_stock_lifecycle() {
        let mut product = sample_product(7, 3);

        apply_sale(&mut product, 2).unwrap();
        assert_eq!(product.stock, 1);
        assert_eq!(product.sales_count, 2);
        assert_eq!(product.status, ProductStatus::Active);

        apply_sale(&mut product, 1).unwrap();
        assert_eq!(product.stock, 0);
        assert_eq!(product.status, ProductStatus::OutOfStock);

        restock(&mut product, 3);
        assert_eq!(product.stock, 3);
        assert_eq!(product.sales_count, 0);
        assert_eq!(product.status, ProductStatus::Active);
    }

    #[test]
    fn test_oversell_rejected() {
        let mut product = sample_product(7, 1);
        let err = apply_sale(&mut product, 2).unwrap_err();
        assert!(matches!(
            err,
            CatalogError::InsufficientStock { requested: 2, available: 1, .. }
        ));
        assert_eq!(product.stock, 1);
    }

    #[test]
    fn test_inactive_product_cannot_be_sold() {
        let mut product = sample_product(7, 5);
        product.status = ProductStatus::Inactive;
        assert!(matches!(apply_sale(&mut product, 1), Err(CatalogError::Conflict(_))));
    }

    #[test]
    fn test_resize_sale_moves_only_the_difference() {
        let mut product = sample_product(7, 9);
        resize_sale(&mut product, 1, 5).unwrap();
        assert_eq!(product.stock, 5);

        resize_sale(&mut product, 5, 2).unwrap();
        assert_eq!(product.stock, 8);

        let err = resize_sale(&mut product, 2, 20).unwrap_err();
        assert!(matches!(err, CatalogError::InsufficientStock { requested: 18, available: 8, .. }));
        assert_eq!(product.stock, 8);
    }
}

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pitchside_catalog::{Category, CatalogError, NewCategory, NewProduct, Product, ProductFilter};
use pitchside_core::repository::{CategoryRepository, ProductRepository};
use pitchside_core::RepoResult;
use pitchside_shared::Money;
use sqlx::{PgPool, Postgres, QueryBuilder};

pub struct StoreCategoryRepository {
    pool: PgPool,
}

impl StoreCategoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    icon: Option<String>,
    product_count: i32,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            icon: row.icon,
            product_count: row.product_count,
        }
    }
}

#[async_trait]
impl CategoryRepository for StoreCategoryRepository {
    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>("SELECT id, name, icon, product_count FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn get_category(&self, id: i32) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>("SELECT id, name, icon, product_count FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Category::from))
    }

    async fn find_category_by_name(&self, name: &str) -> RepoResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, icon, product_count FROM categories WHERE lower(name) = lower($1)",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn create_category(&self, category: &NewCategory) -> RepoResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name, icon) VALUES ($1, $2) RETURNING id, name, icon, product_count",
        )
        .bind(category.name.trim())
        .bind(&category.icon)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn update_category(&self, category: &Category) -> RepoResult<()> {
        sqlx::query("UPDATE categories SET name = $2, icon = $3 WHERE id = $1")
            .bind(category.id)
            .bind(&category.name)
            .bind(&category.icon)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_category(&self, id: i32) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

pub struct StoreProductRepository {
    pool: PgPool,
}

impl StoreProductRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

pub(crate) const PRODUCT_SELECT: &str = "SELECT p.id, p.name, p.description, p.price_minor, p.original_price_minor, \
    p.image, p.stock, p.status, p.rating, p.review_count, p.sales_count, p.badge, p.category_id, \
    c.name AS category_name, p.created_at, p.updated_at \
    FROM products p JOIN categories c ON c.id = p.category_id";

#[derive(sqlx::FromRow)]
pub(crate) struct ProductRow {
    id: i32,
    name: String,
    description: Option<String>,
    price_minor: i64,
    original_price_minor: Option<i64>,
    image: Option<String>,
    stock: i32,
    status: String,
    rating: f64,
    review_count: i32,
    sales_count: i32,
    badge: Option<String>,
    category_id: i32,
    category_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = CatalogError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price: Money::from_minor(row.price_minor),
            original_price: row.original_price_minor.map(Money::from_minor),
            image: row.image,
            stock: row.stock,
            status: row.status.parse()?,
            rating: row.rating,
            review_count: row.review_count,
            sales_count: row.sales_count,
            badge: row.badge,
            category_id: row.category_id,
            category: row.category_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &ProductFilter) {
    qb.push(" WHERE TRUE");
    if let Some(category) = &filter.category {
        qb.push(" AND lower(c.name) = lower(").push_bind(category.clone()).push(")");
    }
    if let Some(min) = filter.min_price {
        qb.push(" AND p.price_minor >= ").push_bind(min.minor());
    }
    if let Some(max) = filter.max_price {
        qb.push(" AND p.price_minor <= ").push_bind(max.minor());
    }
    if let Some(pattern) = filter.search_pattern() {
        qb.push(" AND p.name ILIKE ").push_bind(pattern);
    }
}

pub(crate) async fn fetch_product<'e, E>(executor: E, id: i32, lock: bool) -> RepoResult<Option<Product>>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let sql = format!("{} WHERE p.id = $1{}", PRODUCT_SELECT, if lock { " FOR UPDATE OF p" } else { "" });
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(Product::try_from).transpose()?)
}

/// Writes stock, sales and status of a product back after a sale or a restock.
pub(crate) async fn save_stock<'e, E>(executor: E, product: &Product) -> RepoResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    sqlx::query("UPDATE products SET stock = $2, sales_count = $3, status = $4, updated_at = NOW() WHERE id = $1")
        .bind(product.id)
        .bind(product.stock)
        .bind(product.sales_count)
        .bind(product.status.as_str())
        .execute(executor)
        .await?;
    Ok(())
}

#[async_trait]
impl ProductRepository for StoreProductRepository {
    async fn list_products(&self, filter: &ProductFilter) -> RepoResult<(Vec<Product>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new(
            "SELECT COUNT(*) FROM products p JOIN categories c ON c.id = p.category_id",
        );
        push_filters(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let mut page = QueryBuilder::<Postgres>::new(PRODUCT_SELECT);
        push_filters(&mut page, filter);
        page.push(" ORDER BY ").push(filter.sort.order_by());
        page.push(" LIMIT ").push_bind(filter.limit as i64);
        page.push(" OFFSET ").push_bind(filter.offset());
        let rows: Vec<ProductRow> = page.build_query_as().fetch_all(&self.pool).await?;

        let products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((products, total))
    }

    async fn get_product(&self, id: i32) -> RepoResult<Option<Product>> {
        fetch_product(&self.pool, id, false).await
    }

    async fn create_product(&self, product: &NewProduct) -> RepoResult<Product> {
        let mut tx = self.pool.begin().await?;

        let (id,): (i32,) = sqlx::query_as(
            r#"
            INSERT INTO products (name, description, price_minor, original_price_minor, image, stock, status,
                                  rating, badge, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(product.name.trim())
        .bind(&product.description)
        .bind(product.price.minor())
        .bind(product.original_price.map(Money::minor))
        .bind(&product.image)
        .bind(product.stock)
        .bind(product.initial_status().as_str())
        .bind(product.rating.unwrap_or(0.0))
        .bind(&product.badge)
        .bind(product.category_id)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE categories SET product_count = product_count + 1 WHERE id = $1")
            .bind(product.category_id)
            .execute(&mut *tx)
            .await?;

        let created = fetch_product(&mut *tx, id, false).await?.ok_or_else(|| CatalogError::product_not_found(id))?;
        tx.commit().await?;
        Ok(created)
    }

    async fn update_product(&self, product: &Product, previous_category: i32) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE products SET
                name = $2, description = $3, price_minor = $4, original_price_minor = $5, image = $6,
                stock = $7, status = $8, rating = $9, review_count = $10, badge = $11, category_id = $12,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price.minor())
        .bind(product.original_price.map(Money::minor))
        .bind(&product.image)
        .bind(product.stock)
        .bind(product.status.as_str())
        .bind(product.rating)
        .bind(product.review_count)
        .bind(&product.badge)
        .bind(product.category_id)
        .execute(&mut *tx)
        .await?;

        if previous_category != product.category_id {
            sqlx::query("UPDATE categories SET product_count = GREATEST(product_count - 1, 0) WHERE id = $1")
                .bind(previous_category)
                .execute(&mut *tx)
                .await?;
            sqlx::query("UPDATE categories SET product_count = product_count + 1 WHERE id = $1")
                .bind(product.category_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn delete_product(&self, product: &Product) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(product.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE categories SET product_count = GREATEST(product_count - 1, 0) WHERE id = $1")
            .bind(product.category_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn count_products(&self) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

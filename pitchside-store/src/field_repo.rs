use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use pitchside_booking::field::FieldSearch;
use pitchside_booking::{Field, Terrain, TimeOfDay};
use pitchside_core::repository::{FieldRepository, TerrainRepository};
use pitchside_core::RepoResult;
use pitchside_shared::Money;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

pub struct StoreFieldRepository {
    pool: PgPool,
}

impl StoreFieldRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FIELD_SELECT: &str = "SELECT id, owner_id, name, description, address, city, price_per_hour_minor, match_duration, \
    has_showers, has_water, is_indoor, image, number_of_terrains, opening_time, closing_time, created_at, updated_at \
    FROM fields";

#[derive(sqlx::FromRow)]
struct FieldRow {
    id: Uuid,
    owner_id: Uuid,
    name: String,
    description: Option<String>,
    address: String,
    city: String,
    price_per_hour_minor: i64,
    match_duration: i32,
    has_showers: bool,
    has_water: bool,
    is_indoor: bool,
    image: Option<String>,
    number_of_terrains: i32,
    opening_time: NaiveTime,
    closing_time: NaiveTime,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<FieldRow> for Field {
    fn from(row: FieldRow) -> Self {
        Field {
            id: row.id,
            owner_id: row.owner_id,
            name: row.name,
            description: row.description,
            address: row.address,
            city: row.city,
            price_per_hour: Money::from_minor(row.price_per_hour_minor),
            match_duration: row.match_duration,
            has_showers: row.has_showers,
            has_water: row.has_water,
            is_indoor: row.is_indoor,
            image: row.image,
            number_of_terrains: row.number_of_terrains,
            opening_time: TimeOfDay::from_naive(row.opening_time),
            closing_time: TimeOfDay::from_naive(row.closing_time),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct TerrainRow {
    id: Uuid,
    field_id: Uuid,
    name: String,
    is_active: bool,
}

impl From<TerrainRow> for Terrain {
    fn from(row: TerrainRow) -> Self {
        Terrain {
            id: row.id,
            field_id: row.field_id,
            name: row.name,
            is_active: row.is_active,
        }
    }
}

async fn insert_terrains(conn: &mut PgConnection, field_id: Uuid, names: &[String]) -> RepoResult<Vec<Terrain>> {
    let mut terrains = Vec::with_capacity(names.len());
    for name in names {
        let terrain = Terrain {
            id: Uuid::new_v4(),
            field_id,
            name: name.clone(),
            is_active: true,
        };
        sqlx::query("INSERT INTO terrains (id, field_id, name, is_active) VALUES ($1, $2, $3, $4)")
            .bind(terrain.id)
            .bind(terrain.field_id)
            .bind(&terrain.name)
            .bind(terrain.is_active)
            .execute(&mut *conn)
            .await?;
        terrains.push(terrain);
    }
    Ok(terrains)
}

#[async_trait]
impl FieldRepository for StoreFieldRepository {
    async fn create_field(&self, field: &Field, terrain_names: &[String]) -> RepoResult<Vec<Terrain>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO fields (id, owner_id, name, description, address, city, price_per_hour_minor, match_duration,
                                has_showers, has_water, is_indoor, image, number_of_terrains, opening_time,
                                closing_time, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(field.id)
        .bind(field.owner_id)
        .bind(&field.name)
        .bind(&field.description)
        .bind(&field.address)
        .bind(&field.city)
        .bind(field.price_per_hour.minor())
        .bind(field.match_duration)
        .bind(field.has_showers)
        .bind(field.has_water)
        .bind(field.is_indoor)
        .bind(&field.image)
        .bind(field.number_of_terrains)
        .bind(field.opening_time.to_naive())
        .bind(field.closing_time.to_naive())
        .bind(field.created_at)
        .bind(field.updated_at)
        .execute(&mut *tx)
        .await?;

        let terrains = insert_terrains(&mut tx, field.id, terrain_names).await?;
        tx.commit().await?;
        Ok(terrains)
    }

    async fn get_field(&self, id: Uuid) -> RepoResult<Option<Field>> {
        let row = sqlx::query_as::<_, FieldRow>(&format!("{} WHERE id = $1", FIELD_SELECT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Field::from))
    }

    async fn list_fields(&self, search: &FieldSearch) -> RepoResult<Vec<Field>> {
        let mut qb = QueryBuilder::<Postgres>::new(FIELD_SELECT);
        qb.push(" WHERE TRUE");
        if let Some(city) = &search.city {
            qb.push(" AND lower(city) = lower(").push_bind(city.clone()).push(")");
        }
        if let Some(max) = search.max_price_per_hour {
            qb.push(" AND price_per_hour_minor <= ").push_bind(max.minor());
        }
        if let Some(flag) = search.has_showers {
            qb.push(" AND has_showers = ").push_bind(flag);
        }
        if let Some(flag) = search.has_water {
            qb.push(" AND has_water = ").push_bind(flag);
        }
        if let Some(flag) = search.is_indoor {
            qb.push(" AND is_indoor = ").push_bind(flag);
        }
        qb.push(" ORDER BY created_at DESC");

        let rows: Vec<FieldRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Field::from).collect())
    }

    async fn list_fields_by_owner(&self, owner_id: Uuid) -> RepoResult<Vec<Field>> {
        let rows = sqlx::query_as::<_, FieldRow>(&format!("{} WHERE owner_id = $1 ORDER BY created_at DESC", FIELD_SELECT))
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(Field::from).collect())
    }

    async fn update_field(&self, field: &Field, add_terrains: &[String], remove_terrains: &[Uuid]) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            UPDATE fields SET
                name = $2, description = $3, address = $4, city = $5, price_per_hour_minor = $6,
                match_duration = $7, has_showers = $8, has_water = $9, is_indoor = $10, image = $11,
                number_of_terrains = $12, opening_time = $13, closing_time = $14, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(field.id)
        .bind(&field.name)
        .bind(&field.description)
        .bind(&field.address)
        .bind(&field.city)
        .bind(field.price_per_hour.minor())
        .bind(field.match_duration)
        .bind(field.has_showers)
        .bind(field.has_water)
        .bind(field.is_indoor)
        .bind(&field.image)
        .bind(field.number_of_terrains)
        .bind(field.opening_time.to_naive())
        .bind(field.closing_time.to_naive())
        .execute(&mut *tx)
        .await?;

        if !remove_terrains.is_empty() {
            sqlx::query("DELETE FROM terrains WHERE field_id = $1 AND id = ANY($2)")
                .bind(field.id)
                .bind(remove_terrains)
                .execute(&mut *tx)
                .await?;
        }
        insert_terrains(&mut tx, field.id, add_terrains).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn delete_field(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM fields WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_fields(&self) -> RepoResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM fields")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

pub struct StoreTerrainRepository {
    pool: PgPool,
}

impl StoreTerrainRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TerrainRepository for StoreTerrainRepository {
    async fn list_terrains(&self, field_id: Uuid) -> RepoResult<Vec<Terrain>> {
        // natural order, so "Terrain 10" follows "Terrain 9"
        let rows = sqlx::query_as::<_, TerrainRow>(
            "SELECT id, field_id, name, is_active FROM terrains WHERE field_id = $1 ORDER BY length(name), name",
        )
        .bind(field_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Terrain::from).collect())
    }

    async fn get_terrain(&self, id: Uuid) -> RepoResult<Option<Terrain>> {
        let row = sqlx::query_as::<_, TerrainRow>("SELECT id, field_id, name, is_active FROM terrains WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Terrain::from))
    }

    async fn update_terrain(&self, terrain: &Terrain) -> RepoResult<()> {
        sqlx::query("UPDATE terrains SET name = $2, is_active = $3 WHERE id = $1")
            .bind(terrain.id)
            .bind(&terrain.name)
            .bind(terrain.is_active)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_terrain(&self, id: Uuid) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;
        let field: Option<(Uuid,)> = sqlx::query_as("DELETE FROM terrains WHERE id = $1 RETURNING field_id")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if let Some((field_id,)) = field {
            sqlx::query(
                "UPDATE fields SET number_of_terrains = GREATEST(number_of_terrains - 1, 1), updated_at = NOW() WHERE id = $1",
            )
            .bind(field_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(field.is_some())
    }

    async fn has_upcoming_approved(&self, terrain_id: Uuid, from: NaiveDate) -> RepoResult<bool> {
        let (exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM reservations WHERE terrain_id = $1 AND status = 'APPROVED' AND date >= $2)",
        )
        .bind(terrain_id)
        .bind(from)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

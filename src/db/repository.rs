//! Database repository for donated objects.
//!
//! Maps `DonatedObject` to and from rows of the `objects` table. Every
//! mutation is a single statement, except updates, which read and write
//! inside one transaction.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::{Row, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    Category, Condition, DimensionUnit, Dimensions, DonatedObject, Donor, GroupCount, Location,
    ObjectDraft,
};

/// Columns rewritten on every update, in binding order.
macro_rules! mutable_columns {
    () => {
        "name, category, description, item_condition, \
         location_city, location_city_key, location_neighborhood, \
         donor_name, donor_phone, donor_email, available, donation_date, images, \
         dimensions_width, dimensions_height, dimensions_depth, dimensions_unit, updated_at"
    };
}

macro_rules! mutable_placeholders {
    () => {
        "?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?"
    };
}

macro_rules! object_columns {
    () => {
        concat!("id, created_at, ", mutable_columns!())
    };
}

/// Conjunction of optional constraints; `None` leaves a field unconstrained.
macro_rules! filter_clause {
    () => {
        "WHERE (? IS NULL OR category = ?) \
         AND (? IS NULL OR instr(location_city_key, ?) > 0) \
         AND (? IS NULL OR item_condition = ?) \
         AND (? IS NULL OR available = ?)"
    };
}

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, <Sqlite as sqlx::Database>::Arguments<'q>>;

/// Selection criteria for listing and counting objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectFilter {
    /// Exact category wire value
    pub category: Option<String>,
    /// Case-insensitive substring of the city
    pub city: Option<String>,
    /// Exact condition wire value
    pub condition: Option<String>,
    pub available: Option<bool>,
}

impl ObjectFilter {
    fn bind<'q>(&self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        let city_key = self.city.as_ref().map(|c| c.to_lowercase());
        let available = self.available.map(i32::from);
        query
            .bind(self.category.clone())
            .bind(self.category.clone())
            .bind(city_key.clone())
            .bind(city_key)
            .bind(self.condition.clone())
            .bind(self.condition.clone())
            .bind(available)
            .bind(available)
    }
}

/// Field an aggregation groups by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupField {
    Category,
    City,
}

impl GroupField {
    fn column(self) -> &'static str {
        match self {
            GroupField::Category => "category",
            GroupField::City => "location_city",
        }
    }
}

/// Database repository for all data operations.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Close every pooled connection. Used on shutdown.
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// List up to `limit` objects matching `filter`, newest donation first.
    pub async fn list_matching(
        &self,
        filter: &ObjectFilter,
        limit: i64,
    ) -> Result<Vec<DonatedObject>, AppError> {
        let query = sqlx::query(concat!(
            "SELECT ",
            object_columns!(),
            " FROM objects ",
            filter_clause!(),
            " ORDER BY donation_date DESC, created_at DESC LIMIT ?"
        ));

        let rows = filter.bind(query).bind(limit).fetch_all(&self.pool).await?;

        rows.iter().map(object_from_row).collect()
    }

    /// Get an object by ID.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<DonatedObject>, AppError> {
        let id = parse_id(id)?;
        let row = sqlx::query(concat!(
            "SELECT ",
            object_columns!(),
            " FROM objects WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(object_from_row).transpose()
    }

    /// Validate and store a new object.
    pub async fn insert(&self, draft: ObjectDraft) -> Result<DonatedObject, AppError> {
        let now = timestamp();
        let mut valid = draft.validate(now)?;
        valid.donation_date = valid.donation_date.trunc_subsecs(3);
        let object = DonatedObject::from_valid(Uuid::new_v4().to_string(), valid, now);

        let query = sqlx::query(concat!(
            "INSERT INTO objects (",
            object_columns!(),
            ") VALUES (?, ?, ",
            mutable_placeholders!(),
            ")"
        ))
        .bind(object.id.clone())
        .bind(encode_timestamp(object.created_at));

        bind_fields(query, &object)?.execute(&self.pool).await?;

        tracing::debug!(id = %object.id, "object created");
        Ok(object)
    }

    /// Merge `patch` onto the stored object, re-validate, and store the result.
    ///
    /// The read and the write share one transaction that holds the write lock
    /// from its first statement, so no other write can land between them.
    pub async fn update_by_id(
        &self,
        id: &str,
        patch: ObjectDraft,
    ) -> Result<Option<DonatedObject>, AppError> {
        let id = parse_id(id)?;
        let mut tx = self.pool.begin().await?;

        // A no-op write takes the lock and returns the current row
        let row = sqlx::query(concat!(
            "UPDATE objects SET updated_at = updated_at WHERE id = ? RETURNING ",
            object_columns!()
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(existing) = row.as_ref().map(object_from_row).transpose()? else {
            return Ok(None);
        };

        let now = timestamp();
        let mut valid = patch.merged_onto(&existing).validate(now)?;
        valid.donation_date = valid.donation_date.trunc_subsecs(3);
        let updated = DonatedObject {
            created_at: existing.created_at,
            ..DonatedObject::from_valid(existing.id.clone(), valid, now)
        };

        let query = sqlx::query(concat!(
            "UPDATE objects SET (",
            mutable_columns!(),
            ") = (",
            mutable_placeholders!(),
            ") WHERE id = ?"
        ));
        bind_fields(query, &updated)?
            .bind(updated.id.clone())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    /// Set only the availability flag, without validation.
    pub async fn set_availability(
        &self,
        id: &str,
        available: bool,
    ) -> Result<Option<DonatedObject>, AppError> {
        let id = parse_id(id)?;
        let row = sqlx::query(concat!(
            "UPDATE objects SET available = ?, updated_at = ? WHERE id = ? RETURNING ",
            object_columns!()
        ))
        .bind(i32::from(available))
        .bind(encode_timestamp(timestamp()))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(object_from_row).transpose()
    }

    /// Delete an object, returning what was removed.
    pub async fn delete_by_id(&self, id: &str) -> Result<Option<DonatedObject>, AppError> {
        let id = parse_id(id)?;
        let row = sqlx::query(concat!(
            "DELETE FROM objects WHERE id = ? RETURNING ",
            object_columns!()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(object_from_row).transpose()
    }

    /// Count objects matching `filter`; the default filter counts everything.
    pub async fn count(&self, filter: &ObjectFilter) -> Result<i64, AppError> {
        let query = sqlx::query(concat!("SELECT COUNT(*) FROM objects ", filter_clause!()));
        let row = filter.bind(query).fetch_one(&self.pool).await?;
        Ok(row.try_get(0)?)
    }

    /// Count objects per distinct value of `field`, largest groups first.
    pub async fn aggregate_count(
        &self,
        field: GroupField,
        limit: Option<i64>,
    ) -> Result<Vec<GroupCount>, AppError> {
        let sql = format!(
            "SELECT {column} AS group_key, COUNT(*) AS group_count FROM objects \
             GROUP BY {column} ORDER BY group_count DESC, group_key ASC LIMIT ?",
            column = field.column()
        );

        // SQLite treats a negative limit as unbounded
        let rows = sqlx::query(&sql)
            .bind(limit.unwrap_or(-1))
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<GroupCount, AppError> {
                Ok(GroupCount {
                    key: row.try_get("group_key")?,
                    count: row.try_get("group_count")?,
                })
            })
            .collect()
    }
}

/// Canonical form of a well-formed identifier.
fn parse_id(id: &str) -> Result<String, AppError> {
    Uuid::parse_str(id)
        .map(|uuid| uuid.to_string())
        .map_err(|e| AppError::InvalidIdentifier(format!("Invalid object id '{}': {}", id, e)))
}

/// Current time at the precision the table stores.
fn timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, AppError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| AppError::Database(format!("Invalid timestamp '{}': {}", raw, e)))
}

fn bind_fields<'q>(
    query: SqliteQuery<'q>,
    object: &DonatedObject,
) -> Result<SqliteQuery<'q>, AppError> {
    let images = serde_json::to_string(&object.images)?;
    let dimensions = object.dimensions.as_ref();

    Ok(query
        .bind(object.name.clone())
        .bind(object.category.as_str())
        .bind(object.description.clone())
        .bind(object.condition.as_str())
        .bind(object.location.city.clone())
        .bind(object.location.city.to_lowercase())
        .bind(object.location.neighborhood.clone())
        .bind(object.donor.name.clone())
        .bind(object.donor.phone.clone())
        .bind(object.donor.email.clone())
        .bind(i32::from(object.available))
        .bind(encode_timestamp(object.donation_date))
        .bind(images)
        .bind(dimensions.and_then(|d| d.width))
        .bind(dimensions.and_then(|d| d.height))
        .bind(dimensions.and_then(|d| d.depth))
        .bind(dimensions.map(|d| d.unit.as_str()))
        .bind(encode_timestamp(object.updated_at)))
}

fn object_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<DonatedObject, AppError> {
    let category: String = row.try_get("category")?;
    let condition: String = row.try_get("item_condition")?;
    let available: i32 = row.try_get("available")?;
    let images: String = row.try_get("images")?;
    let unit: Option<String> = row.try_get("dimensions_unit")?;
    let donation_date: String = row.try_get("donation_date")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    let dimensions = match unit {
        Some(unit) => Some(Dimensions {
            width: row.try_get("dimensions_width")?,
            height: row.try_get("dimensions_height")?,
            depth: row.try_get("dimensions_depth")?,
            unit: DimensionUnit::from_wire(&unit)
                .ok_or_else(|| AppError::Database(format!("Unknown dimension unit '{}'", unit)))?,
        }),
        None => None,
    };

    Ok(DonatedObject {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        category: Category::from_wire(&category)
            .ok_or_else(|| AppError::Database(format!("Unknown category '{}'", category)))?,
        description: row.try_get("description")?,
        condition: Condition::from_wire(&condition)
            .ok_or_else(|| AppError::Database(format!("Unknown condition '{}'", condition)))?,
        location: Location {
            city: row.try_get("location_city")?,
            neighborhood: row.try_get("location_neighborhood")?,
        },
        donor: Donor {
            name: row.try_get("donor_name")?,
            phone: row.try_get("donor_phone")?,
            email: row.try_get("donor_email")?,
        },
        available: available != 0,
        donation_date: decode_timestamp(&donation_date)?,
        images: serde_json::from_str(&images)?,
        dimensions,
        created_at: decode_timestamp(&created_at)?,
        updated_at: decode_timestamp(&updated_at)?,
    })
}

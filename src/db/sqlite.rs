use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;

use crate::db::schema_sqlite::{bookings, resources, room_bookings, user_activity, users};

use super::{
    models::{
        ActivityEntry, ActivityType, Booking, BookingStatus, Resource, ResourceKind, Role,
        RoomBooking, User,
    },
    stores::{ActivityFilter, BookingFilter},
    DatabaseError,
};

// SQLite stores timestamps as ISO-8601 text
fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {e}")))
}

fn date_to_string(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn string_to_date(s: &str) -> Result<NaiveDate, DatabaseError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| DatabaseError::Query(format!("invalid date format: {e}")))
}

fn map_insert_error(e: diesel::result::Error) -> DatabaseError {
    match e {
        diesel::result::Error::DatabaseError(
            diesel::result::DatabaseErrorKind::UniqueViolation,
            info,
        ) => DatabaseError::Conflict(info.message().to_string()),
        other => DatabaseError::Query(other.to_string()),
    }
}

fn establish_connection(path: &str) -> Result<SqliteConnection, DatabaseError> {
    SqliteConnection::establish(path).map_err(|e| DatabaseError::Connection(e.to_string()))
}

// SQLite uses i32 for INTEGER primary keys; the store API keeps i64
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = resources)]
struct DbResource {
    id: i32,
    name: String,
    kind: String,
    units: i32,
    seats_per_unit: i32,
    open_minute: Option<i32>,
    close_minute: Option<i32>,
    slot_minutes: Option<i32>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl DbResource {
    fn to_resource(&self) -> Result<Resource, DatabaseError> {
        Ok(Resource {
            id: self.id as i64,
            name: self.name.clone(),
            kind: ResourceKind::parse(&self.kind)
                .ok_or_else(|| DatabaseError::Query(format!("unknown resource kind: {}", self.kind)))?,
            units: self.units,
            seats_per_unit: self.seats_per_unit,
            open_minute: self.open_minute,
            close_minute: self.close_minute,
            slot_minutes: self.slot_minutes,
            is_active: self.is_active,
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = resources)]
struct NewResource<'a> {
    name: &'a str,
    kind: &'a str,
    units: i32,
    seats_per_unit: i32,
    open_minute: Option<i32>,
    close_minute: Option<i32>,
    slot_minutes: Option<i32>,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

#[derive(AsChangeset)]
#[diesel(table_name = resources)]
#[diesel(treat_none_as_null = true)]
struct UpdateResource<'a> {
    name: &'a str,
    kind: &'a str,
    units: i32,
    seats_per_unit: i32,
    open_minute: Option<i32>,
    close_minute: Option<i32>,
    slot_minutes: Option<i32>,
    is_active: bool,
    updated_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
struct DbUser {
    id: i32,
    username: String,
    display_name: String,
    email: Option<String>,
    role: String,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

impl DbUser {
    fn to_user(&self) -> Result<User, DatabaseError> {
        Ok(User {
            id: self.id as i64,
            username: self.username.clone(),
            display_name: self.display_name.clone(),
            email: self.email.clone(),
            role: Role::parse(&self.role)
                .ok_or_else(|| DatabaseError::Query(format!("unknown role: {}", self.role)))?,
            is_active: self.is_active,
            created_at: string_to_datetime(&self.created_at)?,
            updated_at: string_to_datetime(&self.updated_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
struct NewUser<'a> {
    username: &'a str,
    display_name: &'a str,
    email: Option<&'a str>,
    role: &'a str,
    is_active: bool,
    created_at: String,
    updated_at: String,
}

#[derive(AsChangeset)]
#[diesel(table_name = users)]
#[diesel(treat_none_as_null = true)]
struct UpdateUser<'a> {
    display_name: &'a str,
    email: Option<&'a str>,
    role: &'a str,
    is_active: bool,
    updated_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = bookings)]
struct DbBooking {
    id: i32,
    user_id: i32,
    resource_id: i32,
    seat_number: i32,
    booking_date: String,
    status: String,
    created_at: String,
}

impl DbBooking {
    fn to_booking(&self) -> Result<Booking, DatabaseError> {
        Ok(Booking {
            id: self.id as i64,
            user_id: self.user_id as i64,
            resource_id: self.resource_id as i64,
            seat_number: self.seat_number,
            booking_date: string_to_date(&self.booking_date)?,
            status: BookingStatus::parse(&self.status)
                .ok_or_else(|| DatabaseError::Query(format!("unknown status: {}", self.status)))?,
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = bookings)]
struct NewBooking<'a> {
    user_id: i32,
    resource_id: i32,
    seat_number: i32,
    booking_date: String,
    status: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = room_bookings)]
struct DbRoomBooking {
    id: i32,
    user_id: i32,
    resource_id: i32,
    slot_number: i32,
    booking_date: String,
    status: String,
    created_at: String,
}

impl DbRoomBooking {
    fn to_room_booking(&self) -> Result<RoomBooking, DatabaseError> {
        Ok(RoomBooking {
            id: self.id as i64,
            user_id: self.user_id as i64,
            resource_id: self.resource_id as i64,
            slot_number: self.slot_number,
            booking_date: string_to_date(&self.booking_date)?,
            status: BookingStatus::parse(&self.status)
                .ok_or_else(|| DatabaseError::Query(format!("unknown status: {}", self.status)))?,
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = room_bookings)]
struct NewRoomBooking<'a> {
    user_id: i32,
    resource_id: i32,
    slot_number: i32,
    booking_date: String,
    status: &'a str,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = user_activity)]
struct DbActivityEntry {
    id: i32,
    user_id: i32,
    activity_type: String,
    booking_date: String,
    detail: Option<String>,
    recorded_at: String,
}

impl DbActivityEntry {
    fn to_entry(&self) -> Result<ActivityEntry, DatabaseError> {
        Ok(ActivityEntry {
            id: self.id as i64,
            user_id: self.user_id as i64,
            activity_type: ActivityType::parse(&self.activity_type).ok_or_else(|| {
                DatabaseError::Query(format!("unknown activity type: {}", self.activity_type))
            })?,
            booking_date: string_to_date(&self.booking_date)?,
            detail: self.detail.clone(),
            recorded_at: string_to_datetime(&self.recorded_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = user_activity)]
struct NewActivityEntry<'a> {
    user_id: i32,
    activity_type: &'a str,
    booking_date: String,
    detail: Option<&'a str>,
    recorded_at: String,
}

pub struct SqliteResourceStore {
    db_path: Arc<String>,
}

impl SqliteResourceStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::ResourceStore for SqliteResourceStore {
    async fn get_resource(&self, resource_id: i64) -> Result<Option<Resource>, DatabaseError> {
        let resource_id = resource_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::resources::dsl::*;
            resources
                .filter(id.eq(resource_id))
                .select(DbResource::as_select())
                .first::<DbResource>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|r| r.to_resource())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_resource_by_name(
        &self,
        resource_name: &str,
    ) -> Result<Option<Resource>, DatabaseError> {
        let resource_name = resource_name.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::resources::dsl::*;
            resources
                .filter(name.eq(resource_name))
                .select(DbResource::as_select())
                .first::<DbResource>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|r| r.to_resource())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_resources(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Resource>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::resources::dsl::*;
            resources
                .order(id.asc())
                .limit(limit)
                .offset(offset)
                .select(DbResource::as_select())
                .load::<DbResource>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|r| r.to_resource())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_active_resources(&self) -> Result<Vec<Resource>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::resources::dsl::*;
            resources
                .filter(is_active.eq(true))
                .order(id.asc())
                .select(DbResource::as_select())
                .load::<DbResource>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|r| r.to_resource())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_resources(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::resources::dsl::*;
            resources
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn create_resource(&self, resource: &Resource) -> Result<(), DatabaseError> {
        let resource = resource.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_resource = NewResource {
                name: &resource.name,
                kind: resource.kind.as_str(),
                units: resource.units,
                seats_per_unit: resource.seats_per_unit,
                open_minute: resource.open_minute,
                close_minute: resource.close_minute,
                slot_minutes: resource.slot_minutes,
                is_active: resource.is_active,
                created_at: datetime_to_string(&resource.created_at),
                updated_at: datetime_to_string(&resource.updated_at),
            };

            diesel::insert_into(resources::table)
                .values(&new_resource)
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_insert_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn update_resource(&self, resource: &Resource) -> Result<(), DatabaseError> {
        let resource = resource.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let changes = UpdateResource {
                name: &resource.name,
                kind: resource.kind.as_str(),
                units: resource.units,
                seats_per_unit: resource.seats_per_unit,
                open_minute: resource.open_minute,
                close_minute: resource.close_minute,
                slot_minutes: resource.slot_minutes,
                is_active: resource.is_active,
                updated_at: datetime_to_string(&resource.updated_at),
            };

            diesel::update(resources::table.filter(resources::id.eq(resource.id as i32)))
                .set(changes)
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn delete_resource(&self, resource_id: i64) -> Result<(), DatabaseError> {
        let resource_id = resource_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            diesel::delete(resources::table.filter(resources::id.eq(resource_id)))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteUserStore {
    db_path: Arc<String>,
}

impl SqliteUserStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::UserStore for SqliteUserStore {
    async fn get_user(&self, user_id: i64) -> Result<Option<User>, DatabaseError> {
        let user_id = user_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .filter(id.eq(user_id))
                .select(DbUser::as_select())
                .first::<DbUser>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|u| u.to_user())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_user_by_username(&self, name: &str) -> Result<Option<User>, DatabaseError> {
        let name = name.to_string();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .filter(username.eq(name))
                .select(DbUser::as_select())
                .first::<DbUser>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|u| u.to_user())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .order(id.asc())
                .limit(limit)
                .offset(offset)
                .select(DbUser::as_select())
                .load::<DbUser>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|u| u.to_user())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_users(&self) -> Result<i64, DatabaseError> {
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::users::dsl::*;
            users
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn create_user(&self, user: &User) -> Result<(), DatabaseError> {
        let user = user.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_user = NewUser {
                username: &user.username,
                display_name: &user.display_name,
                email: user.email.as_deref(),
                role: user.role.as_str(),
                is_active: user.is_active,
                created_at: datetime_to_string(&user.created_at),
                updated_at: datetime_to_string(&user.updated_at),
            };

            diesel::insert_into(users::table)
                .values(&new_user)
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_insert_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn update_user(&self, user: &User) -> Result<(), DatabaseError> {
        let user = user.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let changes = UpdateUser {
                display_name: &user.display_name,
                email: user.email.as_deref(),
                role: user.role.as_str(),
                is_active: user.is_active,
                updated_at: datetime_to_string(&user.updated_at),
            };

            diesel::update(users::table.filter(users::id.eq(user.id as i32)))
                .set(changes)
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn delete_user(&self, user_id: i64) -> Result<(), DatabaseError> {
        let user_id = user_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            diesel::delete(users::table.filter(users::id.eq(user_id)))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteBookingStore {
    db_path: Arc<String>,
}

impl SqliteBookingStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::BookingStore for SqliteBookingStore {
    async fn get_booking(&self, booking_id: i64) -> Result<Option<Booking>, DatabaseError> {
        let booking_id = booking_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::bookings::dsl::*;
            bookings
                .filter(id.eq(booking_id))
                .select(DbBooking::as_select())
                .first::<DbBooking>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|b| b.to_booking())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn find_active(
        &self,
        booking_user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Booking>, DatabaseError> {
        let booking_user_id = booking_user_id as i32;
        let date = date_to_string(&date);
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::bookings::dsl::*;
            bookings
                .filter(user_id.eq(booking_user_id))
                .filter(booking_date.eq(date))
                .select(DbBooking::as_select())
                .first::<DbBooking>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|b| b.to_booking())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, DatabaseError> {
        let date = date_to_string(&date);
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::bookings::dsl::*;
            bookings
                .filter(booking_date.eq(date))
                .order(id.asc())
                .select(DbBooking::as_select())
                .load::<DbBooking>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|b| b.to_booking())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn count_for_date(&self, date: NaiveDate) -> Result<i64, DatabaseError> {
        let date = date_to_string(&date);
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::bookings::dsl::*;
            bookings
                .filter(booking_date.eq(date))
                .count()
                .get_result(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, DatabaseError> {
        let filter = filter.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::bookings::dsl::*;
            let mut query = bookings.select(DbBooking::as_select()).into_boxed();
            if let Some(filter_user) = filter.user_id {
                query = query.filter(user_id.eq(filter_user as i32));
            }
            if let Some(from) = filter.from {
                query = query.filter(booking_date.ge(date_to_string(&from)));
            }
            if let Some(to) = filter.to {
                query = query.filter(booking_date.le(date_to_string(&to)));
            }
            query
                .order((booking_date.desc(), id.asc()))
                .limit(limit)
                .offset(offset)
                .load::<DbBooking>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|b| b.to_booking())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn create_booking(&self, booking: &Booking) -> Result<(), DatabaseError> {
        let booking = booking.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_booking = NewBooking {
                user_id: booking.user_id as i32,
                resource_id: booking.resource_id as i32,
                seat_number: booking.seat_number,
                booking_date: date_to_string(&booking.booking_date),
                status: booking.status.as_str(),
                created_at: datetime_to_string(&booking.created_at),
            };

            diesel::insert_into(bookings::table)
                .values(&new_booking)
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_insert_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn delete_booking(&self, booking_id: i64) -> Result<(), DatabaseError> {
        let booking_id = booking_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            diesel::delete(bookings::table.filter(bookings::id.eq(booking_id)))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn get_room_booking(&self, booking_id: i64) -> Result<Option<RoomBooking>, DatabaseError> {
        let booking_id = booking_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::room_bookings::dsl::*;
            room_bookings
                .filter(id.eq(booking_id))
                .select(DbRoomBooking::as_select())
                .first::<DbRoomBooking>(&mut conn)
                .optional()
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .map(|b| b.to_room_booking())
                .transpose()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn room_bookings_for(
        &self,
        room_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<RoomBooking>, DatabaseError> {
        let room_id = room_id as i32;
        let date = date_to_string(&date);
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::room_bookings::dsl::*;
            room_bookings
                .filter(resource_id.eq(room_id))
                .filter(booking_date.eq(date))
                .order(slot_number.asc())
                .select(DbRoomBooking::as_select())
                .load::<DbRoomBooking>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|b| b.to_room_booking())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn create_room_booking(&self, booking: &RoomBooking) -> Result<(), DatabaseError> {
        let booking = booking.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_booking = NewRoomBooking {
                user_id: booking.user_id as i32,
                resource_id: booking.resource_id as i32,
                slot_number: booking.slot_number,
                booking_date: date_to_string(&booking.booking_date),
                status: booking.status.as_str(),
                created_at: datetime_to_string(&booking.created_at),
            };

            diesel::insert_into(room_bookings::table)
                .values(&new_booking)
                .execute(&mut conn)
                .map(|_| ())
                .map_err(map_insert_error)
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn delete_room_booking(&self, booking_id: i64) -> Result<(), DatabaseError> {
        let booking_id = booking_id as i32;
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            diesel::delete(room_bookings::table.filter(room_bookings::id.eq(booking_id)))
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

pub struct SqliteActivityStore {
    db_path: Arc<String>,
}

impl SqliteActivityStore {
    pub fn new(db_path: Arc<String>) -> Self {
        Self { db_path }
    }
}

#[async_trait]
impl super::ActivityStore for SqliteActivityStore {
    async fn append(&self, entry: &ActivityEntry) -> Result<(), DatabaseError> {
        let entry = entry.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            let new_entry = NewActivityEntry {
                user_id: entry.user_id as i32,
                activity_type: entry.activity_type.as_str(),
                booking_date: date_to_string(&entry.booking_date),
                detail: entry.detail.as_deref(),
                recorded_at: datetime_to_string(&entry.recorded_at),
            };

            diesel::insert_into(user_activity::table)
                .values(&new_entry)
                .execute(&mut conn)
                .map(|_| ())
                .map_err(|e| DatabaseError::Query(e.to_string()))
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }

    async fn list(
        &self,
        filter: &ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEntry>, DatabaseError> {
        let filter = filter.clone();
        let db_path = self.db_path.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = establish_connection(&db_path)?;
            use crate::db::schema_sqlite::user_activity::dsl::*;
            let mut query = user_activity
                .select(DbActivityEntry::as_select())
                .into_boxed();
            if let Some(filter_user) = filter.user_id {
                query = query.filter(user_id.eq(filter_user as i32));
            }
            if let Some(from) = filter.from {
                query = query.filter(booking_date.ge(date_to_string(&from)));
            }
            if let Some(to) = filter.to {
                query = query.filter(booking_date.le(date_to_string(&to)));
            }
            query
                .order(id.desc())
                .limit(limit)
                .offset(offset)
                .load::<DbActivityEntry>(&mut conn)
                .map_err(|e| DatabaseError::Query(e.to_string()))?
                .iter()
                .map(|e| e.to_entry())
                .collect()
        })
        .await
        .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
    }
}

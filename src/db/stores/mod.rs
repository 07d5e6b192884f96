use async_trait::async_trait;
use chrono::NaiveDate;

use super::DatabaseError;
use super::models::{ActivityEntry, Booking, Resource, RoomBooking, User};

/// Optional filters shared by the booking list endpoints.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub user_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct ActivityFilter {
    pub user_id: Option<i64>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[async_trait]
pub trait ResourceStore: Send + Sync {
    async fn get_resource(&self, id: i64) -> Result<Option<Resource>, DatabaseError>;
    async fn get_resource_by_name(&self, name: &str) -> Result<Option<Resource>, DatabaseError>;
    async fn list_resources(&self, limit: i64, offset: i64)
        -> Result<Vec<Resource>, DatabaseError>;
    async fn list_active_resources(&self) -> Result<Vec<Resource>, DatabaseError>;
    async fn count_resources(&self) -> Result<i64, DatabaseError>;
    async fn create_resource(&self, resource: &Resource) -> Result<(), DatabaseError>;
    async fn update_resource(&self, resource: &Resource) -> Result<(), DatabaseError>;
    async fn delete_resource(&self, id: i64) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_user(&self, id: i64) -> Result<Option<User>, DatabaseError>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, DatabaseError>;
    async fn list_users(&self, limit: i64, offset: i64) -> Result<Vec<User>, DatabaseError>;
    async fn count_users(&self) -> Result<i64, DatabaseError>;
    async fn create_user(&self, user: &User) -> Result<(), DatabaseError>;
    async fn update_user(&self, user: &User) -> Result<(), DatabaseError>;
    async fn delete_user(&self, id: i64) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn get_booking(&self, id: i64) -> Result<Option<Booking>, DatabaseError>;
    /// The active booking for a (user, date) pair, if any. At most one row
    /// can exist thanks to the unique index.
    async fn find_active(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Booking>, DatabaseError>;
    async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, DatabaseError>;
    async fn count_for_date(&self, date: NaiveDate) -> Result<i64, DatabaseError>;
    async fn list_bookings(
        &self,
        filter: &BookingFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Booking>, DatabaseError>;
    /// Create-if-absent: a unique violation on either booking index surfaces
    /// as `DatabaseError::Conflict` instead of a plain query error.
    async fn create_booking(&self, booking: &Booking) -> Result<(), DatabaseError>;
    async fn delete_booking(&self, id: i64) -> Result<(), DatabaseError>;

    async fn get_room_booking(&self, id: i64) -> Result<Option<RoomBooking>, DatabaseError>;
    async fn room_bookings_for(
        &self,
        resource_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<RoomBooking>, DatabaseError>;
    async fn create_room_booking(&self, booking: &RoomBooking) -> Result<(), DatabaseError>;
    async fn delete_room_booking(&self, id: i64) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Append-only: there is deliberately no update or delete.
    async fn append(&self, entry: &ActivityEntry) -> Result<(), DatabaseError>;
    async fn list(
        &self,
        filter: &ActivityFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<ActivityEntry>, DatabaseError>;
}

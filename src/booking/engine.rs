use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Local, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::db::models::{
    ActivityEntry, ActivityType, Booking, BookingStatus, ResourceKind, RoomBooking,
    User,
};
use crate::db::{
    ActivityStore, BookingStore, DatabaseError, DatabaseManager, ResourceStore, UserStore,
};
use crate::notify::{BookingEvent, WebhookNotifier};

use super::bulk::{expand_dates, WeekdaySelector};
use super::policy::{AccessPolicy, Decision};
use super::pool::SeatPool;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("user {0} not found")]
    UserNotFound(i64),

    #[error("user {0} is inactive")]
    UserInactive(i64),

    #[error("resource {0} not found")]
    ResourceNotFound(i64),

    #[error("booking {0} not found")]
    BookingNotFound(i64),

    #[error("booking not permitted: {0}")]
    AccessDenied(String),

    #[error("user already has a booking for this date")]
    AlreadyBooked,

    #[error("no active booking for this date")]
    NotBooked,

    #[error("seat is already taken")]
    SeatTaken,

    #[error("slot is already taken")]
    SlotTaken,

    #[error("no seats available")]
    CapacityExhausted,

    #[error("invalid slot: {0}")]
    InvalidSlot(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Which way a toggle call went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    Booked,
    Cancelled,
}

impl ToggleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToggleAction::Booked => "booked",
            ToggleAction::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BulkOutcome {
    pub bookings_created: u64,
    pub skipped_existing: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Availability {
    pub date: NaiveDate,
    pub total_capacity: usize,
    pub booked: usize,
    pub available: usize,
}

/// The allocation core. All booking mutations flow through here so the
/// create-if-absent protocol and the audit trail cannot be bypassed by a
/// handler taking a shortcut.
pub struct BookingEngine {
    resources: Arc<dyn ResourceStore>,
    users: Arc<dyn UserStore>,
    bookings: Arc<dyn BookingStore>,
    activity: Arc<dyn ActivityStore>,
    policy: AccessPolicy,
    notifier: Option<Arc<WebhookNotifier>>,
    pool_cache: RwLock<Option<SeatPool>>,
}

impl BookingEngine {
    pub fn new(
        db: &DatabaseManager,
        policy: AccessPolicy,
        notifier: Option<Arc<WebhookNotifier>>,
    ) -> Self {
        Self::from_stores(
            db.resource_store(),
            db.user_store(),
            db.booking_store(),
            db.activity_store(),
            policy,
            notifier,
        )
    }

    pub(crate) fn from_stores(
        resources: Arc<dyn ResourceStore>,
        users: Arc<dyn UserStore>,
        bookings: Arc<dyn BookingStore>,
        activity: Arc<dyn ActivityStore>,
        policy: AccessPolicy,
        notifier: Option<Arc<WebhookNotifier>>,
    ) -> Self {
        Self {
            resources,
            users,
            bookings,
            activity,
            policy,
            notifier,
            pool_cache: RwLock::new(None),
        }
    }

    /// Drops the cached seat pool. Called after any resource mutation.
    pub fn invalidate_pool(&self) {
        *self.pool_cache.write() = None;
    }

    async fn seat_pool(&self) -> Result<SeatPool, BookingError> {
        if let Some(pool) = self.pool_cache.read().clone() {
            return Ok(pool);
        }
        let resources = self.resources.list_active_resources().await?;
        let pool = SeatPool::build(&resources);
        *self.pool_cache.write() = Some(pool.clone());
        Ok(pool)
    }

    async fn require_user(&self, user_id: i64) -> Result<User, BookingError> {
        let user = self
            .users
            .get_user(user_id)
            .await?
            .ok_or(BookingError::UserNotFound(user_id))?;
        if !user.is_active {
            return Err(BookingError::UserInactive(user_id));
        }
        Ok(user)
    }

    /// Reserve a seat for (user, date). Explicit intent: an existing booking
    /// is a conflict, never a silent cancel.
    pub async fn reserve(
        &self,
        user_id: i64,
        date: NaiveDate,
        now: DateTime<Local>,
    ) -> Result<Booking, BookingError> {
        let user = self.require_user(user_id).await?;

        if let Decision::Denied(reason) = self.policy.booking_permitted(user.role, date, now) {
            return Err(BookingError::AccessDenied(reason));
        }

        if self.bookings.find_active(user_id, date).await?.is_some() {
            return Err(BookingError::AlreadyBooked);
        }

        let booking = self
            .assign_seat(user_id, date, BookingStatus::Booked)
            .await?;

        self.record_activity(
            user_id,
            ActivityType::Booked,
            date,
            Some(format!(
                "seat {} on resource {}",
                booking.seat_number, booking.resource_id
            )),
        )
        .await?;
        info!(user_id, date = %date, seat = booking.seat_number, "booking created");
        self.publish("booked", booking.resource_id, booking.seat_number, user_id, date);

        Ok(booking)
    }

    /// Release the active booking for (user, date). Explicit intent: no
    /// booking is a conflict, never a silent create.
    pub async fn release(&self, user_id: i64, date: NaiveDate) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .find_active(user_id, date)
            .await?
            .ok_or(BookingError::NotBooked)?;

        self.bookings.delete_booking(booking.id).await?;
        self.record_activity(
            user_id,
            ActivityType::Cancelled,
            date,
            Some(format!(
                "seat {} on resource {}",
                booking.seat_number, booking.resource_id
            )),
        )
        .await?;
        info!(user_id, date = %date, seat = booking.seat_number, "booking cancelled");
        self.publish("cancelled", booking.resource_id, booking.seat_number, user_id, date);

        Ok(booking)
    }

    /// Compatibility surface for the original toggle endpoint: books when no
    /// active booking exists, cancels otherwise, and reports which way it
    /// went.
    pub async fn toggle(
        &self,
        user_id: i64,
        date: NaiveDate,
        now: DateTime<Local>,
    ) -> Result<(ToggleAction, Booking), BookingError> {
        match self.bookings.find_active(user_id, date).await? {
            Some(_) => {
                let booking = self.release(user_id, date).await?;
                Ok((ToggleAction::Cancelled, booking))
            }
            None => {
                let booking = self.reserve(user_id, date, now).await?;
                Ok((ToggleAction::Booked, booking))
            }
        }
    }

    /// Admin booking with an explicit seat. Bypasses the role gate.
    pub async fn reserve_for(
        &self,
        user_id: i64,
        resource_id: i64,
        seat_number: i32,
        date: NaiveDate,
    ) -> Result<Booking, BookingError> {
        self.require_user(user_id).await?;

        let resource = self
            .resources
            .get_resource(resource_id)
            .await?
            .ok_or(BookingError::ResourceNotFound(resource_id))?;
        if !resource.is_active {
            return Err(BookingError::InvalidSlot("resource is not active".to_string()));
        }
        if resource.kind != ResourceKind::SeatBank {
            return Err(BookingError::InvalidSlot(
                "resource is not a seat bank".to_string(),
            ));
        }
        let capacity = resource.total_capacity();
        if seat_number < 1 || seat_number > capacity {
            return Err(BookingError::InvalidSlot(format!(
                "seat {seat_number} out of range 1..={capacity}"
            )));
        }

        if self.bookings.find_active(user_id, date).await?.is_some() {
            return Err(BookingError::AlreadyBooked);
        }

        let candidate = Booking {
            id: 0,
            user_id,
            resource_id,
            seat_number,
            booking_date: date,
            status: BookingStatus::BookedByAdmin,
            created_at: Utc::now(),
        };
        match self.bookings.create_booking(&candidate).await {
            Ok(()) => {}
            Err(DatabaseError::Conflict(_)) => {
                if self.bookings.find_active(user_id, date).await?.is_some() {
                    return Err(BookingError::AlreadyBooked);
                }
                return Err(BookingError::SeatTaken);
            }
            Err(e) => return Err(e.into()),
        }

        let booking = self.stored_booking(user_id, date).await?;
        self.record_activity(
            user_id,
            ActivityType::BookedByAdmin,
            date,
            Some(format!("seat {seat_number} on resource {resource_id}")),
        )
        .await?;
        info!(user_id, date = %date, seat = seat_number, "booking created by admin");
        self.publish("booked", resource_id, seat_number, user_id, date);

        Ok(booking)
    }

    /// Admin cancel by booking id.
    pub async fn cancel_booking(&self, booking_id: i64) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        self.bookings.delete_booking(booking.id).await?;
        self.record_activity(
            booking.user_id,
            ActivityType::Cancelled,
            booking.booking_date,
            Some(format!(
                "seat {} on resource {}",
                booking.seat_number, booking.resource_id
            )),
        )
        .await?;
        self.publish(
            "cancelled",
            booking.resource_id,
            booking.seat_number,
            booking.user_id,
            booking.booking_date,
        );

        Ok(booking)
    }

    /// Bulk booking: expand the weekday selection over the range, then book
    /// each (date, user) sequentially. Already-booked users are skipped;
    /// failures are counted and logged, and everything already written
    /// stays — there is no rollback.
    pub async fn bulk_book(
        &self,
        user_ids: &[i64],
        selectors: &[WeekdaySelector],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BulkOutcome, BookingError> {
        let dates = expand_dates(selectors, start, end);
        let mut outcome = BulkOutcome::default();

        for date in &dates {
            for &user_id in user_ids {
                match self.admin_assign(user_id, *date).await {
                    Ok(_) => outcome.bookings_created += 1,
                    Err(BookingError::AlreadyBooked) => outcome.skipped_existing += 1,
                    Err(e) => {
                        warn!(user_id, date = %date, "bulk booking failed: {e}");
                        outcome.failures += 1;
                    }
                }
            }
        }

        info!(
            created = outcome.bookings_created,
            skipped = outcome.skipped_existing,
            failures = outcome.failures,
            "bulk booking finished"
        );
        Ok(outcome)
    }

    async fn admin_assign(&self, user_id: i64, date: NaiveDate) -> Result<Booking, BookingError> {
        self.require_user(user_id).await?;

        if self.bookings.find_active(user_id, date).await?.is_some() {
            return Err(BookingError::AlreadyBooked);
        }

        let booking = self
            .assign_seat(user_id, date, BookingStatus::BookedByAdmin)
            .await?;

        self.record_activity(
            user_id,
            ActivityType::BookedByAdmin,
            date,
            Some(format!(
                "seat {} on resource {}",
                booking.seat_number, booking.resource_id
            )),
        )
        .await?;
        self.publish("booked", booking.resource_id, booking.seat_number, user_id, date);

        Ok(booking)
    }

    /// Book one slot of a room's open window. Slots are uniquely keyed per
    /// (room, slot, date), so concurrent requests resolve exactly like seat
    /// conflicts.
    pub async fn book_room(
        &self,
        user_id: i64,
        room_id: i64,
        slot_number: i32,
        date: NaiveDate,
    ) -> Result<RoomBooking, BookingError> {
        self.require_user(user_id).await?;

        let room = self
            .resources
            .get_resource(room_id)
            .await?
            .ok_or(BookingError::ResourceNotFound(room_id))?;
        if room.kind != ResourceKind::Room {
            return Err(BookingError::InvalidSlot("resource is not a room".to_string()));
        }
        if !room.is_active {
            return Err(BookingError::InvalidSlot("room is not active".to_string()));
        }
        let slot_count = room.slot_count();
        if slot_count == 0 {
            return Err(BookingError::InvalidSlot(
                "room has no bookable window".to_string(),
            ));
        }
        if slot_number < 1 || slot_number > slot_count {
            return Err(BookingError::InvalidSlot(format!(
                "slot {slot_number} out of range 1..={slot_count}"
            )));
        }

        let candidate = RoomBooking {
            id: 0,
            user_id,
            resource_id: room_id,
            slot_number,
            booking_date: date,
            status: BookingStatus::Booked,
            created_at: Utc::now(),
        };
        match self.bookings.create_room_booking(&candidate).await {
            Ok(()) => {}
            Err(DatabaseError::Conflict(_)) => return Err(BookingError::SlotTaken),
            Err(e) => return Err(e.into()),
        }

        let booking = self
            .bookings
            .room_bookings_for(room_id, date)
            .await?
            .into_iter()
            .find(|b| b.slot_number == slot_number && b.user_id == user_id)
            .ok_or_else(|| {
                BookingError::Database(DatabaseError::Query(
                    "room booking missing after insert".to_string(),
                ))
            })?;

        self.record_activity(
            user_id,
            ActivityType::Booked,
            date,
            Some(format!("room {} slot {}", room.name, slot_number)),
        )
        .await?;
        info!(user_id, room = %room.name, slot = slot_number, date = %date, "room slot booked");
        self.publish("room_booked", room_id, slot_number, user_id, date);

        Ok(booking)
    }

    pub async fn release_room(
        &self,
        room_id: i64,
        booking_id: i64,
    ) -> Result<RoomBooking, BookingError> {
        let booking = self
            .bookings
            .get_room_booking(booking_id)
            .await?
            .filter(|b| b.resource_id == room_id)
            .ok_or(BookingError::BookingNotFound(booking_id))?;

        self.bookings.delete_room_booking(booking.id).await?;
        self.record_activity(
            booking.user_id,
            ActivityType::Cancelled,
            booking.booking_date,
            Some(format!(
                "room {} slot {}",
                booking.resource_id, booking.slot_number
            )),
        )
        .await?;
        self.publish(
            "room_cancelled",
            booking.resource_id,
            booking.slot_number,
            booking.user_id,
            booking.booking_date,
        );

        Ok(booking)
    }

    /// Record a leave day: releases any existing seat booking, then appends
    /// the LEAVE entry. Returns the booking that was released, if any.
    pub async fn mark_leave(
        &self,
        user_id: i64,
        date: NaiveDate,
    ) -> Result<Option<Booking>, BookingError> {
        self.require_user(user_id).await?;

        let released = match self.release(user_id, date).await {
            Ok(booking) => Some(booking),
            Err(BookingError::NotBooked) => None,
            Err(e) => return Err(e),
        };

        self.record_activity(user_id, ActivityType::Leave, date, None)
            .await?;
        Ok(released)
    }

    pub async fn availability(&self, date: NaiveDate) -> Result<Availability, BookingError> {
        let pool = self.seat_pool().await?;
        let booked = self.bookings.count_for_date(date).await? as usize;
        let total_capacity = pool.total_capacity();
        Ok(Availability {
            date,
            total_capacity,
            booked,
            available: total_capacity.saturating_sub(booked),
        })
    }

    /// First-fit assignment with the create-if-absent protocol: read the
    /// occupied set, pick the first free slot, insert under the unique
    /// indexes. Losing the insert race means another writer took the seat
    /// (retry the next candidate) or the user got booked elsewhere (stop).
    /// Attempts are bounded by pool size.
    async fn assign_seat(
        &self,
        user_id: i64,
        date: NaiveDate,
        status: BookingStatus,
    ) -> Result<Booking, BookingError> {
        let pool = self.seat_pool().await?;
        if pool.is_empty() {
            return Err(BookingError::CapacityExhausted);
        }

        let mut attempts_left = pool.total_capacity();
        loop {
            let existing = self.bookings.bookings_for_date(date).await?;
            let occupied: HashSet<(i64, i32)> = existing
                .iter()
                .map(|b| (b.resource_id, b.seat_number))
                .collect();

            let slot = pool
                .first_fit(&occupied)
                .ok_or(BookingError::CapacityExhausted)?;

            let candidate = Booking {
                id: 0,
                user_id,
                resource_id: slot.resource_id,
                seat_number: slot.seat_number,
                booking_date: date,
                status,
                created_at: Utc::now(),
            };

            match self.bookings.create_booking(&candidate).await {
                Ok(()) => return self.stored_booking(user_id, date).await,
                Err(DatabaseError::Conflict(_)) => {
                    if self.bookings.find_active(user_id, date).await?.is_some() {
                        return Err(BookingError::AlreadyBooked);
                    }
                    attempts_left -= 1;
                    if attempts_left == 0 {
                        return Err(BookingError::CapacityExhausted);
                    }
                    debug!(
                        user_id,
                        date = %date,
                        seat = slot.seat_number,
                        "seat taken concurrently, retrying next candidate"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn stored_booking(&self, user_id: i64, date: NaiveDate) -> Result<Booking, BookingError> {
        self.bookings
            .find_active(user_id, date)
            .await?
            .ok_or_else(|| {
                BookingError::Database(DatabaseError::Query(
                    "booking missing after insert".to_string(),
                ))
            })
    }

    async fn record_activity(
        &self,
        user_id: i64,
        activity_type: ActivityType,
        date: NaiveDate,
        detail: Option<String>,
    ) -> Result<(), BookingError> {
        let entry = ActivityEntry {
            id: 0,
            user_id,
            activity_type,
            booking_date: date,
            detail,
            recorded_at: Utc::now(),
        };
        self.activity.append(&entry).await?;
        Ok(())
    }

    fn publish(
        &self,
        event: &'static str,
        resource_id: i64,
        seat_number: i32,
        user_id: i64,
        date: NaiveDate,
    ) {
        if let Some(notifier) = &self.notifier {
            notifier.publish(BookingEvent {
                event,
                user_id,
                resource_id,
                seat_number,
                date: date.format("%Y-%m-%d").to_string(),
            });
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::config::{DatabaseConfig, PolicyConfig};
    use crate::db::models::{Resource, Role};
    use crate::db::stores::BookingFilter;
    use crate::db::{ActivityFilter, DatabaseManager};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    // A post-unlock weekday clock; the default policy permits everyone.
    fn clock(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 1, 13, hour, 0, 0).unwrap()
    }

    async fn open_manager() -> (DatabaseManager, NamedTempFile) {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let db_path = file.path().to_string_lossy().to_string();

        let config = DatabaseConfig {
            url: None,
            conn_string: None,
            filename: Some(db_path),
            max_connections: Some(1),
            min_connections: Some(1),
        };

        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        (manager, file)
    }

    async fn seed_seat_bank(manager: &DatabaseManager, name: &str, units: i32, seats: i32) -> i64 {
        let resource = Resource {
            id: 0,
            name: name.to_string(),
            kind: ResourceKind::SeatBank,
            units,
            seats_per_unit: seats,
            open_minute: None,
            close_minute: None,
            slot_minutes: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        manager
            .resource_store()
            .create_resource(&resource)
            .await
            .expect("create resource");
        manager
            .resource_store()
            .get_resource_by_name(name)
            .await
            .expect("query resource")
            .expect("resource exists")
            .id
    }

    async fn seed_room(manager: &DatabaseManager, name: &str, slot_count: i32) -> i64 {
        let resource = Resource {
            id: 0,
            name: name.to_string(),
            kind: ResourceKind::Room,
            units: 1,
            seats_per_unit: 1,
            open_minute: Some(540),
            close_minute: Some(540 + slot_count * 60),
            slot_minutes: Some(60),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        manager
            .resource_store()
            .create_resource(&resource)
            .await
            .expect("create room");
        manager
            .resource_store()
            .get_resource_by_name(name)
            .await
            .expect("query room")
            .expect("room exists")
            .id
    }

    async fn seed_user(manager: &DatabaseManager, username: &str, role: Role) -> i64 {
        let user = User {
            id: 0,
            username: username.to_string(),
            display_name: username.to_uppercase(),
            email: None,
            role,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        manager
            .user_store()
            .create_user(&user)
            .await
            .expect("create user");
        manager
            .user_store()
            .get_user_by_username(username)
            .await
            .expect("query user")
            .expect("user exists")
            .id
    }

    fn engine_for(manager: &DatabaseManager) -> BookingEngine {
        let policy = AccessPolicy::from_config(&PolicyConfig::default()).expect("policy");
        BookingEngine::new(manager, policy, None)
    }

    #[tokio::test]
    async fn reserve_assigns_first_fit_in_order() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 3).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let grace = seed_user(&manager, "grace", Role::User).await;
        let engine = engine_for(&manager);

        let day = date("2025-01-13");
        let first = engine.reserve(ada, day, clock(8)).await.expect("reserve");
        let second = engine.reserve(grace, day, clock(8)).await.expect("reserve");

        assert_eq!(first.seat_number, 1);
        assert_eq!(second.seat_number, 2);
        assert_eq!(first.status, BookingStatus::Booked);
    }

    #[tokio::test]
    async fn reserve_conflicts_instead_of_toggling() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let engine = engine_for(&manager);

        let day = date("2025-01-13");
        engine.reserve(ada, day, clock(8)).await.expect("reserve");

        let err = engine
            .reserve(ada, day, clock(8))
            .await
            .expect_err("second reserve");
        assert!(matches!(err, BookingError::AlreadyBooked));

        // The first booking is untouched.
        assert!(manager
            .booking_store()
            .find_active(ada, day)
            .await
            .expect("find")
            .is_some());
    }

    #[tokio::test]
    async fn release_requires_an_active_booking() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let engine = engine_for(&manager);

        let err = engine
            .release(ada, date("2025-01-13"))
            .await
            .expect_err("release without booking");
        assert!(matches!(err, BookingError::NotBooked));
    }

    #[tokio::test]
    async fn toggle_twice_returns_to_original_state() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let engine = engine_for(&manager);

        let day = date("2025-01-13");
        let (action, booking) = engine.toggle(ada, day, clock(8)).await.expect("toggle");
        assert_eq!(action, ToggleAction::Booked);
        assert_eq!(booking.seat_number, 1);

        let (action, _) = engine.toggle(ada, day, clock(8)).await.expect("toggle");
        assert_eq!(action, ToggleAction::Cancelled);
        assert!(manager
            .booking_store()
            .find_active(ada, day)
            .await
            .expect("find")
            .is_none());

        // Third toggle books again, landing back on the first-fit seat.
        let (action, booking) = engine.toggle(ada, day, clock(8)).await.expect("toggle");
        assert_eq!(action, ToggleAction::Booked);
        assert_eq!(booking.seat_number, 1);
    }

    #[tokio::test]
    async fn bookings_never_exceed_capacity() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let grace = seed_user(&manager, "grace", Role::User).await;
        let enzo = seed_user(&manager, "enzo", Role::User).await;
        let engine = engine_for(&manager);

        let day = date("2025-01-13");
        engine.reserve(ada, day, clock(8)).await.expect("reserve");
        engine.reserve(grace, day, clock(8)).await.expect("reserve");

        let err = engine
            .reserve(enzo, day, clock(8))
            .await
            .expect_err("pool exhausted");
        assert!(matches!(err, BookingError::CapacityExhausted));

        let booked = manager
            .booking_store()
            .count_for_date(day)
            .await
            .expect("count");
        assert_eq!(booked, 2);

        let availability = engine.availability(day).await.expect("availability");
        assert_eq!(availability.total_capacity, 2);
        assert_eq!(availability.available, 0);
    }

    #[tokio::test]
    async fn role_gate_blocks_closed_weekdays() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let spp = seed_user(&manager, "spp-user", Role::Spp).await;
        let engine = engine_for(&manager);

        // Odd-ISO-week Wednesday, before the unlock hour.
        let closed_day = date("2025-01-15");
        let early = Local.with_ymd_and_hms(2025, 1, 15, 6, 0, 0).unwrap();
        let err = engine
            .reserve(spp, closed_day, early)
            .await
            .expect_err("gate closed");
        assert!(matches!(err, BookingError::AccessDenied(_)));

        // Same day after the unlock hour books fine.
        let late = Local.with_ymd_and_hms(2025, 1, 15, 7, 30, 0).unwrap();
        engine
            .reserve(spp, closed_day, late)
            .await
            .expect("unlocked");
    }

    #[tokio::test]
    async fn bulk_books_each_user_on_each_matching_date() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 6).await;
        let mut user_ids = Vec::new();
        for name in ["ada", "grace", "enzo"] {
            user_ids.push(seed_user(&manager, name, Role::User).await);
        }
        let engine = engine_for(&manager);

        // 14-day range spanning two Wednesdays.
        let selectors = [WeekdaySelector::Every(chrono::Weekday::Wed)];
        let outcome = engine
            .bulk_book(&user_ids, &selectors, date("2025-01-13"), date("2025-01-26"))
            .await
            .expect("bulk");
        assert_eq!(outcome.bookings_created, 6);
        assert_eq!(outcome.skipped_existing, 0);
        assert_eq!(outcome.failures, 0);

        // Re-running skips everyone already booked.
        let rerun = engine
            .bulk_book(&user_ids, &selectors, date("2025-01-13"), date("2025-01-26"))
            .await
            .expect("bulk rerun");
        assert_eq!(rerun.bookings_created, 0);
        assert_eq!(rerun.skipped_existing, 6);

        let listed = manager
            .booking_store()
            .list_bookings(&BookingFilter::default(), 50, 0)
            .await
            .expect("list");
        assert_eq!(listed.len(), 6);
        assert!(listed
            .iter()
            .all(|b| b.status == BookingStatus::BookedByAdmin));
    }

    #[tokio::test]
    async fn bulk_counts_failures_without_rolling_back() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let mut user_ids = Vec::new();
        for name in ["ada", "grace", "enzo"] {
            user_ids.push(seed_user(&manager, name, Role::User).await);
        }
        let engine = engine_for(&manager);

        let selectors = [WeekdaySelector::Every(chrono::Weekday::Wed)];
        let outcome = engine
            .bulk_book(&user_ids, &selectors, date("2025-01-13"), date("2025-01-19"))
            .await
            .expect("bulk");

        // Two seats, three users: the third hits capacity but the first two
        // bookings stay.
        assert_eq!(outcome.bookings_created, 2);
        assert_eq!(outcome.failures, 1);
        let booked = manager
            .booking_store()
            .count_for_date(date("2025-01-15"))
            .await
            .expect("count");
        assert_eq!(booked, 2);
    }

    #[tokio::test]
    async fn reserve_for_validates_seat_range_and_conflicts() {
        let (manager, _file) = open_manager().await;
        let bank = seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let grace = seed_user(&manager, "grace", Role::User).await;
        let engine = engine_for(&manager);

        let day = date("2025-01-13");
        let err = engine
            .reserve_for(ada, bank, 3, day)
            .await
            .expect_err("seat out of range");
        assert!(matches!(err, BookingError::InvalidSlot(_)));

        let booking = engine.reserve_for(ada, bank, 2, day).await.expect("book");
        assert_eq!(booking.status, BookingStatus::BookedByAdmin);

        let err = engine
            .reserve_for(grace, bank, 2, day)
            .await
            .expect_err("seat taken");
        assert!(matches!(err, BookingError::SeatTaken));
    }

    #[tokio::test]
    async fn room_slots_conflict_and_validate() {
        let (manager, _file) = open_manager().await;
        let room = seed_room(&manager, "meeting-a", 4).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let grace = seed_user(&manager, "grace", Role::User).await;
        let engine = engine_for(&manager);

        let day = date("2025-01-13");
        let err = engine
            .book_room(ada, room, 5, day)
            .await
            .expect_err("slot out of range");
        assert!(matches!(err, BookingError::InvalidSlot(_)));

        let booking = engine.book_room(ada, room, 2, day).await.expect("book");
        assert_eq!(booking.slot_number, 2);

        let err = engine
            .book_room(grace, room, 2, day)
            .await
            .expect_err("slot taken");
        assert!(matches!(err, BookingError::SlotTaken));

        // A desk booking the same day is still possible: room slots do not
        // consume the per-(user, date) seat key.
        seed_seat_bank(&manager, "floor-1", 1, 1).await;
        engine.invalidate_pool();
        engine.reserve(ada, day, clock(8)).await.expect("desk too");

        engine
            .release_room(room, booking.id)
            .await
            .expect("release room");
        assert!(manager
            .booking_store()
            .room_bookings_for(room, day)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn mark_leave_releases_and_records_history() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let engine = engine_for(&manager);

        let day = date("2025-01-13");
        engine.reserve(ada, day, clock(8)).await.expect("reserve");

        let released = engine.mark_leave(ada, day).await.expect("leave");
        assert!(released.is_some());
        assert!(manager
            .booking_store()
            .find_active(ada, day)
            .await
            .expect("find")
            .is_none());

        let entries = manager
            .activity_store()
            .list(
                &ActivityFilter {
                    user_id: Some(ada),
                    from: None,
                    to: None,
                },
                10,
                0,
            )
            .await
            .expect("list activity");
        let types: Vec<ActivityType> = entries.iter().map(|e| e.activity_type).collect();
        assert!(types.contains(&ActivityType::Booked));
        assert!(types.contains(&ActivityType::Cancelled));
        assert!(types.contains(&ActivityType::Leave));

        // Leave without a booking still appends history.
        let released = engine
            .mark_leave(ada, date("2025-01-14"))
            .await
            .expect("leave again");
        assert!(released.is_none());
    }

    #[test]
    fn pool_cache_rebuilds_after_invalidation() {
        tokio_test::block_on(async {
            let (manager, _file) = open_manager().await;
            seed_seat_bank(&manager, "floor-1", 1, 2).await;
            let engine = engine_for(&manager);

            let day = date("2025-01-13");
            assert_eq!(
                engine.availability(day).await.expect("availability").total_capacity,
                2
            );

            seed_seat_bank(&manager, "floor-2", 1, 3).await;
            // Cache still holds the old pool until invalidated.
            assert_eq!(
                engine.availability(day).await.expect("availability").total_capacity,
                2
            );

            engine.invalidate_pool();
            assert_eq!(
                engine.availability(day).await.expect("availability").total_capacity,
                5
            );
        });
    }

    /// Store double reproducing the §5 race: a rival books the first-fit
    /// seat between this request's availability read and its insert. The
    /// unique index turns that into a conflict and the engine retries the
    /// next candidate.
    struct RacingBookingStore {
        inner: Arc<dyn BookingStore>,
        rival_user: i64,
        raced: AtomicBool,
    }

    #[async_trait]
    impl BookingStore for RacingBookingStore {
        async fn get_booking(&self, id: i64) -> Result<Option<Booking>, DatabaseError> {
            self.inner.get_booking(id).await
        }

        async fn find_active(
            &self,
            user_id: i64,
            date: NaiveDate,
        ) -> Result<Option<Booking>, DatabaseError> {
            self.inner.find_active(user_id, date).await
        }

        async fn bookings_for_date(&self, date: NaiveDate) -> Result<Vec<Booking>, DatabaseError> {
            self.inner.bookings_for_date(date).await
        }

        async fn count_for_date(&self, date: NaiveDate) -> Result<i64, DatabaseError> {
            self.inner.count_for_date(date).await
        }

        async fn list_bookings(
            &self,
            filter: &BookingFilter,
            limit: i64,
            offset: i64,
        ) -> Result<Vec<Booking>, DatabaseError> {
            self.inner.list_bookings(filter, limit, offset).await
        }

        async fn create_booking(&self, booking: &Booking) -> Result<(), DatabaseError> {
            if !self.raced.swap(true, Ordering::SeqCst) {
                let mut rival = booking.clone();
                rival.user_id = self.rival_user;
                self.inner.create_booking(&rival).await?;
            }
            self.inner.create_booking(booking).await
        }

        async fn delete_booking(&self, id: i64) -> Result<(), DatabaseError> {
            self.inner.delete_booking(id).await
        }

        async fn get_room_booking(&self, id: i64) -> Result<Option<RoomBooking>, DatabaseError> {
            self.inner.get_room_booking(id).await
        }

        async fn room_bookings_for(
            &self,
            resource_id: i64,
            date: NaiveDate,
        ) -> Result<Vec<RoomBooking>, DatabaseError> {
            self.inner.room_bookings_for(resource_id, date).await
        }

        async fn create_room_booking(&self, booking: &RoomBooking) -> Result<(), DatabaseError> {
            self.inner.create_room_booking(booking).await
        }

        async fn delete_room_booking(&self, id: i64) -> Result<(), DatabaseError> {
            self.inner.delete_room_booking(id).await
        }
    }

    #[tokio::test]
    async fn concurrent_seat_race_retries_next_candidate() {
        let (manager, _file) = open_manager().await;
        seed_seat_bank(&manager, "floor-1", 1, 2).await;
        let ada = seed_user(&manager, "ada", Role::User).await;
        let grace = seed_user(&manager, "grace", Role::User).await;

        let racing_store = Arc::new(RacingBookingStore {
            inner: manager.booking_store(),
            rival_user: grace,
            raced: AtomicBool::new(false),
        });
        let policy = AccessPolicy::from_config(&PolicyConfig::default()).expect("policy");
        let engine = BookingEngine::from_stores(
            manager.resource_store(),
            manager.user_store(),
            racing_store,
            manager.activity_store(),
            policy,
            None,
        );

        let day = date("2025-01-13");
        let booking = engine.reserve(ada, day, clock(8)).await.expect("reserve");

        // The rival snatched seat 1 mid-flight; the retry landed on seat 2,
        // and nobody got double-booked.
        assert_eq!(booking.seat_number, 2);
        let rival = manager
            .booking_store()
            .find_active(grace, day)
            .await
            .expect("find rival")
            .expect("rival booked");
        assert_eq!(rival.seat_number, 1);
        assert_eq!(
            manager
                .booking_store()
                .count_for_date(day)
                .await
                .expect("count"),
            2
        );
    }
}

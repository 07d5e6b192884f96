use crate::config::{DatabaseConfig as ConfigDatabaseConfig, DbType as ConfigDbType};
use crate::db::{ActivityStore, BookingStore, DatabaseError, ResourceStore, UserStore};
use diesel::RunQueryDsl;
use std::sync::Arc;

#[cfg(feature = "postgres")]
use crate::db::postgres::{
    PostgresActivityStore, PostgresBookingStore, PostgresResourceStore, PostgresUserStore,
};
#[cfg(feature = "postgres")]
use diesel::pg::PgConnection;
#[cfg(feature = "postgres")]
use diesel::r2d2::{self, ConnectionManager};

#[cfg(feature = "postgres")]
pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

#[cfg(feature = "sqlite")]
use crate::db::sqlite::{
    SqliteActivityStore, SqliteBookingStore, SqliteResourceStore, SqliteUserStore,
};
#[cfg(feature = "sqlite")]
use diesel::sqlite::SqliteConnection;
#[cfg(feature = "sqlite")]
use diesel::Connection;

#[derive(Clone)]
pub struct DatabaseManager {
    #[cfg(feature = "postgres")]
    postgres_pool: Option<Pool>,
    #[cfg(feature = "sqlite")]
    sqlite_path: Option<String>,
    resource_store: Arc<dyn ResourceStore>,
    user_store: Arc<dyn UserStore>,
    booking_store: Arc<dyn BookingStore>,
    activity_store: Arc<dyn ActivityStore>,
    db_type: DbType,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

impl From<ConfigDbType> for DbType {
    fn from(value: ConfigDbType) -> Self {
        match value {
            ConfigDbType::Postgres => DbType::Postgres,
            ConfigDbType::Sqlite => DbType::Sqlite,
        }
    }
}

impl DatabaseManager {
    pub async fn new(config: &ConfigDatabaseConfig) -> Result<Self, DatabaseError> {
        let db_type = DbType::from(config.db_type());

        match db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let connection_string = config.connection_string();
                let max_connections = config.max_connections();
                let min_connections = config.min_connections();

                let manager = ConnectionManager::<PgConnection>::new(connection_string);

                let builder = r2d2::Pool::builder()
                    .max_size(max_connections.unwrap_or(10))
                    .min_idle(Some(min_connections.unwrap_or(1)));

                let pool = builder
                    .build(manager)
                    .map_err(|e| DatabaseError::Connection(e.to_string()))?;

                let resource_store = Arc::new(PostgresResourceStore::new(pool.clone()));
                let user_store = Arc::new(PostgresUserStore::new(pool.clone()));
                let booking_store = Arc::new(PostgresBookingStore::new(pool.clone()));
                let activity_store = Arc::new(PostgresActivityStore::new(pool.clone()));

                Ok(Self {
                    postgres_pool: Some(pool),
                    #[cfg(feature = "sqlite")]
                    sqlite_path: None,
                    resource_store,
                    user_store,
                    booking_store,
                    activity_store,
                    db_type,
                })
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = config.sqlite_path().unwrap_or_default();
                let path_arc = Arc::new(path.clone());

                let resource_store = Arc::new(SqliteResourceStore::new(path_arc.clone()));
                let user_store = Arc::new(SqliteUserStore::new(path_arc.clone()));
                let booking_store = Arc::new(SqliteBookingStore::new(path_arc.clone()));
                let activity_store = Arc::new(SqliteActivityStore::new(path_arc));

                Ok(Self {
                    #[cfg(feature = "postgres")]
                    postgres_pool: None,
                    sqlite_path: Some(path),
                    resource_store,
                    user_store,
                    booking_store,
                    activity_store,
                    db_type,
                })
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Connection(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Connection(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    pub async fn migrate(&self) -> Result<(), DatabaseError> {
        match self.db_type {
            #[cfg(feature = "postgres")]
            DbType::Postgres => {
                let pool = self.postgres_pool.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("postgres pool not initialized".to_string())
                })?;
                Self::migrate_postgres(pool).await
            }
            #[cfg(feature = "sqlite")]
            DbType::Sqlite => {
                let path = self.sqlite_path.as_ref().ok_or_else(|| {
                    DatabaseError::Migration("sqlite path not initialized".to_string())
                })?;
                Self::migrate_sqlite(path).await
            }
            #[cfg(not(feature = "postgres"))]
            DbType::Postgres => Err(DatabaseError::Migration(
                "PostgreSQL feature not enabled".to_string(),
            )),
            #[cfg(not(feature = "sqlite"))]
            DbType::Sqlite => Err(DatabaseError::Migration(
                "SQLite feature not enabled".to_string(),
            )),
        }
    }

    #[cfg(feature = "postgres")]
    async fn migrate_postgres(pool: &Pool) -> Result<(), DatabaseError> {
        let pool = pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS resources (
                    id BIGSERIAL PRIMARY KEY,
                    name TEXT NOT NULL UNIQUE,
                    kind TEXT NOT NULL,
                    units INTEGER NOT NULL DEFAULT 0,
                    seats_per_unit INTEGER NOT NULL DEFAULT 0,
                    open_minute INTEGER,
                    close_minute INTEGER,
                    slot_minutes INTEGER,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id BIGSERIAL PRIMARY KEY,
                    username TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    email TEXT,
                    role TEXT NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id BIGSERIAL PRIMARY KEY,
                    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    resource_id BIGINT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
                    seat_number INTEGER NOT NULL,
                    booking_date TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS room_bookings (
                    id BIGSERIAL PRIMARY KEY,
                    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    resource_id BIGINT NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
                    slot_number INTEGER NOT NULL,
                    booking_date TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS user_activity (
                    id BIGSERIAL PRIMARY KEY,
                    user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    activity_type TEXT NOT NULL,
                    booking_date TEXT NOT NULL,
                    detail TEXT,
                    recorded_at TIMESTAMP WITH TIME ZONE NOT NULL DEFAULT NOW()
                )
                "#,
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_seat_per_date ON bookings(resource_id, seat_number, booking_date)",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_user_per_date ON bookings(user_id, booking_date)",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_room_bookings_slot_per_date ON room_bookings(resource_id, slot_number, booking_date)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_date ON bookings(booking_date)",
                "CREATE INDEX IF NOT EXISTS idx_room_bookings_date ON room_bookings(booking_date)",
                "CREATE INDEX IF NOT EXISTS idx_user_activity_user ON user_activity(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_user_activity_date ON user_activity(booking_date)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    #[cfg(feature = "sqlite")]
    async fn migrate_sqlite(path: &str) -> Result<(), DatabaseError> {
        let path = path.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = SqliteConnection::establish(&path)
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;

            let statements = [
                r#"
                CREATE TABLE IF NOT EXISTS resources (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL UNIQUE,
                    kind TEXT NOT NULL,
                    units INTEGER NOT NULL DEFAULT 0,
                    seats_per_unit INTEGER NOT NULL DEFAULT 0,
                    open_minute INTEGER,
                    close_minute INTEGER,
                    slot_minutes INTEGER,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    display_name TEXT NOT NULL,
                    email TEXT,
                    role TEXT NOT NULL,
                    is_active BOOLEAN NOT NULL DEFAULT TRUE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now')),
                    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS bookings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    resource_id INTEGER NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
                    seat_number INTEGER NOT NULL,
                    booking_date TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS room_bookings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    resource_id INTEGER NOT NULL REFERENCES resources(id) ON DELETE CASCADE,
                    slot_number INTEGER NOT NULL,
                    booking_date TEXT NOT NULL,
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                r#"
                CREATE TABLE IF NOT EXISTS user_activity (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    activity_type TEXT NOT NULL,
                    booking_date TEXT NOT NULL,
                    detail TEXT,
                    recorded_at TEXT NOT NULL DEFAULT (datetime('now'))
                )
                "#,
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_seat_per_date ON bookings(resource_id, seat_number, booking_date)",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_bookings_user_per_date ON bookings(user_id, booking_date)",
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_room_bookings_slot_per_date ON room_bookings(resource_id, slot_number, booking_date)",
                "CREATE INDEX IF NOT EXISTS idx_bookings_date ON bookings(booking_date)",
                "CREATE INDEX IF NOT EXISTS idx_room_bookings_date ON room_bookings(booking_date)",
                "CREATE INDEX IF NOT EXISTS idx_user_activity_user ON user_activity(user_id)",
                "CREATE INDEX IF NOT EXISTS idx_user_activity_date ON user_activity(booking_date)",
            ];

            for statement in statements {
                diesel::sql_query(statement)
                    .execute(&mut conn)
                    .map_err(|e| DatabaseError::Migration(e.to_string()))?;
            }

            Ok(())
        })
        .await
        .map_err(|e| DatabaseError::Migration(format!("migration task failed: {e}")))?
    }

    pub fn resource_store(&self) -> Arc<dyn ResourceStore> {
        self.resource_store.clone()
    }

    pub fn user_store(&self) -> Arc<dyn UserStore> {
        self.user_store.clone()
    }

    pub fn booking_store(&self) -> Arc<dyn BookingStore> {
        self.booking_store.clone()
    }

    pub fn activity_store(&self) -> Arc<dyn ActivityStore> {
        self.activity_store.clone()
    }

    #[cfg(feature = "postgres")]
    pub fn pool(&self) -> Option<&Pool> {
        self.postgres_pool.as_ref()
    }

    pub fn db_type(&self) -> DbType {
        self.db_type
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use chrono::{NaiveDate, Utc};
    use tempfile::NamedTempFile;

    use super::DatabaseManager;
    use crate::config::DatabaseConfig;
    use crate::db::models::{
        ActivityEntry, ActivityType, Booking, BookingStatus, Resource, ResourceKind, Role, User,
    };
    use crate::db::stores::{ActivityFilter, BookingFilter};
    use crate::db::DatabaseError;

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

    fn sample_resource(name: &str) -> Resource {
        Resource {
            id: 0,
            name: name.to_string(),
            kind: ResourceKind::SeatBank,
            units: 2,
            seats_per_unit: 3,
            open_minute: None,
            close_minute: None,
            slot_minutes: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn sample_user(username: &str) -> User {
        User {
            id: 0,
            username: username.to_string(),
            display_name: username.to_uppercase(),
            email: Some(format!("{username}@example.org")),
            role: Role::User,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    #[tokio::test]
    async fn sqlite_resource_roundtrip() {
        let (manager, _file) = open_manager().await;
        let store = manager.resource_store();

        store
            .create_resource(&sample_resource("floor-1"))
            .await
            .expect("create resource");

        let fetched = store
            .get_resource_by_name("floor-1")
            .await
            .expect("query resource")
            .expect("resource exists");
        assert_eq!(fetched.units, 2);
        assert_eq!(fetched.total_capacity(), 6);

        let mut updated = fetched.clone();
        updated.units = 4;
        updated.updated_at = Utc::now();
        store.update_resource(&updated).await.expect("update");

        let after = store
            .get_resource(fetched.id)
            .await
            .expect("query by id")
            .expect("still exists");
        assert_eq!(after.total_capacity(), 12);

        store.delete_resource(fetched.id).await.expect("delete");
        assert!(store
            .get_resource(fetched.id)
            .await
            .expect("query after delete")
            .is_none());
    }

    #[tokio::test]
    async fn sqlite_booking_unique_indexes_report_conflict() {
        let (manager, _file) = open_manager().await;

        manager
            .resource_store()
            .create_resource(&sample_resource("floor-1"))
            .await
            .expect("create resource");
        let resource = manager
            .resource_store()
            .get_resource_by_name("floor-1")
            .await
            .expect("query")
            .expect("exists");

        for username in ["ada", "grace"] {
            manager
                .user_store()
                .create_user(&sample_user(username))
                .await
                .expect("create user");
        }
        let ada = manager
            .user_store()
            .get_user_by_username("ada")
            .await
            .expect("query")
            .expect("exists");
        let grace = manager
            .user_store()
            .get_user_by_username("grace")
            .await
            .expect("query")
            .expect("exists");

        let day = date("2025-03-03");
        let booking = Booking {
            id: 0,
            user_id: ada.id,
            resource_id: resource.id,
            seat_number: 1,
            booking_date: day,
            status: BookingStatus::Booked,
            created_at: Utc::now(),
        };
        manager
            .booking_store()
            .create_booking(&booking)
            .await
            .expect("first insert");

        // Same seat, different user: the (resource, seat, date) index fires.
        let mut same_seat = booking.clone();
        same_seat.user_id = grace.id;
        let err = manager
            .booking_store()
            .create_booking(&same_seat)
            .await
            .expect_err("duplicate seat");
        assert!(matches!(err, DatabaseError::Conflict(_)));

        // Same user, different seat: the (user, date) index fires.
        let mut same_user = booking.clone();
        same_user.seat_number = 2;
        let err = manager
            .booking_store()
            .create_booking(&same_user)
            .await
            .expect_err("duplicate user");
        assert!(matches!(err, DatabaseError::Conflict(_)));

        let active = manager
            .booking_store()
            .find_active(ada.id, day)
            .await
            .expect("find active")
            .expect("booking exists");
        assert_eq!(active.seat_number, 1);

        let listed = manager
            .booking_store()
            .list_bookings(&BookingFilter::default(), 10, 0)
            .await
            .expect("list");
        assert_eq!(listed.len(), 1);

        manager
            .booking_store()
            .delete_booking(active.id)
            .await
            .expect("delete booking");
        assert!(manager
            .booking_store()
            .find_active(ada.id, day)
            .await
            .expect("query after delete")
            .is_none());
    }

    #[tokio::test]
    async fn sqlite_activity_is_append_only_history() {
        let (manager, _file) = open_manager().await;

        manager
            .user_store()
            .create_user(&sample_user("ada"))
            .await
            .expect("create user");
        let ada = manager
            .user_store()
            .get_user_by_username("ada")
            .await
            .expect("query")
            .expect("exists");

        for (activity_type, day) in [
            (ActivityType::Booked, "2025-03-03"),
            (ActivityType::Cancelled, "2025-03-03"),
            (ActivityType::Leave, "2025-03-04"),
        ] {
            manager
                .activity_store()
                .append(&ActivityEntry {
                    id: 0,
                    user_id: ada.id,
                    activity_type,
                    booking_date: date(day),
                    detail: None,
                    recorded_at: Utc::now(),
                })
                .await
                .expect("append");
        }

        let filter = ActivityFilter {
            user_id: Some(ada.id),
            from: None,
            to: None,
        };
        let entries = manager
            .activity_store()
            .list(&filter, 10, 0)
            .await
            .expect("list");
        assert_eq!(entries.len(), 3);

        let one_day = ActivityFilter {
            user_id: Some(ada.id),
            from: Some(date("2025-03-04")),
            to: Some(date("2025-03-04")),
        };
        let entries = manager
            .activity_store()
            .list(&one_day, 10, 0)
            .await
            .expect("list filtered");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].activity_type, ActivityType::Leave);
    }

    #[tokio::test]
    async fn sqlite_room_booking_slot_conflict() {
        let (manager, _file) = open_manager().await;

        let room = Resource {
            id: 0,
            name: "meeting-a".to_string(),
            kind: ResourceKind::Room,
            units: 1,
            seats_per_unit: 1,
            open_minute: Some(540),
            close_minute: Some(1020),
            slot_minutes: Some(60),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        manager
            .resource_store()
            .create_resource(&room)
            .await
            .expect("create room");
        let room = manager
            .resource_store()
            .get_resource_by_name("meeting-a")
            .await
            .expect("query")
            .expect("exists");

        for username in ["ada", "grace"] {
            manager
                .user_store()
                .create_user(&sample_user(username))
                .await
                .expect("create user");
        }
        let ada = manager
            .user_store()
            .get_user_by_username("ada")
            .await
            .expect("query")
            .expect("exists");
        let grace = manager
            .user_store()
            .get_user_by_username("grace")
            .await
            .expect("query")
            .expect("exists");

        let day = date("2025-03-03");
        let booking = crate::db::models::RoomBooking {
            id: 0,
            user_id: ada.id,
            resource_id: room.id,
            slot_number: 3,
            booking_date: day,
            status: BookingStatus::Booked,
            created_at: Utc::now(),
        };
        manager
            .booking_store()
            .create_room_booking(&booking)
            .await
            .expect("first slot insert");

        let mut same_slot = booking.clone();
        same_slot.user_id = grace.id;
        let err = manager
            .booking_store()
            .create_room_booking(&same_slot)
            .await
            .expect_err("slot conflict");
        assert!(matches!(err, DatabaseError::Conflict(_)));

        let slots = manager
            .booking_store()
            .room_bookings_for(room.id, day)
            .await
            .expect("list slots");
        assert_eq!(slots.len(), 1);
    }
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SeatBank,
    Room,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::SeatBank => "seat_bank",
            ResourceKind::Room => "room",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "seat_bank" => Some(ResourceKind::SeatBank),
            "room" => Some(ResourceKind::Room),
            _ => None,
        }
    }
}

/// A bookable resource: a bank of identical seats, or a room whose open
/// window is divided into fixed-length slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: i64,
    pub name: String,
    pub kind: ResourceKind,
    pub units: i32,
    pub seats_per_unit: i32,
    pub open_minute: Option<i32>,
    pub close_minute: Option<i32>,
    pub slot_minutes: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Resource {
    /// Computed, never stored: `units * seats_per_unit` for seat banks,
    /// whole slots in the open window for rooms.
    pub fn total_capacity(&self) -> i32 {
        match self.kind {
            ResourceKind::SeatBank => self.units.max(0) * self.seats_per_unit.max(0),
            ResourceKind::Room => self.slot_count(),
        }
    }

    pub fn slot_count(&self) -> i32 {
        match (self.open_minute, self.close_minute, self.slot_minutes) {
            (Some(open), Some(close), Some(slot)) if slot > 0 && close > open => {
                (close - open) / slot
            }
            _ => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Spp,
    Gst,
    Intern,
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Spp => "spp",
            Role::Gst => "gst",
            Role::Intern => "intern",
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "spp" => Some(Role::Spp),
            "gst" => Some(Role::Gst),
            "intern" => Some(Role::Intern),
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub display_name: String,
    pub email: Option<String>,
    pub role: Role,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Booked,
    BookedByAdmin,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Booked => "booked",
            BookingStatus::BookedByAdmin => "booked_by_admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "booked" => Some(BookingStatus::Booked),
            "booked_by_admin" => Some(BookingStatus::BookedByAdmin),
            _ => None,
        }
    }
}

/// An active seat booking. Cancellation deletes the row; history lives in
/// `user_activity` only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i64,
    pub user_id: i64,
    pub resource_id: i64,
    pub seat_number: i32,
    pub booking_date: NaiveDate,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

/// An active room-slot booking. Kept apart from seat bookings so a desk and
/// a room slot on the same date do not collide on the per-(user, date) key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomBooking {
    pub id: i64,
    pub user_id: i64,
    pub resource_id: i64,
    pub slot_number: i32,
    pub booking_date: NaiveDate,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Booked,
    Cancelled,
    BookedByAdmin,
    Leave,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Booked => "BOOKED",
            ActivityType::Cancelled => "CANCELLED",
            ActivityType::BookedByAdmin => "BOOKED_BY_ADMIN",
            ActivityType::Leave => "LEAVE",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "BOOKED" => Some(ActivityType::Booked),
            "CANCELLED" => Some(ActivityType::Cancelled),
            "BOOKED_BY_ADMIN" => Some(ActivityType::BookedByAdmin),
            "LEAVE" => Some(ActivityType::Leave),
            _ => None,
        }
    }
}

/// Append-only audit trail entry. Never updated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: i64,
    pub user_id: i64,
    pub activity_type: ActivityType,
    pub booking_date: NaiveDate,
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_bank_capacity_is_units_times_seats() {
        let resource = Resource {
            id: 1,
            name: "floor-2".to_string(),
            kind: ResourceKind::SeatBank,
            units: 4,
            seats_per_unit: 6,
            open_minute: None,
            close_minute: None,
            slot_minutes: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(resource.total_capacity(), 24);
    }

    #[test]
    fn room_capacity_counts_whole_slots() {
        let room = Resource {
            id: 2,
            name: "meeting-a".to_string(),
            kind: ResourceKind::Room,
            units: 1,
            seats_per_unit: 1,
            open_minute: Some(8 * 60),
            close_minute: Some(17 * 60 + 30),
            slot_minutes: Some(60),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        // 9.5 hours at 60-minute slots: the half slot does not count.
        assert_eq!(room.slot_count(), 9);
        assert_eq!(room.total_capacity(), 9);
    }

    #[test]
    fn room_without_window_has_zero_slots() {
        let room = Resource {
            id: 3,
            name: "broken".to_string(),
            kind: ResourceKind::Room,
            units: 1,
            seats_per_unit: 1,
            open_minute: Some(540),
            close_minute: None,
            slot_minutes: Some(30),
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(room.slot_count(), 0);
    }

    #[test]
    fn role_parse_is_case_insensitive() {
        assert_eq!(Role::parse("SPP"), Some(Role::Spp));
        assert_eq!(Role::parse("intern"), Some(Role::Intern));
        assert_eq!(Role::parse("supervisor"), None);
    }

    #[test]
    fn enum_strings_roundtrip() {
        for status in [BookingStatus::Booked, BookingStatus::BookedByAdmin] {
            assert_eq!(BookingStatus::parse(status.as_str()), Some(status));
        }
        for kind in [ResourceKind::SeatBank, ResourceKind::Room] {
            assert_eq!(ResourceKind::parse(kind.as_str()), Some(kind));
        }
        for activity in [
            ActivityType::Booked,
            ActivityType::Cancelled,
            ActivityType::BookedByAdmin,
            ActivityType::Leave,
        ] {
            assert_eq!(ActivityType::parse(activity.as_str()), Some(activity));
        }
    }
}

diesel::table! {
    resources (id) {
        id -> BigInt,
        name -> Text,
        kind -> Text,
        units -> Integer,
        seats_per_unit -> Integer,
        open_minute -> Nullable<Integer>,
        close_minute -> Nullable<Integer>,
        slot_minutes -> Nullable<Integer>,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    users (id) {
        id -> BigInt,
        username -> Text,
        display_name -> Text,
        email -> Nullable<Text>,
        role -> Text,
        is_active -> Bool,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    bookings (id) {
        id -> BigInt,
        user_id -> BigInt,
        resource_id -> BigInt,
        seat_number -> Integer,
        booking_date -> Text,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    room_bookings (id) {
        id -> BigInt,
        user_id -> BigInt,
        resource_id -> BigInt,
        slot_number -> Integer,
        booking_date -> Text,
        status -> Text,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    user_activity (id) {
        id -> BigInt,
        user_id -> BigInt,
        activity_type -> Text,
        booking_date -> Text,
        detail -> Nullable<Text>,
        recorded_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    resources,
    users,
    bookings,
    room_bookings,
    user_activity,
);

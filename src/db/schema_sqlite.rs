diesel::table! {
    resources (id) {
        id -> Integer,
        name -> Text,
        kind -> Text,
        units -> Integer,
        seats_per_unit -> Integer,
        open_minute -> Nullable<Integer>,
        close_minute -> Nullable<Integer>,
        slot_minutes -> Nullable<Integer>,
        is_active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    users (id) {
        id -> Integer,
        username -> Text,
        display_name -> Text,
        email -> Nullable<Text>,
        role -> Text,
        is_active -> Bool,
        created_at -> Text,
        updated_at -> Text,
    }
}

diesel::table! {
    bookings (id) {
        id -> Integer,
        user_id -> Integer,
        resource_id -> Integer,
        seat_number -> Integer,
        booking_date -> Text,
        status -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    room_bookings (id) {
        id -> Integer,
        user_id -> Integer,
        resource_id -> Integer,
        slot_number -> Integer,
        booking_date -> Text,
        status -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    user_activity (id) {
        id -> Integer,
        user_id -> Integer,
        activity_type -> Text,
        booking_date -> Text,
        detail -> Nullable<Text>,
        recorded_at -> Text,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    resources,
    users,
    bookings,
    room_bookings,
    user_activity,
);

//! Reference tables read by the metadata cache. Per-line fact tables are
//! created at runtime and are not part of this schema.

diesel::table! {
    production_lines (id) {
        id -> Integer,
        #[max_length = 100]
        name -> Varchar,
        #[max_length = 50]
        code -> Varchar,
        is_active -> Bool,
        availability_target -> Nullable<Double>,
        performance_target -> Nullable<Double>,
        downtime_threshold_seconds -> Nullable<Integer>,
    }
}

diesel::table! {
    areas (id) {
        id -> Integer,
        line_id -> Integer,
        #[max_length = 100]
        name -> Varchar,
        #[max_length = 20]
        area_type -> Varchar,
        area_order -> Integer,
    }
}

diesel::table! {
    products (id) {
        id -> Integer,
        #[max_length = 100]
        name -> Varchar,
        #[max_length = 50]
        code -> Varchar,
        weight -> Nullable<Double>,
        #[max_length = 20]
        color -> Nullable<Varchar>,
        production_rate -> Nullable<Double>,
        batch_size -> Nullable<Integer>,
    }
}

diesel::table! {
    filters (id) {
        id -> Integer,
        line_id -> Integer,
        #[max_length = 100]
        name -> Varchar,
        description -> Nullable<Text>,
        is_active -> Bool,
    }
}

diesel::table! {
    shifts (id) {
        id -> Integer,
        #[max_length = 50]
        name -> Varchar,
        start_time -> Time,
        end_time -> Time,
        #[max_length = 20]
        days_of_week -> Nullable<Varchar>,
        is_active -> Bool,
    }
}

diesel::joinable!(areas -> production_lines (line_id));
diesel::joinable!(filters -> production_lines (line_id));

diesel::allow_tables_to_appear_in_same_query!(areas, filters, production_lines, products, shifts,);

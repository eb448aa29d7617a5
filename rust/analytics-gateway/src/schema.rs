//! Diesel schema for the saved query store.

diesel::table! {
    saved_queries (id) {
        id -> Int4,
        #[max_length = 255]
        customer_id -> Varchar,
        #[max_length = 255]
        prompt_id -> Varchar,
        query_text -> Text,
        prompt -> Text,
    }
}

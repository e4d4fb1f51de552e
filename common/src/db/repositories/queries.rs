// SQL query constants for repositories
// Centralizes repeated SELECT column lists

/// SQL query fragments for monitors table
pub mod monitor_queries {
    /// All columns for monitors table
    pub const SELECT_ALL_COLUMNS: &str = r#"id, owner_id, destination_id,
        origin_code, destination_code, travel_date,
        check_interval_minutes, last_check_at,
        COALESCE(known_ids, '[]'::jsonb) as known_ids,
        active, created_at"#;
}

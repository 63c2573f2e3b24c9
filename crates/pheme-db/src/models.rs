/// Database row types — these map directly to SQLite rows.
/// Distinct from the pheme-types API models to keep the store layer
/// independent; timestamps stay as stored TEXT until the API layer parses
/// them.

#[derive(Debug, Clone)]
pub struct PhemeRow {
    pub id: i64,
    pub version: u32,
    pub created_at: String,
    pub updated_at: Option<String>,
    pub visibility: u8,
    pub category: String,
    pub text: String,
    pub created_by: i64,
    pub user_id: i64,
}

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub avatar: String,
    pub created_at: String,
}

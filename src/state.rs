use crate::{
    db::{DbPool, OrmConn},
    domain::LendingPolicy,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub policy: LendingPolicy,
    pub jwt: JwtSettings,
}

#[derive(Clone)]
pub struct JwtSettings {
    pub secret: String,
    pub ttl_hours: i64,
}

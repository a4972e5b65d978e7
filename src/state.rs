use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    notify::Mailer,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: AppConfig,
    pub mailer: Mailer,
}

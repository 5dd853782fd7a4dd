use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Service;

pub fn list_services(conn: &Connection) -> Result<Vec<Service>, AppError> {
    Ok(queries::list_services(conn)?)
}

pub fn get_service(conn: &Connection, id: &str) -> Result<Service, AppError> {
    queries::get_service(conn, id)?.ok_or_else(|| AppError::NotFound(format!("service {id}")))
}

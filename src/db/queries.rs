use std::str::FromStr;

use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::models::{
    Booking, BookingDetails, BookingStatus, Operator, OperatorSession, Service, ServiceSummary,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("invalid timestamp: {s}"))
}

fn parse_price(s: &str) -> anyhow::Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("invalid price: {s}"))
}

// ── Services ──

pub fn list_services(conn: &Connection) -> anyhow::Result<Vec<Service>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, description, duration_minutes, price FROM services
         ORDER BY CAST(price AS REAL) ASC, name ASC",
    )?;

    let rows = stmt.query_map([], |row| Ok(parse_service_row(row)))?;

    let mut services = vec![];
    for row in rows {
        services.push(row??);
    }
    Ok(services)
}

pub fn get_service(conn: &Connection, id: &str) -> anyhow::Result<Option<Service>> {
    let result = conn.query_row(
        "SELECT id, name, description, duration_minutes, price FROM services WHERE id = ?1",
        params![id],
        |row| Ok(parse_service_row(row)),
    );

    match result {
        Ok(service) => Ok(Some(service?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn parse_service_row(row: &rusqlite::Row) -> anyhow::Result<Service> {
    let price: String = row.get(4)?;
    Ok(Service {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        duration_minutes: row.get(3)?,
        price: parse_price(&price)?,
    })
}

// ── Bookings ──

/// Filter for booking queries. Unset fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDateTime>,
    pub until: Option<NaiveDateTime>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookingOrder {
    #[default]
    TimeAscending,
    TimeDescending,
}

const BOOKING_COLUMNS: &str = "b.id, b.service_id, b.customer_name, b.customer_phone, b.booking_time, \
     b.status, b.notes, b.created_at, b.updated_at, s.name, s.price, s.duration_minutes";

pub fn create_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, service_id, customer_name, customer_phone, booking_time, status, notes, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.service_id,
            booking.customer_name,
            booking.customer_phone,
            format_ts(&booking.booking_time),
            booking.status.as_str(),
            booking.notes,
            format_ts(&booking.created_at),
            format_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<BookingDetails>> {
    let sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b LEFT JOIN services s ON s.id = b.service_id
         WHERE b.id = ?1"
    );
    let result = conn.query_row(&sql, params![id], |row| Ok(parse_booking_row(row)));

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn query_bookings(
    conn: &Connection,
    filter: &BookingFilter,
    order: BookingOrder,
) -> anyhow::Result<Vec<BookingDetails>> {
    let mut conditions: Vec<&str> = vec![];
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(status) = filter.status {
        conditions.push("b.status = ?");
        params_vec.push(Box::new(status.as_str()));
    }
    if let Some(from) = &filter.from {
        conditions.push("b.booking_time >= ?");
        params_vec.push(Box::new(format_ts(from)));
    }
    if let Some(until) = &filter.until {
        conditions.push("b.booking_time < ?");
        params_vec.push(Box::new(format_ts(until)));
    }

    let mut sql = format!(
        "SELECT {BOOKING_COLUMNS} FROM bookings b LEFT JOIN services s ON s.id = b.service_id"
    );
    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(match order {
        BookingOrder::TimeAscending => " ORDER BY b.booking_time ASC, b.created_at ASC",
        BookingOrder::TimeDescending => " ORDER BY b.booking_time DESC, b.created_at DESC",
    });
    if let Some(limit) = filter.limit {
        sql.push_str(" LIMIT ?");
        params_vec.push(Box::new(limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Moves a booking from `expected` to `next` only if it is still in
/// `expected`. Returns whether the row was updated.
pub fn compare_and_set_status(
    conn: &Connection,
    id: &str,
    expected: BookingStatus,
    next: BookingStatus,
) -> anyhow::Result<bool> {
    let now = format_ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![next.as_str(), now, id, expected.as_str()],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<BookingDetails> {
    let booking_time_str: String = row.get(4)?;
    let status_str: String = row.get(5)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| anyhow::anyhow!("unknown booking status: {status_str}"))?;

    let booking = Booking {
        id: row.get(0)?,
        service_id: row.get(1)?,
        customer_name: row.get(2)?,
        customer_phone: row.get(3)?,
        booking_time: parse_ts(&booking_time_str)?,
        status,
        notes: row.get(6)?,
        created_at: parse_ts(&created_at_str)?,
        updated_at: parse_ts(&updated_at_str)?,
    };

    let service_name: Option<String> = row.get(9)?;
    let service_price: Option<String> = row.get(10)?;
    let service_duration: Option<i32> = row.get(11)?;

    let service = match (service_name, service_price, service_duration) {
        (Some(name), Some(price), Some(duration_minutes)) => Some(ServiceSummary {
            name,
            price: parse_price(&price)?,
            duration_minutes,
        }),
        _ => None,
    };

    Ok(BookingDetails { booking, service })
}

// ── Operators ──

pub fn count_operators(conn: &Connection) -> anyhow::Result<i64> {
    let count = conn.query_row("SELECT COUNT(*) FROM operators", [], |row| row.get(0))?;
    Ok(count)
}

pub fn insert_operator(
    conn: &Connection,
    id: &str,
    email: &str,
    password_hash: &str,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO operators (id, email, password_hash) VALUES (?1, ?2, ?3)",
        params![id, email, password_hash],
    )?;
    Ok(())
}

/// Looks up an operator and its stored password hash by email.
pub fn get_operator_credentials(
    conn: &Connection,
    email: &str,
) -> anyhow::Result<Option<(Operator, String)>> {
    let result = conn.query_row(
        "SELECT id, email, created_at, password_hash FROM operators WHERE email = ?1",
        params![email],
        |row| {
            let created_at: String = row.get(2)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                created_at,
                row.get::<_, String>(3)?,
            ))
        },
    );

    match result {
        Ok((id, email, created_at, hash)) => Ok(Some((
            Operator {
                id,
                email,
                created_at: parse_ts(&created_at)?,
            },
            hash,
        ))),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn insert_session(conn: &Connection, session: &OperatorSession) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO operator_sessions (token, operator_id, expires_at) VALUES (?1, ?2, ?3)",
        params![
            session.token,
            session.operator_id,
            format_ts(&session.expires_at)
        ],
    )?;
    Ok(())
}

/// Returns the session for `token` if it exists and has not expired.
pub fn get_active_session(
    conn: &Connection,
    token: &str,
) -> anyhow::Result<Option<OperatorSession>> {
    let now = format_ts(&Utc::now().naive_utc());
    let result = conn.query_row(
        "SELECT s.token, s.operator_id, o.email, s.expires_at
         FROM operator_sessions s JOIN operators o ON o.id = s.operator_id
         WHERE s.token = ?1 AND s.expires_at > ?2",
        params![token, now],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        },
    );

    match result {
        Ok((token, operator_id, email, expires_at)) => Ok(Some(OperatorSession {
            token,
            operator_id,
            email,
            expires_at: parse_ts(&expires_at)?,
        })),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn delete_session(conn: &Connection, token: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM operator_sessions WHERE token = ?1",
        params![token],
    )?;
    Ok(count > 0)
}

pub fn delete_expired_sessions(conn: &Connection) -> anyhow::Result<usize> {
    let now = format_ts(&Utc::now().naive_utc());
    let count = conn.execute(
        "DELETE FROM operator_sessions WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn dt(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    fn booking(id: &str, at: &str, status: BookingStatus) -> Booking {
        let now = Utc::now().naive_utc();
        Booking {
            id: id.to_string(),
            service_id: "classic-cut".to_string(),
            customer_name: "Amir".to_string(),
            customer_phone: "+60 12-345 6789".to_string(),
            booking_time: dt(at),
            status,
            notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_seeded_catalog_is_ordered_by_price() {
        let conn = setup_db();
        let services = list_services(&conn).unwrap();
        assert!(!services.is_empty());
        for pair in services.windows(2) {
            assert!(pair[0].price <= pair[1].price);
        }
    }

    #[test]
    fn test_get_service() {
        let conn = setup_db();
        let service = get_service(&conn, "beard-trim").unwrap().unwrap();
        assert_eq!(service.name, "Beard Trim");
        assert_eq!(service.price, Decimal::new(2000, 2));
        assert!(get_service(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_booking_embeds_service() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();

        let details = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(details.booking.booking_time, dt("2025-06-16 10:00"));
        assert_eq!(details.booking.status, BookingStatus::Pending);
        let service = details.service.unwrap();
        assert_eq!(service.name, "Classic Cut");
        assert_eq!(service.price, Decimal::new(3500, 2));
    }

    #[test]
    fn test_query_filters_and_order() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "2025-06-17 10:00", BookingStatus::Pending)).unwrap();
        create_booking(&conn, &booking("b2", "2025-06-16 10:00", BookingStatus::Completed)).unwrap();
        create_booking(&conn, &booking("b3", "2025-06-18 10:00", BookingStatus::Pending)).unwrap();

        let all = query_bookings(&conn, &BookingFilter::default(), BookingOrder::TimeAscending)
            .unwrap();
        let ids: Vec<_> = all.iter().map(|b| b.booking.id.as_str()).collect();
        assert_eq!(ids, vec!["b2", "b1", "b3"]);

        let pending = query_bookings(
            &conn,
            &BookingFilter {
                status: Some(BookingStatus::Pending),
                limit: Some(1),
                ..Default::default()
            },
            BookingOrder::TimeDescending,
        )
        .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].booking.id, "b3");

        let window = query_bookings(
            &conn,
            &BookingFilter {
                from: Some(dt("2025-06-17 00:00")),
                until: Some(dt("2025-06-18 00:00")),
                ..Default::default()
            },
            BookingOrder::TimeAscending,
        )
        .unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].booking.id, "b1");
    }

    #[test]
    fn test_compare_and_set_status() {
        let conn = setup_db();
        create_booking(
            &conn,
            &booking("b1", "2025-06-16 10:00", BookingStatus::AwaitingPayment),
        )
        .unwrap();

        // Wrong expectation leaves the row alone
        assert!(!compare_and_set_status(
            &conn,
            "b1",
            BookingStatus::Pending,
            BookingStatus::Completed
        )
        .unwrap());
        assert!(compare_and_set_status(
            &conn,
            "b1",
            BookingStatus::AwaitingPayment,
            BookingStatus::Pending
        )
        .unwrap());
        assert!(!compare_and_set_status(
            &conn,
            "b1",
            BookingStatus::AwaitingPayment,
            BookingStatus::Pending
        )
        .unwrap());

        let details = get_booking_by_id(&conn, "b1").unwrap().unwrap();
        assert_eq!(details.booking.status, BookingStatus::Pending);
    }

    #[test]
    fn test_unknown_status_fails_row_parsing() {
        let conn = setup_db();
        create_booking(&conn, &booking("b1", "2025-06-16 10:00", BookingStatus::Pending)).unwrap();
        // Bypass the CHECK constraint to simulate a corrupted row
        conn.execute_batch("PRAGMA ignore_check_constraints = ON;").unwrap();
        conn.execute("UPDATE bookings SET status = 'confirmed' WHERE id = 'b1'", [])
            .unwrap();

        assert!(get_booking_by_id(&conn, "b1").is_err());
    }

    #[test]
    fn test_sessions_expire() {
        let conn = setup_db();
        insert_operator(&conn, "op-1", "owner@trimflow.test", "salt$hash").unwrap();

        let live = OperatorSession {
            token: "live".to_string(),
            operator_id: "op-1".to_string(),
            email: "owner@trimflow.test".to_string(),
            expires_at: Utc::now().naive_utc() + chrono::Duration::hours(1),
        };
        let stale = OperatorSession {
            token: "stale".to_string(),
            expires_at: Utc::now().naive_utc() - chrono::Duration::hours(1),
            ..live.clone()
        };
        insert_session(&conn, &live).unwrap();
        insert_session(&conn, &stale).unwrap();

        assert!(get_active_session(&conn, "live").unwrap().is_some());
        assert!(get_active_session(&conn, "stale").unwrap().is_none());
        assert_eq!(delete_expired_sessions(&conn).unwrap(), 1);
        assert!(delete_session(&conn, "live").unwrap());
        assert!(get_active_session(&conn, "live").unwrap().is_none());
    }
}

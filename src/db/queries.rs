use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    BankDetails, Booking, BookingStatus, Coordinates, PaymentMethod, Provider, Urgency,
    WithdrawalEntry, WithdrawalStatus,
};

const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const DATE_FORMAT: &str = "%Y-%m-%d";

const BOOKING_COLUMNS: &str = "id, user_id, provider_id, service_type, description, preferred_date, \
     preferred_time, urgency, budget, address, contact_phone, service_category, duration, \
     duration_value, latitude, longitude, skill_tags, insurance_required, background_check_required, \
     base_price, surge_multiplier, insurance_cost, status, accepted_at, rejected_at, rejection_reason, \
     started_at, completed_at, provider_notes, estimated_duration, final_amount, amount, currency, \
     rating, review, reviewed_at, paid_at, version, created_at, updated_at";

const PROVIDER_COLUMNS: &str = "id, user_id, category, description, verified, available, rating, \
     total_earnings, platform_fees, completed_bookings, bank_account_number, bank_ifsc_code, \
     bank_account_holder_name, bank_name, upi_id, created_at, updated_at";

fn fmt_ts(ts: &NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

fn fmt_opt_ts(ts: &Option<NaiveDateTime>) -> Option<String> {
    ts.as_ref().map(fmt_ts)
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).with_context(|| format!("invalid timestamp: {s}"))
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    s.as_deref().map(parse_ts).transpose()
}

/// Whose bookings a lookup is allowed to see.
#[derive(Debug, Clone, Copy)]
pub enum Owner<'a> {
    Customer(&'a str),
    Provider(&'a str),
    Anyone,
}

impl<'a> Owner<'a> {
    fn column(&self) -> Option<(&'static str, &'a str)> {
        match self {
            Owner::Customer(user_id) => Some(("user_id", user_id)),
            Owner::Provider(provider_id) => Some(("provider_id", provider_id)),
            Owner::Anyone => None,
        }
    }
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    let skill_tags = serde_json::to_string(&booking.skill_tags)?;

    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS}) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20,
                ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34, ?35, ?36, ?37, ?38, ?39, ?40
            )"
        ),
        params![
            booking.id,
            booking.user_id,
            booking.provider_id,
            booking.service_type,
            booking.description,
            booking.preferred_date.format(DATE_FORMAT).to_string(),
            booking.preferred_time,
            booking.urgency.as_str(),
            booking.budget,
            booking.address,
            booking.contact_phone,
            booking.service_category,
            booking.duration,
            booking.duration_value,
            booking.coordinates.map(|c| c.lat),
            booking.coordinates.map(|c| c.lng),
            skill_tags,
            booking.insurance_required as i32,
            booking.background_check_required as i32,
            booking.base_price,
            booking.surge_multiplier,
            booking.insurance_cost,
            booking.status.as_str(),
            fmt_opt_ts(&booking.accepted_at),
            fmt_opt_ts(&booking.rejected_at),
            booking.rejection_reason,
            fmt_opt_ts(&booking.started_at),
            fmt_opt_ts(&booking.completed_at),
            booking.provider_notes,
            booking.estimated_duration,
            booking.final_amount,
            booking.amount,
            booking.currency,
            booking.rating,
            booking.review,
            fmt_opt_ts(&booking.reviewed_at),
            fmt_opt_ts(&booking.paid_at),
            booking.version,
            fmt_ts(&booking.created_at),
            fmt_ts(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    find_booking(conn, id, Owner::Anyone)
}

/// Finds a booking only if `owner` may see it; a booking owned by someone
/// else is indistinguishable from one that does not exist.
pub fn find_booking(conn: &Connection, id: &str, owner: Owner<'_>) -> anyhow::Result<Option<Booking>> {
    let result = match owner.column() {
        Some((column, value)) => conn.query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1 AND {column} = ?2"),
            params![id, value],
            |row| Ok(parse_booking_row(row)),
        ),
        None => conn.query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        ),
    };

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_bookings(
    conn: &Connection,
    owner: Owner<'_>,
    status_filter: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    let mut sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE 1 = 1");
    let mut params_vec: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some((column, value)) = owner.column() {
        params_vec.push(Box::new(value.to_string()));
        sql.push_str(&format!(" AND {column} = ?{}", params_vec.len()));
    }
    if let Some(status) = status_filter {
        params_vec.push(Box::new(status.as_str()));
        sql.push_str(&format!(" AND status = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(limit));
    sql.push_str(&format!(
        " ORDER BY created_at DESC, rowid DESC LIMIT ?{}",
        params_vec.len()
    ));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// A single status change, applied only if the booking is still in `from`
/// at `expected_version`.
#[derive(Debug, Clone)]
pub struct TransitionUpdate<'a> {
    pub id: &'a str,
    pub owner: Owner<'a>,
    pub from: BookingStatus,
    pub to: BookingStatus,
    pub expected_version: i64,
    pub at: NaiveDateTime,
    pub rejection_reason: Option<&'a str>,
    pub provider_notes: Option<&'a str>,
    pub estimated_duration: Option<&'a str>,
    pub final_amount: Option<i64>,
}

impl<'a> TransitionUpdate<'a> {
    pub fn new(
        id: &'a str,
        owner: Owner<'a>,
        from: BookingStatus,
        to: BookingStatus,
        expected_version: i64,
        at: NaiveDateTime,
    ) -> Self {
        Self {
            id,
            owner,
            from,
            to,
            expected_version,
            at,
            rejection_reason: None,
            provider_notes: None,
            estimated_duration: None,
            final_amount: None,
        }
    }
}

/// Returns false when nothing matched: the booking is gone, owned by someone
/// else, or another writer moved it first.
pub fn apply_transition(conn: &Connection, update: &TransitionUpdate<'_>) -> anyhow::Result<bool> {
    anyhow::ensure!(
        update.from.can_transition_to(update.to),
        "illegal transition {} -> {}",
        update.from,
        update.to
    );

    let timestamp_column = match update.to {
        BookingStatus::Accepted => Some("accepted_at"),
        BookingStatus::Rejected => Some("rejected_at"),
        BookingStatus::InProgress => Some("started_at"),
        BookingStatus::Completed => Some("completed_at"),
        BookingStatus::Pending | BookingStatus::Cancelled => None,
    };
    let set_timestamp = timestamp_column
        .map(|c| format!("{c} = ?2,"))
        .unwrap_or_default();

    let (owner_clause, owner_value) = match update.owner.column() {
        Some((column, value)) => (format!("AND {column} = ?9"), Some(value)),
        None => ("AND ?9 IS NULL".to_string(), None),
    };

    let sql = format!(
        "UPDATE bookings SET
            status = ?1,
            {set_timestamp}
            rejection_reason = COALESCE(?3, rejection_reason),
            provider_notes = COALESCE(?4, provider_notes),
            estimated_duration = COALESCE(?5, estimated_duration),
            final_amount = COALESCE(?6, final_amount),
            version = version + 1,
            updated_at = ?2
         WHERE id = ?7 AND status = ?8 {owner_clause} AND version = ?10"
    );

    let count = conn.execute(
        &sql,
        params![
            update.to.as_str(),
            fmt_ts(&update.at),
            update.rejection_reason,
            update.provider_notes,
            update.estimated_duration,
            update.final_amount,
            update.id,
            update.from.as_str(),
            owner_value,
            update.expected_version,
        ],
    )?;
    Ok(count > 0)
}

/// Writes a review onto a completed, not-yet-reviewed booking.
pub fn record_review(
    conn: &Connection,
    id: &str,
    user_id: &str,
    rating: u8,
    review: &str,
    at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let now = fmt_ts(at);
    let count = conn.execute(
        "UPDATE bookings SET rating = ?1, review = ?2, reviewed_at = ?3, updated_at = ?3, version = version + 1
         WHERE id = ?4 AND user_id = ?5 AND status = 'completed' AND rating IS NULL",
        params![rating, review, now, id, user_id],
    )?;
    Ok(count > 0)
}

pub fn ratings_for_provider(conn: &Connection, provider_id: &str) -> anyhow::Result<Vec<u8>> {
    let mut stmt = conn.prepare(
        "SELECT rating FROM bookings WHERE provider_id = ?1 AND rating IS NOT NULL",
    )?;
    let rows = stmt.query_map(params![provider_id], |row| row.get::<_, u8>(0))?;

    let mut ratings = vec![];
    for row in rows {
        ratings.push(row?);
    }
    Ok(ratings)
}

/// Stamps the payout time on a completed booking that has not been paid yet.
pub fn mark_booking_paid(
    conn: &Connection,
    id: &str,
    provider_id: &str,
    at: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let now = fmt_ts(at);
    let count = conn.execute(
        "UPDATE bookings SET paid_at = ?1, updated_at = ?1, version = version + 1
         WHERE id = ?2 AND provider_id = ?3 AND status = 'completed' AND paid_at IS NULL",
        params![now, id, provider_id],
    )?;
    Ok(count > 0)
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let preferred_date_str: String = row.get("preferred_date")?;
    let urgency_str: String = row.get("urgency")?;
    let status_str: String = row.get("status")?;
    let skill_tags_json: String = row.get("skill_tags")?;
    let latitude: Option<f64> = row.get("latitude")?;
    let longitude: Option<f64> = row.get("longitude")?;

    let coordinates = match (latitude, longitude) {
        (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
        _ => None,
    };

    Ok(Booking {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        provider_id: row.get("provider_id")?,
        service_type: row.get("service_type")?,
        description: row.get("description")?,
        preferred_date: NaiveDate::parse_from_str(&preferred_date_str, DATE_FORMAT)
            .with_context(|| format!("invalid preferred_date: {preferred_date_str}"))?,
        preferred_time: row.get("preferred_time")?,
        urgency: Urgency::parse(&urgency_str)
            .with_context(|| format!("unknown urgency: {urgency_str}"))?,
        budget: row.get("budget")?,
        address: row.get("address")?,
        contact_phone: row.get("contact_phone")?,
        service_category: row.get("service_category")?,
        duration: row.get("duration")?,
        duration_value: row.get("duration_value")?,
        coordinates,
        skill_tags: serde_json::from_str(&skill_tags_json)
            .with_context(|| format!("invalid skill_tags: {skill_tags_json}"))?,
        insurance_required: row.get::<_, i32>("insurance_required")? != 0,
        background_check_required: row.get::<_, i32>("background_check_required")? != 0,
        base_price: row.get("base_price")?,
        surge_multiplier: row.get("surge_multiplier")?,
        insurance_cost: row.get("insurance_cost")?,
        status: BookingStatus::parse(&status_str)
            .with_context(|| format!("unknown booking status: {status_str}"))?,
        accepted_at: parse_opt_ts(row.get("accepted_at")?)?,
        rejected_at: parse_opt_ts(row.get("rejected_at")?)?,
        rejection_reason: row.get("rejection_reason")?,
        started_at: parse_opt_ts(row.get("started_at")?)?,
        completed_at: parse_opt_ts(row.get("completed_at")?)?,
        provider_notes: row.get("provider_notes")?,
        estimated_duration: row.get("estimated_duration")?,
        final_amount: row.get("final_amount")?,
        amount: row.get("amount")?,
        currency: row.get("currency")?,
        rating: row.get("rating")?,
        review: row.get("review")?,
        reviewed_at: parse_opt_ts(row.get("reviewed_at")?)?,
        paid_at: parse_opt_ts(row.get("paid_at")?)?,
        version: row.get("version")?,
        created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
    })
}

// ── Providers ──

pub fn insert_provider(conn: &Connection, provider: &Provider) -> anyhow::Result<()> {
    let bank = provider.bank_details.as_ref();
    conn.execute(
        &format!(
            "INSERT INTO providers ({PROVIDER_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            provider.id,
            provider.user_id,
            provider.category,
            provider.description,
            provider.verified as i32,
            provider.available as i32,
            provider.rating,
            provider.total_earnings,
            provider.platform_fees,
            provider.completed_bookings,
            bank.map(|b| b.account_number.as_str()),
            bank.map(|b| b.ifsc_code.as_str()),
            bank.map(|b| b.account_holder_name.as_str()),
            bank.map(|b| b.bank_name.as_str()),
            provider.upi_id,
            fmt_ts(&provider.created_at),
            fmt_ts(&provider.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_provider(conn: &Connection, id: &str) -> anyhow::Result<Option<Provider>> {
    conn.query_row(
        &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE id = ?1"),
        params![id],
        |row| Ok(parse_provider_row(row)),
    )
    .optional()?
    .transpose()
}

pub fn get_provider_by_user(conn: &Connection, user_id: &str) -> anyhow::Result<Option<Provider>> {
    conn.query_row(
        &format!("SELECT {PROVIDER_COLUMNS} FROM providers WHERE user_id = ?1"),
        params![user_id],
        |row| Ok(parse_provider_row(row)),
    )
    .optional()?
    .transpose()
}

pub fn set_provider_rating(conn: &Connection, id: &str, rating: f64) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE providers SET rating = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![rating, id],
    )?;
    Ok(())
}

pub fn set_provider_verified(conn: &Connection, id: &str, verified: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE providers SET verified = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![verified as i32, id],
    )?;
    Ok(count > 0)
}

pub fn set_provider_available(conn: &Connection, id: &str, available: bool) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE providers SET available = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![available as i32, id],
    )?;
    Ok(count > 0)
}

/// Adds one paid booking to the provider's running totals.
pub fn credit_provider_earnings(
    conn: &Connection,
    id: &str,
    earnings: f64,
    commission: f64,
) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE providers SET
            total_earnings = total_earnings + ?1,
            platform_fees = platform_fees + ?2,
            completed_bookings = completed_bookings + 1,
            updated_at = datetime('now')
         WHERE id = ?3",
        params![earnings, commission, id],
    )?;
    Ok(())
}

pub fn save_bank_details(conn: &Connection, id: &str, bank: &BankDetails) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE providers SET
            bank_account_number = ?1,
            bank_ifsc_code = ?2,
            bank_account_holder_name = ?3,
            bank_name = ?4,
            updated_at = datetime('now')
         WHERE id = ?5",
        params![
            bank.account_number,
            bank.ifsc_code,
            bank.account_holder_name,
            bank.bank_name,
            id
        ],
    )?;
    Ok(())
}

pub fn save_upi_id(conn: &Connection, id: &str, upi_id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE providers SET upi_id = ?1, updated_at = datetime('now') WHERE id = ?2",
        params![upi_id, id],
    )?;
    Ok(())
}

fn parse_provider_row(row: &rusqlite::Row) -> anyhow::Result<Provider> {
    let account_number: Option<String> = row.get("bank_account_number")?;
    let bank_details = match account_number {
        Some(account_number) => Some(BankDetails {
            account_number,
            ifsc_code: row.get::<_, Option<String>>("bank_ifsc_code")?.unwrap_or_default(),
            account_holder_name: row
                .get::<_, Option<String>>("bank_account_holder_name")?
                .unwrap_or_default(),
            bank_name: row.get::<_, Option<String>>("bank_name")?.unwrap_or_default(),
        }),
        None => None,
    };

    Ok(Provider {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        category: row.get("category")?,
        description: row.get("description")?,
        verified: row.get::<_, i32>("verified")? != 0,
        available: row.get::<_, i32>("available")? != 0,
        rating: row.get("rating")?,
        total_earnings: row.get("total_earnings")?,
        platform_fees: row.get("platform_fees")?,
        completed_bookings: row.get("completed_bookings")?,
        bank_details,
        upi_id: row.get("upi_id")?,
        created_at: parse_ts(&row.get::<_, String>("created_at")?)?,
        updated_at: parse_ts(&row.get::<_, String>("updated_at")?)?,
    })
}

// ── Withdrawals ──

pub fn insert_withdrawal(
    conn: &Connection,
    provider_id: &str,
    entry: &WithdrawalEntry,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO withdrawals (provider_id, amount, date, status, transaction_id, payment_method)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            provider_id,
            entry.amount,
            fmt_ts(&entry.date),
            entry.status.as_str(),
            entry.transaction_id,
            entry.payment_method.map(|m| m.as_str()),
        ],
    )?;
    Ok(())
}

/// The provider's ledger in insertion order.
pub fn get_withdrawal_history(
    conn: &Connection,
    provider_id: &str,
) -> anyhow::Result<Vec<WithdrawalEntry>> {
    let mut stmt = conn.prepare(
        "SELECT amount, date, status, transaction_id, payment_method
         FROM withdrawals WHERE provider_id = ?1 ORDER BY id ASC",
    )?;

    let rows = stmt.query_map(params![provider_id], |row| {
        let amount: f64 = row.get(0)?;
        let date: String = row.get(1)?;
        let status: String = row.get(2)?;
        let transaction_id: String = row.get(3)?;
        let payment_method: Option<String> = row.get(4)?;
        Ok((amount, date, status, transaction_id, payment_method))
    })?;

    let mut entries = vec![];
    for row in rows {
        let (amount, date, status, transaction_id, payment_method) = row?;
        entries.push(WithdrawalEntry {
            amount,
            date: parse_ts(&date)?,
            status: WithdrawalStatus::parse(&status)
                .with_context(|| format!("unknown withdrawal status: {status}"))?,
            transaction_id,
            payment_method: payment_method.as_deref().and_then(PaymentMethod::parse),
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{NewBooking, Urgency};

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-06-16 09:00:00", TS_FORMAT).unwrap()
    }

    fn seed_booking(conn: &Connection, id: &str) -> Booking {
        let booking = Booking::new(
            id.to_string(),
            "user-1".to_string(),
            NewBooking {
                provider_id: "prov-1".to_string(),
                service_type: "cleaning".to_string(),
                description: "deep clean of a two bedroom flat".to_string(),
                preferred_date: NaiveDate::from_ymd_opt(2025, 6, 20).unwrap(),
                preferred_time: "09:00-11:00".to_string(),
                urgency: Urgency::Low,
                budget: Some(80.0),
                address: "4 Park Lane".to_string(),
                contact_phone: Some("+919800000000".to_string()),
                service_category: Some("home".to_string()),
                duration: Some("hours".to_string()),
                duration_value: Some(2.0),
                coordinates: Some(Coordinates { lat: 12.97, lng: 77.59 }),
                skill_tags: vec!["eco-products".to_string()],
                insurance_required: true,
                background_check_required: false,
                base_price: Some(5000),
                surge_multiplier: 1.2,
                insurance_cost: 500,
                amount: 6500,
                currency: "inr".to_string(),
            },
            now(),
        );
        insert_booking(conn, &booking).unwrap();
        booking
    }

    #[test]
    fn test_insert_and_find_booking() {
        let conn = setup_db();
        seed_booking(&conn, "bk-1");

        let found = find_booking(&conn, "bk-1", Owner::Customer("user-1")).unwrap().unwrap();
        assert_eq!(found.status, BookingStatus::Pending);
        assert_eq!(found.coordinates, Some(Coordinates { lat: 12.97, lng: 77.59 }));
        assert_eq!(found.skill_tags, vec!["eco-products".to_string()]);
        assert!(found.insurance_required);
        assert_eq!(found.created_at, now());
    }

    #[test]
    fn test_find_booking_hides_foreign_owner() {
        let conn = setup_db();
        seed_booking(&conn, "bk-1");

        assert!(find_booking(&conn, "bk-1", Owner::Customer("user-2")).unwrap().is_none());
        assert!(find_booking(&conn, "bk-1", Owner::Provider("prov-2")).unwrap().is_none());
        assert!(find_booking(&conn, "bk-1", Owner::Provider("prov-1")).unwrap().is_some());
        assert!(get_booking_by_id(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_corrupt_skill_tags_is_an_error() {
        let conn = setup_db();
        seed_booking(&conn, "bk-1");
        conn.execute("UPDATE bookings SET skill_tags = 'not json' WHERE id = 'bk-1'", [])
            .unwrap();

        let err = get_booking_by_id(&conn, "bk-1").unwrap_err();
        assert!(err.to_string().contains("invalid skill_tags"));
    }

    #[test]
    fn test_transition_requires_matching_version() {
        let conn = setup_db();
        let booking = seed_booking(&conn, "bk-1");

        let stale = TransitionUpdate::new(
            "bk-1",
            Owner::Provider("prov-1"),
            BookingStatus::Pending,
            BookingStatus::Accepted,
            booking.version + 1,
            now(),
        );
        assert!(!apply_transition(&conn, &stale).unwrap());

        let fresh = TransitionUpdate {
            provider_notes: Some("bringing ladder"),
            expected_version: booking.version,
            ..stale
        };
        assert!(apply_transition(&conn, &fresh).unwrap());

        let updated = get_booking_by_id(&conn, "bk-1").unwrap().unwrap();
        assert_eq!(updated.status, BookingStatus::Accepted);
        assert_eq!(updated.version, booking.version + 1);
        assert_eq!(updated.accepted_at, Some(now()));
        assert_eq!(updated.provider_notes.as_deref(), Some("bringing ladder"));

        // Replaying the same update finds nothing to change.
        assert!(!apply_transition(&conn, &fresh).unwrap());
    }

    #[test]
    fn test_transition_rejects_illegal_edge() {
        let conn = setup_db();
        seed_booking(&conn, "bk-1");

        let update = TransitionUpdate::new(
            "bk-1",
            Owner::Anyone,
            BookingStatus::Pending,
            BookingStatus::Completed,
            0,
            now(),
        );
        assert!(apply_transition(&conn, &update).is_err());
    }

    #[test]
    fn test_review_only_once_and_only_when_completed() {
        let conn = setup_db();
        seed_booking(&conn, "bk-1");

        assert!(!record_review(&conn, "bk-1", "user-1", 4, "great", &now()).unwrap());

        conn.execute("UPDATE bookings SET status = 'completed' WHERE id = 'bk-1'", [])
            .unwrap();
        assert!(record_review(&conn, "bk-1", "user-1", 4, "great", &now()).unwrap());
        assert!(!record_review(&conn, "bk-1", "user-1", 1, "changed my mind", &now()).unwrap());

        assert_eq!(ratings_for_provider(&conn, "prov-1").unwrap(), vec![4]);
    }

    #[test]
    fn test_list_bookings_filters_and_orders() {
        let conn = setup_db();
        seed_booking(&conn, "bk-1");
        seed_booking(&conn, "bk-2");
        conn.execute("UPDATE bookings SET status = 'cancelled' WHERE id = 'bk-1'", [])
            .unwrap();

        let all = list_bookings(&conn, Owner::Customer("user-1"), None, 100).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "bk-2");

        let cancelled =
            list_bookings(&conn, Owner::Anyone, Some(BookingStatus::Cancelled), 100).unwrap();
        assert_eq!(cancelled.len(), 1);
        assert_eq!(cancelled[0].id, "bk-1");

        let limited = list_bookings(&conn, Owner::Provider("prov-1"), None, 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_provider_payment_details_round_trip() {
        let conn = setup_db();
        let provider = Provider::new(
            "prov-1".to_string(),
            "puser-1".to_string(),
            "electrical".to_string(),
            "licensed electrician".to_string(),
            now(),
        );
        insert_provider(&conn, &provider).unwrap();

        let bank = BankDetails {
            account_number: "001122334455".to_string(),
            ifsc_code: "SBIN0000001".to_string(),
            account_holder_name: "Asha Rao".to_string(),
            bank_name: "SBI".to_string(),
        };
        save_bank_details(&conn, "prov-1", &bank).unwrap();
        save_upi_id(&conn, "prov-1", "asha@okbank").unwrap();
        credit_provider_earnings(&conn, "prov-1", 85.0, 15.0).unwrap();

        let loaded = get_provider_by_user(&conn, "puser-1").unwrap().unwrap();
        assert_eq!(loaded.bank_details, Some(bank));
        assert_eq!(loaded.upi_id.as_deref(), Some("asha@okbank"));
        assert_eq!(loaded.total_earnings, 85.0);
        assert_eq!(loaded.platform_fees, 15.0);
        assert_eq!(loaded.completed_bookings, 1);
        assert!(get_provider(&conn, "missing").unwrap().is_none());
    }

    #[test]
    fn test_withdrawal_history_keeps_insertion_order() {
        let conn = setup_db();
        let provider = Provider::new(
            "prov-1".to_string(),
            "puser-1".to_string(),
            "driving".to_string(),
            String::new(),
            now(),
        );
        insert_provider(&conn, &provider).unwrap();

        for (i, status) in [WithdrawalStatus::Completed, WithdrawalStatus::Pending]
            .into_iter()
            .enumerate()
        {
            insert_withdrawal(
                &conn,
                "prov-1",
                &WithdrawalEntry {
                    amount: 100.0 + i as f64,
                    date: now(),
                    status,
                    transaction_id: format!("TXN-{i}"),
                    payment_method: Some(PaymentMethod::Upi),
                },
            )
            .unwrap();
        }

        let history = get_withdrawal_history(&conn, "prov-1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transaction_id, "TXN-0");
        assert_eq!(history[1].status, WithdrawalStatus::Pending);
    }
}

use sqlx::MySqlConnection;

/// `EMP-2026-0007`: prefix, joining year, per-year sequence
pub fn format_employee_id(prefix: &str, year: i32, seq: u32) -> String {
    format!("{prefix}-{year}-{seq:04}")
}

/// Allocates the next id for `year`.
///
/// Must run inside the transaction that inserts the user: the upsert locks
/// the counter row until commit, so concurrent allocations serialize.
pub async fn next_employee_id(
    conn: &mut MySqlConnection,
    prefix: &str,
    year: i32,
) -> Result<String, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO employee_sequences (year, last_seq)
        VALUES (?, 1)
        ON DUPLICATE KEY UPDATE last_seq = last_seq + 1
        "#,
    )
    .bind(year)
    .execute(&mut *conn)
    .await?;

    let seq: u32 = sqlx::query_scalar("SELECT last_seq FROM employee_sequences WHERE year = ?")
        .bind(year)
        .fetch_one(&mut *conn)
        .await?;

    Ok(format_employee_id(prefix, year, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_sequence_to_four_digits() {
        assert_eq!(format_employee_id("EMP", 2026, 7), "EMP-2026-0007");
        assert_eq!(format_employee_id("ACME", 2027, 12345), "ACME-2027-12345");
    }

    #[test]
    fn ids_sort_in_allocation_order_within_a_year() {
        let a = format_employee_id("EMP", 2026, 9);
        let b = format_employee_id("EMP", 2026, 10);
        assert!(a < b);
    }
}

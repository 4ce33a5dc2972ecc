//! Per-service daily queue numbering.

use chrono::{DateTime, Utc};

use super::DayBoundary;
use crate::model::Service;
use crate::store::{StoreError, StoreTx, TicketFilter};

/// Next queue number for `service` on the day containing `now`.
///
/// The count and the caller's insert must happen in the same unit of work,
/// otherwise two registrations can draw the same number.
pub fn next_queue_number(
    tx: &dyn StoreTx,
    service: &Service,
    boundary: DayBoundary,
    now: DateTime<Utc>,
) -> Result<String, StoreError> {
    let (start, end) = boundary.day_window(now);
    let issued = tx.count_tickets(
        &TicketFilter::new()
            .with_service(service.id)
            .created_between(start, end),
    )?;
    Ok(format_queue_number(service.prefix, issued + 1))
}

/// `<prefix><sequence>`, zero-padded to three digits. Longer sequences keep
/// all their digits.
pub fn format_queue_number(prefix: char, sequence: i64) -> String {
    format!("{}{:03}", prefix, sequence)
}

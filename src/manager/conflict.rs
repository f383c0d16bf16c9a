use crate::model::*;

use super::ReservationError;

/// A request after validation: trimmed id, non-empty interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub resource_id: String,
    pub span: Span,
}

pub(crate) fn normalize_resource_id(resource_id: &str) -> Result<String, ReservationError> {
    let trimmed = resource_id.trim();
    if trimmed.is_empty() {
        return Err(ReservationError::invalid("resource id is required"));
    }
    Ok(trimmed.to_string())
}

/// Timestamps pass through untouched; they are already local civil time.
pub(crate) fn normalize_span(
    start: LocalDateTime,
    end: LocalDateTime,
) -> Result<Span, ReservationError> {
    if end <= start {
        return Err(ReservationError::invalid("end time must be after start time"));
    }
    Ok(Span::new(start, end))
}

/// First reservation on `resource_id` overlapping `span`. Rows for other
/// resources are ignored even if the store hands them back.
pub(crate) fn first_overlap<'a>(
    existing: &'a [Reservation],
    resource_id: &str,
    span: &Span,
) -> Option<&'a Reservation> {
    existing
        .iter()
        .find(|r| r.resource_id == resource_id && r.span().overlaps(span))
}

/// Stable sort: equal starts keep the order the store returned them in.
pub(crate) fn sort_by_start(reservations: &mut [Reservation]) {
    reservations.sort_by_key(|r| r.start);
}

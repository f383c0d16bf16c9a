use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Local civil time. No offset is attached and nothing is ever converted to UTC.
pub type LocalDateTime = NaiveDateTime;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: LocalDateTime,
    pub end: LocalDateTime,
}

impl Span {
    pub fn new(start: LocalDateTime, end: LocalDateTime) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }

    /// Touching spans (`a.end == b.start`) do not overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && self.end > other.start
    }
}

/// A booking of one resource. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Ulid,
    pub resource_id: String,
    pub start: LocalDateTime,
    pub end: LocalDateTime,
}

impl Reservation {
    pub fn span(&self) -> Span {
        Span {
            start: self.start,
            end: self.end,
        }
    }
}

/// Per-resource view held by the stores: reservations kept sorted by `start`,
/// each tagged with its global insertion sequence.
#[derive(Debug, Clone, Default)]
pub struct ResourceState {
    pub entries: Vec<(u64, Reservation)>,
}

impl ResourceState {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert after every entry with the same or earlier start, so equal
    /// starts stay in insertion order.
    pub fn insert(&mut self, seq: u64, reservation: Reservation) {
        let pos = self
            .entries
            .partition_point(|(_, r)| r.start <= reservation.start);
        self.entries.insert(pos, (seq, reservation));
    }

    /// Return only reservations whose span overlaps the query window.
    /// Uses binary search to skip reservations starting at or after `query.end`.
    pub fn overlapping(&self, query: &Span) -> impl Iterator<Item = &Reservation> {
        let right_bound = self
            .entries
            .partition_point(|(_, r)| r.start < query.end);
        self.entries[..right_bound]
            .iter()
            .map(|(_, r)| r)
            .filter(move |r| r.end > query.start)
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.entries.iter().map(|(_, r)| r)
    }
}

/// The WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationCreated {
        id: Ulid,
        resource_id: String,
        start: LocalDateTime,
        end: LocalDateTime,
    },
}

impl From<&Reservation> for Event {
    fn from(r: &Reservation) -> Self {
        Event::ReservationCreated {
            id: r.id,
            resource_id: r.resource_id.clone(),
            start: r.start,
            end: r.end,
        }
    }
}

impl From<Event> for Reservation {
    fn from(event: Event) -> Self {
        match event {
            Event::ReservationCreated {
                id,
                resource_id,
                start,
                end,
            } => Reservation {
                id,
                resource_id,
                start,
                end,
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn at(hour: u32, minute: u32) -> LocalDateTime {
    chrono::NaiveDate::from_ymd_opt(2025, 3, 14)
        .unwrap()
        .and_hms_opt(hour, minute, 0)
        .unwrap()
}

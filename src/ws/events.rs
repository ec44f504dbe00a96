use chrono::{NaiveDate, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "camelCase")]
pub enum Event {
    AttendanceUpdated {
        user_id: u64,
        from: NaiveDate,
        to: NaiveDate,
    },
    HolidayUpdated {
        year: i32,
    },
    AnnouncementCreated {
        id: u64,
    },
    AnnouncementUpdated {
        id: u64,
    },
    AnnouncementDeleted {
        id: u64,
    },
}

impl Event {
    pub fn attendance_on(user_id: u64, date: NaiveDate) -> Self {
        Event::AttendanceUpdated {
            user_id,
            from: date,
            to: date,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Event::AttendanceUpdated { .. } => "attendanceUpdated",
            Event::HolidayUpdated { .. } => "holidayUpdated",
            Event::AnnouncementCreated { .. } => "announcementCreated",
            Event::AnnouncementUpdated { .. } => "announcementUpdated",
            Event::AnnouncementDeleted { .. } => "announcementDeleted",
        }
    }
}

#[derive(Serialize)]
struct Envelope<'a> {
    #[serde(flatten)]
    event: &'a Event,
    ts: String,
}

/// `{"event": "...", "payload": {...}, "ts": "<rfc3339>"}`
pub fn envelope(event: &Event) -> Result<String, serde_json::Error> {
    serde_json::to_string(&Envelope {
        event,
        ts: Utc::now().to_rfc3339(),
    })
}

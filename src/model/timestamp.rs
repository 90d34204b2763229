use chrono::Utc;

pub type Timestamp = chrono::DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}

use crate::attribute::Attributes;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};

/// Well-known attribute names.
pub mod keys {
    pub const TIMESTAMP: &str = "timestamp";
    pub const SEVERITY: &str = "severity";
    pub const MESSAGE: &str = "message";
    pub const TARGET: &str = "target";
    pub const PID: &str = "pid";
    pub const TID: &str = "tid";
}

static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_ID: String = format!("{:#x}", NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed));
}

/// Id of the current process, the value of the `pid` attribute.
pub fn process_id() -> u64 {
    u64::from(std::process::id())
}

/// Hex id of the calling thread, the value of the `tid` attribute.
/// Ids are handed out on first use and never reused within the process.
pub fn thread_id() -> String {
    THREAD_ID.with(|id| id.clone())
}

/// A single log event. Its attributes are fixed once the record exists.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    attributes: Attributes,
}

impl LogRecord {
    pub fn new(attributes: Attributes) -> Self {
        LogRecord { attributes }
    }

    /// Build a record carrying `timestamp`, `severity` and `message`,
    /// followed by `extra` in its own order.
    pub fn with_message(
        timestamp: DateTime<Utc>,
        severity: &str,
        message: &str,
        extra: Attributes,
    ) -> Self {
        let mut attributes = Attributes::new()
            .with(keys::TIMESTAMP, timestamp)
            .with(keys::SEVERITY, severity)
            .with(keys::MESSAGE, message);
        for (name, value) in extra.iter() {
            attributes.insert(name, value.clone());
        }
        LogRecord { attributes }
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn thread_id_is_stable_per_thread_and_distinct_across_threads() {
        let here = thread_id();
        assert!(here.starts_with("0x"));
        assert_eq!(thread_id(), here);

        let there = std::thread::spawn(thread_id).join().unwrap();
        assert_ne!(there, here);
    }

    #[test]
    fn extras_follow_base_attributes() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let extra = Attributes::new().with(keys::PID, process_id()).with("user", "bob");
        let record = LogRecord::with_message(ts, "INFO", "hi", extra);

        let names: Vec<&str> = record.attributes().iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["timestamp", "severity", "message", "pid", "user"]);
        assert_eq!(record.attributes().get::<u64>(keys::PID), Ok(&u64::from(std::process::id())));
    }
}

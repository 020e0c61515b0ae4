//! Rotation policies for [`FileSink`](super::files::FileSink).
//!
//! Backups live next to the active file as `path.1` (newest) through
//! `path.N` (oldest), `N` being the policy's retention depth.

use super::files::FileBackend;
use crate::config::{ConfigMappingError, ConfigNode};
use std::fs;
use std::io;
use tracing::debug;

/// Suffix appended to the sink type name when a rotation policy is set.
pub const ROTATE_SUFFIX: &str = "/rotate";

/// Counters for the segment currently being written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Segment {
    /// Bytes in the active file, newline separators included.
    pub bytes: u64,
    /// Records written since the segment was opened.
    pub records: u64,
}

/// Decides when the active file is rolled over and how backups are kept.
pub trait Rotator: Send {
    fn name(&self) -> &'static str;

    /// Retention depth: how many backups survive a rotation.
    fn backups(&self) -> usize;

    /// Asked after every successful write.
    fn necessary(&self, segment: &Segment) -> bool;

    /// Shift the backups, retire the active file and reopen a fresh one.
    fn rotate(&mut self, backend: &mut FileBackend) -> io::Result<()> {
        rotate_backups(backend, self.backups())
    }
}

/// Size threshold and retention depth, mapped from `[max_size, backups]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RotationConfig {
    pub size: u64,
    pub backups: usize,
}

impl RotationConfig {
    pub fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        let items = node.sequence_of(2, 2)?;
        Ok(RotationConfig {
            size: items[0].to()?,
            backups: items[1].to()?,
        })
    }
}

/// Rotates once the active segment reaches `size` bytes.
#[derive(Debug, Clone)]
pub struct SizeRotation {
    config: RotationConfig,
}

impl SizeRotation {
    pub fn new(config: RotationConfig) -> Self {
        SizeRotation { config }
    }

    pub fn config(&self) -> RotationConfig {
        self.config
    }
}

impl Rotator for SizeRotation {
    fn name(&self) -> &'static str {
        ROTATE_SUFFIX
    }

    fn backups(&self) -> usize {
        self.config.backups
    }

    fn necessary(&self, segment: &Segment) -> bool {
        segment.bytes >= self.config.size
    }
}

/// Rotates once the active segment holds `max_records` records.
#[derive(Debug, Clone)]
pub struct RecordCountRotation {
    max_records: u64,
    backups: usize,
}

impl RecordCountRotation {
    pub fn new(max_records: u64, backups: usize) -> Self {
        RecordCountRotation { max_records, backups }
    }
}

impl Rotator for RecordCountRotation {
    fn name(&self) -> &'static str {
        "/rotate-count"
    }

    fn backups(&self) -> usize {
        self.backups
    }

    fn necessary(&self, segment: &Segment) -> bool {
        segment.records >= self.max_records
    }
}

/// Shift `path.i` to `path.i+1` from the oldest down, dropping whatever would
/// land beyond `backups`, move the active file to `path.1` and reopen it.
///
/// With `backups == 0` the active file is simply discarded.
pub fn rotate_backups(backend: &mut FileBackend, backups: usize) -> io::Result<()> {
    backend.close()?;

    for index in (1..=backups).rev() {
        let from = backend.backup_path(index);
        if !from.exists() {
            continue;
        }
        if index == backups {
            fs::remove_file(&from)?;
        } else {
            fs::rename(&from, backend.backup_path(index + 1))?;
        }
    }

    let active = backend.path().to_path_buf();
    if active.exists() {
        if backups == 0 {
            fs::remove_file(&active)?;
        } else {
            fs::rename(&active, backend.backup_path(1))?;
        }
    }
    debug!(path = %active.display(), backups, "shifted log backups");

    backend.open()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_threshold_is_inclusive() {
        let policy = SizeRotation::new(RotationConfig { size: 10, backups: 1 });
        assert!(!policy.necessary(&Segment { bytes: 9, records: 3 }));
        assert!(policy.necessary(&Segment { bytes: 10, records: 3 }));
        assert!(policy.necessary(&Segment { bytes: 11, records: 3 }));
    }

    #[test]
    fn record_threshold_is_inclusive() {
        let policy = RecordCountRotation::new(2, 1);
        assert!(!policy.necessary(&Segment { bytes: 100, records: 1 }));
        assert!(policy.necessary(&Segment { bytes: 100, records: 2 }));
    }

    #[test]
    fn maps_rotation_config() {
        let node = ConfigNode::from(vec![ConfigNode::UInt(1024), ConfigNode::UInt(3)]);
        assert_eq!(
            RotationConfig::from_config(&node),
            Ok(RotationConfig { size: 1024, backups: 3 })
        );
        let short = ConfigNode::from(vec![ConfigNode::UInt(1024)]);
        assert!(matches!(
            RotationConfig::from_config(&short),
            Err(ConfigMappingError::WrongArity { found: 1, .. })
        ));
    }
}

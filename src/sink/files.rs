use super::rotation::{RotationConfig, Rotator, Segment, SizeRotation, ROTATE_SUFFIX};
use super::{Sink, SinkError};
use crate::config::{ConfigMappingError, ConfigNode};
use crate::registry::{Category, Component, Registry};
use std::any::Any;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Base type name of the file sink.
pub const FILES: &str = "files";

/// Path of the standard output device.
pub const STDOUT_PATH: &str = "/dev/stdout";

/// Position of the optional rotation block in the sink's config sequence.
const ROTATOR_POS: usize = 2;

/// Owns the active file handle. Closed until the first write opens it.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileBackend {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn opened(&self) -> bool {
        self.file.is_some()
    }

    /// Open the file for appending, creating missing parent directories.
    /// Returns the length the file already had.
    pub fn open(&mut self) -> io::Result<u64> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        debug!(path = %self.path.display(), len, "opened log file");
        self.file = Some(BufWriter::new(file));
        Ok(len)
    }

    pub fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }

    /// Append `message` and a newline.
    pub fn write(&mut self, message: &[u8]) -> io::Result<()> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "log file is not open"))?;
        file.write_all(message)?;
        file.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    /// `path.index`, e.g. `app.log.1`.
    pub fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }
}

/// Mapped form of `[path, autoflush, rotation?]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSinkConfig {
    pub path: PathBuf,
    pub autoflush: bool,
    pub rotation: Option<RotationConfig>,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        FileSinkConfig {
            path: PathBuf::from(STDOUT_PATH),
            autoflush: true,
            rotation: None,
        }
    }
}

impl FileSinkConfig {
    /// Map `[path, autoflush]`.
    pub fn from_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        let items = node.sequence_of(2, 2)?;
        Ok(FileSinkConfig {
            path: PathBuf::from(items[0].to::<String>().map_err(|e| e.at("path"))?),
            autoflush: items[1].to().map_err(|e| e.at("autoflush"))?,
            rotation: None,
        })
    }

    /// Map `[path, autoflush, [max_size, backups]]`.
    pub fn from_rotating_config(node: &ConfigNode) -> Result<Self, ConfigMappingError> {
        let items = node.sequence_of(3, 3)?;
        let plain = ConfigNode::Sequence(items[..ROTATOR_POS].to_vec());
        let rotation = RotationConfig::from_config(&items[ROTATOR_POS]).map_err(|e| e.at("rotation"))?;
        Ok(FileSinkConfig {
            rotation: Some(rotation),
            ..FileSinkConfig::from_config(&plain)?
        })
    }
}

/// Concrete type name for a file sink config: `files/rotate` when a
/// rotation sequence sits in third position, `files` otherwise.
pub fn discriminate(config: &ConfigNode) -> String {
    match config {
        ConfigNode::Sequence(items) if items.get(ROTATOR_POS).is_some_and(ConfigNode::is_sequence) => {
            format!("{}{}", FILES, ROTATE_SUFFIX)
        }
        _ => FILES.to_string(),
    }
}

/// Sink appending each message as a line to a file, optionally rotating it.
pub struct FileSink {
    backend: FileBackend,
    autoflush: bool,
    rotator: Option<Box<dyn Rotator>>,
    segment: Segment,
}

impl FileSink {
    pub fn new(config: FileSinkConfig) -> Self {
        let rotator = config
            .rotation
            .map(|r| Box::new(SizeRotation::new(r)) as Box<dyn Rotator>);
        FileSink {
            backend: FileBackend::new(config.path),
            autoflush: config.autoflush,
            rotator,
            segment: Segment::default(),
        }
    }

    /// File sink driven by an arbitrary rotation policy.
    pub fn with_rotator(path: impl Into<PathBuf>, autoflush: bool, rotator: Box<dyn Rotator>) -> Self {
        FileSink {
            backend: FileBackend::new(path),
            autoflush,
            rotator: Some(rotator),
            segment: Segment::default(),
        }
    }

    pub fn path(&self) -> &Path {
        self.backend.path()
    }

    pub fn autoflush(&self) -> bool {
        self.autoflush
    }

    pub fn rotator(&self) -> Option<&dyn Rotator> {
        self.rotator.as_deref()
    }

    pub fn segment(&self) -> Segment {
        self.segment
    }

    pub fn is_open(&self) -> bool {
        self.backend.opened()
    }

    /// Flush and close the active file. The next write reopens it.
    pub fn close(&mut self) -> Result<(), SinkError> {
        self.backend.close().map_err(|source| SinkError::Write {
            path: self.backend.path().to_path_buf(),
            source,
        })
    }

    fn ensure_open(&mut self) -> Result<(), SinkError> {
        if !self.backend.opened() {
            let len = self.backend.open().map_err(|source| SinkError::Open {
                path: self.backend.path().to_path_buf(),
                source,
            })?;
            self.segment = Segment { bytes: len, records: 0 };
        }
        Ok(())
    }

    fn write_error(&self, source: io::Error) -> SinkError {
        SinkError::Write {
            path: self.backend.path().to_path_buf(),
            source,
        }
    }
}

impl Sink for FileSink {
    fn consume(&mut self, message: &[u8]) -> Result<(), SinkError> {
        self.ensure_open()?;
        if let Err(e) = self.backend.write(message) {
            return Err(self.write_error(e));
        }
        self.segment.bytes += message.len() as u64 + 1;
        self.segment.records += 1;

        if self.autoflush {
            if let Err(e) = self.backend.flush() {
                return Err(self.write_error(e));
            }
        }

        if let Some(rotator) = self.rotator.as_mut() {
            if rotator.necessary(&self.segment) {
                info!(
                    path = %self.backend.path().display(),
                    bytes = self.segment.bytes,
                    records = self.segment.records,
                    backups = rotator.backups(),
                    "rotating log file"
                );
                rotator.rotate(&mut self.backend).map_err(|source| SinkError::Rotate {
                    path: self.backend.path().to_path_buf(),
                    source,
                })?;
                self.segment = Segment::default();
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), SinkError> {
        match self.backend.flush() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.write_error(e)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Register `files`, `files/rotate` and the discriminator choosing
/// between them.
pub fn register(registry: &mut Registry) {
    registry.register(Category::Sink, FILES, |config: &ConfigNode, _: &Registry| {
        let config = FileSinkConfig::from_config(config)?;
        Ok(Component::Sink(Box::new(FileSink::new(config))))
    });
    registry.register(
        Category::Sink,
        format!("{}{}", FILES, ROTATE_SUFFIX),
        |config: &ConfigNode, _: &Registry| {
            let config = FileSinkConfig::from_rotating_config(config)?;
            Ok(Component::Sink(Box::new(FileSink::new(config))))
        },
    );
    registry.register_discriminator(Category::Sink, FILES, discriminate);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::RegistryError;
    use crate::sink::rotation::RecordCountRotation;
    use tempfile::tempdir;

    fn rotating(path: &Path, size: u64, backups: usize) -> FileSink {
        FileSink::new(FileSinkConfig {
            path: path.to_path_buf(),
            autoflush: true,
            rotation: Some(RotationConfig { size, backups }),
        })
    }

    fn files_config(path: &Path, extra: Option<ConfigNode>) -> ConfigNode {
        let mut items = vec![ConfigNode::from(path.to_str().unwrap()), ConfigNode::Bool(true)];
        items.extend(extra);
        ConfigNode::Sequence(items)
    }

    #[test]
    fn opens_lazily_and_appends_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/dir/app.log");
        let mut sink = FileSink::new(FileSinkConfig {
            path: path.clone(),
            ..FileSinkConfig::default()
        });

        assert!(!sink.is_open());
        assert!(!path.exists());

        sink.consume(b"first").unwrap();
        sink.consume(b"second").unwrap();
        assert!(sink.is_open());
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");
    }

    #[test]
    fn open_failure_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();

        let mut sink = FileSink::new(FileSinkConfig {
            path: blocker.join("app.log"),
            ..FileSinkConfig::default()
        });
        assert!(matches!(sink.consume(b"lost"), Err(SinkError::Open { .. })));
        assert!(!sink.is_open());
    }

    #[test]
    fn without_autoflush_data_waits_for_flush() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("buffered.log");
        let mut sink = FileSink::new(FileSinkConfig {
            path: path.clone(),
            autoflush: false,
            rotation: None,
        });

        sink.consume(b"pending").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        sink.flush().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "pending\n");
    }

    #[test]
    fn rotates_once_threshold_is_reached() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        // "aaaa\n" is 5 bytes, so the second write reaches 10.
        let mut sink = rotating(&path, 10, 2);

        sink.consume(b"aaaa").unwrap();
        assert!(!sink.backend.backup_path(1).exists());

        sink.consume(b"bbbb").unwrap();
        assert_eq!(fs::read_to_string(sink.backend.backup_path(1)).unwrap(), "aaaa\nbbbb\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
        assert_eq!(sink.segment(), Segment::default());
    }

    #[test]
    fn rotate_failure_surfaces_and_next_write_reopens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = rotating(&path, 5, 1);

        // The oldest backup slot is a non-empty directory, so dropping it fails.
        let blocker = sink.backend.backup_path(1);
        fs::create_dir(&blocker).unwrap();
        fs::write(blocker.join("keep"), "x").unwrap();

        let err = sink.consume(b"abcdef").unwrap_err();
        assert!(matches!(err, SinkError::Rotate { ref path, .. } if path.as_path() == sink.path()));
        assert!(!sink.is_open());
        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdef\n");

        fs::remove_dir_all(&blocker).unwrap();
        sink.consume(b"x").unwrap();
        assert!(sink.is_open());
        assert_eq!(fs::read_to_string(&blocker).unwrap(), "abcdef\nx\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn one_byte_short_does_not_rotate() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = rotating(&path, 11, 2);

        sink.consume(b"aaaa").unwrap();
        sink.consume(b"bbbb").unwrap();
        assert!(!sink.backend.backup_path(1).exists());
        assert_eq!(sink.segment().bytes, 10);
    }

    #[test]
    fn keeps_exactly_retention_depth_backups() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = rotating(&path, 1, 2);

        for message in ["one", "two", "three", "four"] {
            sink.consume(message.as_bytes()).unwrap();
        }

        assert_eq!(fs::read_to_string(sink.backend.backup_path(1)).unwrap(), "four\n");
        assert_eq!(fs::read_to_string(sink.backend.backup_path(2)).unwrap(), "three\n");
        assert!(!sink.backend.backup_path(3).exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn zero_backups_discards_the_segment() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        let mut sink = rotating(&path, 1, 0);

        sink.consume(b"gone").unwrap();
        assert!(!sink.backend.backup_path(1).exists());
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn existing_content_counts_toward_threshold() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, "old!\n").unwrap();

        let mut sink = rotating(&path, 10, 1);
        sink.consume(b"new!").unwrap();
        assert_eq!(fs::read_to_string(sink.backend.backup_path(1)).unwrap(), "old!\nnew!\n");
    }

    #[test]
    fn record_count_policy_rotates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("count.log");
        let mut sink = FileSink::with_rotator(&path, true, Box::new(RecordCountRotation::new(2, 1)));

        sink.consume(b"a").unwrap();
        sink.consume(b"b").unwrap();
        sink.consume(b"c").unwrap();
        assert_eq!(fs::read_to_string(sink.backend.backup_path(1)).unwrap(), "a\nb\n");
        assert_eq!(fs::read_to_string(&path).unwrap(), "c\n");
        assert_eq!(sink.segment().records, 1);
    }

    #[test]
    fn discriminator_inspects_third_position() {
        let path = Path::new("/tmp/app.log");
        let rotation = ConfigNode::from(vec![ConfigNode::UInt(10), ConfigNode::UInt(2)]);
        assert_eq!(discriminate(&files_config(path, None)), "files");
        assert_eq!(discriminate(&files_config(path, Some(rotation))), "files/rotate");
        assert_eq!(discriminate(&files_config(path, Some(ConfigNode::from("x")))), "files");
        assert_eq!(discriminate(&ConfigNode::Null), "files");
    }

    #[test]
    fn builds_from_config_with_the_given_fields() {
        let registry = Registry::with_builtins();
        let rotation = ConfigNode::from(vec![ConfigNode::UInt(4096), ConfigNode::UInt(3)]);
        let sink = registry
            .build_sink(FILES, &files_config(Path::new("/var/log/app.log"), Some(rotation)))
            .unwrap();

        let sink = sink.as_any().downcast_ref::<FileSink>().unwrap();
        assert_eq!(sink.path(), Path::new("/var/log/app.log"));
        assert!(sink.autoflush());
        assert_eq!(sink.rotator().map(|r| r.name()), Some(ROTATE_SUFFIX));
        assert_eq!(sink.rotator().map(|r| r.backups()), Some(3));
        assert!(!sink.is_open());
    }

    #[test]
    fn rejects_malformed_configs() {
        let registry = Registry::with_builtins();
        let path = Path::new("/tmp/app.log");

        let bad_third = files_config(path, Some(ConfigNode::from("x")));
        assert!(matches!(
            registry.build_sink(FILES, &bad_third),
            Err(RegistryError::ConfigMapping {
                source: ConfigMappingError::WrongArity { found: 3, .. },
                ..
            })
        ));

        let wrong_kind = ConfigNode::from(vec![ConfigNode::from("p"), ConfigNode::from("yes")]);
        assert!(matches!(
            registry.build_sink(FILES, &wrong_kind),
            Err(RegistryError::ConfigMapping { .. })
        ));

        assert!(matches!(
            registry.build_sink(FILES, &ConfigNode::Null),
            Err(RegistryError::ConfigMapping {
                source: ConfigMappingError::WrongKind { .. },
                ..
            })
        ));
    }
}

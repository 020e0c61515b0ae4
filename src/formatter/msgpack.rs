use super::{FormatError, Formatter};
use crate::attribute::AttributeValue;
use crate::config::ConfigNode;
use crate::record::LogRecord;
use crate::registry::{Category, Component, Registry};
use rmp::encode;
use std::any::Any;
use std::fmt::Display;

/// Formatter that encodes all attributes as one MessagePack map.
///
/// Keys appear in the record's insertion order. Timestamps are written as
/// whole seconds since the epoch; the sub-second part is dropped.
#[derive(Debug, Clone, Default)]
pub struct MsgpackFormatter;

fn encode_err<E: Display>(e: E) -> FormatError {
    FormatError::Encode(e.to_string())
}

fn write_value(buf: &mut Vec<u8>, value: &AttributeValue) -> Result<(), FormatError> {
    match value {
        AttributeValue::Bool(v) => encode::write_bool(buf, *v).map_err(encode_err)?,
        AttributeValue::Int(v) => {
            encode::write_sint(buf, *v).map_err(encode_err)?;
        }
        AttributeValue::UInt(v) => {
            encode::write_uint(buf, *v).map_err(encode_err)?;
        }
        AttributeValue::Float(v) => encode::write_f64(buf, *v).map_err(encode_err)?,
        AttributeValue::String(v) => encode::write_str(buf, v).map_err(encode_err)?,
        AttributeValue::Timestamp(v) => {
            encode::write_sint(buf, v.timestamp()).map_err(encode_err)?;
        }
    }
    Ok(())
}

impl Formatter for MsgpackFormatter {
    fn format(&self, record: &LogRecord) -> Result<Vec<u8>, FormatError> {
        let attributes = record.attributes();
        let len = u32::try_from(attributes.len()).map_err(encode_err)?;

        let mut buf = Vec::with_capacity(64 * attributes.len().max(1));
        encode::write_map_len(&mut buf, len).map_err(encode_err)?;
        for (name, value) in attributes.iter() {
            encode::write_str(&mut buf, name).map_err(encode_err)?;
            write_value(&mut buf, value)?;
        }
        Ok(buf)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn register(registry: &mut Registry) {
    registry.register(Category::Formatter, "msgpack", |_: &ConfigNode, _: &Registry| {
        Ok(Component::Formatter(Box::new(MsgpackFormatter)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::Attributes;
    use chrono::{DateTime, TimeZone, Utc};
    use rmp::decode;

    #[test]
    fn encodes_map_in_insertion_order() {
        let record = LogRecord::new(Attributes::new().with("a", 1i64).with("b", "x"));
        let bytes = MsgpackFormatter.format(&record).unwrap();

        let mut rd = &bytes[..];
        assert_eq!(decode::read_map_len(&mut rd).unwrap(), 2);

        let (key, rest) = decode::read_str_from_slice(rd).unwrap();
        assert_eq!(key, "a");
        rd = rest;
        assert_eq!(decode::read_int::<i64, _>(&mut rd).unwrap(), 1);

        let (key, rest) = decode::read_str_from_slice(rd).unwrap();
        assert_eq!(key, "b");
        let (value, rest) = decode::read_str_from_slice(rest).unwrap();
        assert_eq!(value, "x");
        assert!(rest.is_empty());
    }

    #[test]
    fn timestamps_keep_whole_seconds_only() {
        let whole = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let half = Utc.timestamp_opt(1_700_000_000, 500_000_000).unwrap();

        let pack = |ts: DateTime<Utc>| {
            MsgpackFormatter
                .format(&LogRecord::new(Attributes::new().with("t", ts)))
                .unwrap()
        };
        let bytes = pack(half);
        assert_eq!(bytes, pack(whole));

        let mut rd = &bytes[..];
        decode::read_map_len(&mut rd).unwrap();
        let (_, mut rest) = decode::read_str_from_slice(rd).unwrap();
        assert_eq!(decode::read_int::<i64, _>(&mut rest).unwrap(), 1_700_000_000);
    }

    #[test]
    fn encodes_every_kind() {
        let record = LogRecord::new(
            Attributes::new()
                .with("flag", true)
                .with("neg", -7i64)
                .with("big", u64::MAX)
                .with("ratio", 0.25f64),
        );
        let bytes = MsgpackFormatter.format(&record).unwrap();
        let mut rd = &bytes[..];
        assert_eq!(decode::read_map_len(&mut rd).unwrap(), 4);

        let (_, mut rd) = decode::read_str_from_slice(rd).unwrap();
        assert!(decode::read_bool(&mut rd).unwrap());
        let (_, mut rd) = decode::read_str_from_slice(rd).unwrap();
        assert_eq!(decode::read_int::<i64, _>(&mut rd).unwrap(), -7);
        let (_, mut rd) = decode::read_str_from_slice(rd).unwrap();
        assert_eq!(decode::read_int::<u64, _>(&mut rd).unwrap(), u64::MAX);
        let (_, mut rd) = decode::read_str_from_slice(rd).unwrap();
        assert_eq!(decode::read_f64(&mut rd).unwrap(), 0.25);
    }
}

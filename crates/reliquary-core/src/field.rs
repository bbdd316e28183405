//! Self-describing field frames: `[name][end offset][payload]`.
//!
//! The end offset is an absolute position patched in after the payload is
//! written, so a reader that does not recognize a name, or whose live kind
//! no longer matches, seeks straight past the payload.

use crate::cursor::{ByteCursor, CursorError};
use crate::value::{FieldKind, Value};

/// The framing portion of one field, read before its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldHeader {
    pub name: String,
    pub end_offset: u64,
}

/// Write one framed field. `encode` emits the raw payload.
pub fn write_field<F>(cur: &mut ByteCursor, name: &str, encode: F) -> Result<(), CursorError>
where
    F: FnOnce(&mut ByteCursor),
{
    cur.write_string(name);
    let at = cur.reserve_i64();
    encode(cur);
    let end = cur.tell();
    cur.patch_i64(at, end as i64)
}

/// Write one framed field holding `value`.
pub fn write_value_field(
    cur: &mut ByteCursor,
    name: &str,
    value: &Value,
) -> Result<(), CursorError> {
    write_field(cur, name, |c| value.encode(c))
}

pub fn read_field_header(cur: &mut ByteCursor) -> Result<FieldHeader, CursorError> {
    let name = cur.read_string()?;
    let end_offset = cur.read_offset()?;
    Ok(FieldHeader { name, end_offset })
}

/// Skip the payload of a field whose header was just read.
pub fn skip_field(cur: &mut ByteCursor, header: &FieldHeader) -> Result<(), CursorError> {
    cur.seek(header.end_offset)
}

/// Decode the payload using the live field's kind.
///
/// Returns `Ok(None)` when the payload does not decode to exactly the framed
/// width; the cursor is left at the end offset either way. Only a failure to
/// seek back to the end offset is an error.
pub fn decode_field_payload(
    cur: &mut ByteCursor,
    header: &FieldHeader,
    kind: FieldKind,
) -> Result<Option<Value>, CursorError> {
    let decoded = Value::decode(kind, cur);
    let consumed_exactly = cur.tell() == header.end_offset;
    match decoded {
        Ok(value) if consumed_exactly => Ok(Some(value)),
        _ => {
            cur.seek(header.end_offset)?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_offset_points_past_payload() {
        let mut cur = ByteCursor::new();
        write_value_field(&mut cur, "hp", &Value::I32(10)).unwrap();
        // 4+2 name, 8 offset, 4 payload
        assert_eq!(cur.len(), 18);

        cur.seek(0).unwrap();
        let header = read_field_header(&mut cur).unwrap();
        assert_eq!(header.name, "hp");
        assert_eq!(header.end_offset, 18);
    }

    #[test]
    fn unknown_field_is_skipped_to_next() {
        let mut cur = ByteCursor::new();
        write_value_field(&mut cur, "legacy", &Value::Str("old data".into())).unwrap();
        write_value_field(&mut cur, "hp", &Value::I32(3)).unwrap();

        cur.seek(0).unwrap();
        let first = read_field_header(&mut cur).unwrap();
        skip_field(&mut cur, &first).unwrap();
        let second = read_field_header(&mut cur).unwrap();
        assert_eq!(second.name, "hp");
        assert_eq!(
            decode_field_payload(&mut cur, &second, FieldKind::I32).unwrap(),
            Some(Value::I32(3))
        );
        assert!(cur.is_at_end());
    }

    #[test]
    fn narrower_live_kind_is_discarded() {
        let mut cur = ByteCursor::new();
        write_value_field(&mut cur, "hp", &Value::I64(7)).unwrap();
        write_value_field(&mut cur, "next", &Value::Bool(true)).unwrap();

        cur.seek(0).unwrap();
        let header = read_field_header(&mut cur).unwrap();
        assert_eq!(decode_field_payload(&mut cur, &header, FieldKind::I32).unwrap(), None);
        assert_eq!(cur.tell(), header.end_offset);
        assert_eq!(read_field_header(&mut cur).unwrap().name, "next");
    }

    #[test]
    fn wider_live_kind_is_discarded() {
        let mut cur = ByteCursor::new();
        write_value_field(&mut cur, "hp", &Value::I32(7)).unwrap();
        write_value_field(&mut cur, "next", &Value::I32(1)).unwrap();

        cur.seek(0).unwrap();
        let header = read_field_header(&mut cur).unwrap();
        assert_eq!(decode_field_payload(&mut cur, &header, FieldKind::I64).unwrap(), None);
        assert_eq!(read_field_header(&mut cur).unwrap().name, "next");
    }
}

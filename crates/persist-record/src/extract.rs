//! Load-free metadata extraction.
//!
//! These functions answer questions about a record ("what class is this?",
//! "which objects does it reference?") by walking the framing only. They
//! never resolve a class, never consult a loader, and treat every name as
//! opaque text, so they are safe on stale, foreign, or hostile input.

use serde::{Deserialize, Serialize};

use persist_types::{ClassRef, Oid};

use crate::cursor::Cursor;
use crate::error::RecordResult;
use crate::format::{Opcode, ValueOpcode, MAX_NESTING_DEPTH};

/// Recover the class named by a record's class-reference frame.
///
/// Only the leading frame is examined; the state that follows is not
/// parsed. Fails with [`RecordError::Malformed`](crate::RecordError) when the
/// `CLASS` marker is missing or either name is truncated or not UTF-8.
pub fn extract_class(record: &[u8]) -> RecordResult<ClassRef> {
    let mut cursor = Cursor::new(record);
    cursor.expect(Opcode::Class)?;
    cursor.read_class()
}

/// Every persistent reference in the record, in order of appearance.
///
/// Duplicates are kept. The whole record is validated structurally.
pub fn scan_references(record: &[u8]) -> RecordResult<Vec<Oid>> {
    Ok(inspect(record)?.references)
}

/// Structural summary of one record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordSummary {
    /// Class of the object the record belongs to.
    pub class: ClassRef,
    /// Top-level attribute names, in record order.
    pub attributes: Vec<String>,
    /// Persistent references, in order of appearance.
    pub references: Vec<Oid>,
    /// Classes that appear as values, in order of appearance.
    pub literal_classes: Vec<ClassRef>,
    /// Classes of inline instances, in order of appearance.
    pub inline_classes: Vec<ClassRef>,
    /// Total record size in bytes.
    pub size: usize,
}

/// Walk the entire record and summarize it.
pub fn inspect(record: &[u8]) -> RecordResult<RecordSummary> {
    let mut cursor = Cursor::new(record);
    cursor.expect(Opcode::Class)?;
    let class = cursor.read_class()?;

    let mut scanner = Scanner {
        cursor,
        summary: RecordSummary {
            class,
            attributes: Vec::new(),
            references: Vec::new(),
            literal_classes: Vec::new(),
            inline_classes: Vec::new(),
            size: record.len(),
        },
    };

    scanner.cursor.expect(Opcode::State)?;
    let count = scanner.cursor.read_count()?;
    for _ in 0..count {
        let name = scanner.cursor.read_name()?;
        scanner.summary.attributes.push(name.to_owned());
        scanner.value(0)?;
    }
    scanner.cursor.finish()?;
    Ok(scanner.summary)
}

struct Scanner<'a> {
    cursor: Cursor<'a>,
    summary: RecordSummary,
}

impl Scanner<'_> {
    fn value(&mut self, depth: usize) -> RecordResult<()> {
        let at = self.cursor.position();
        match self.cursor.read_value_opcode()? {
            ValueOpcode::None | ValueOpcode::False | ValueOpcode::True => {}
            ValueOpcode::Int | ValueOpcode::Float => {
                self.cursor.read_fixed8()?;
            }
            ValueOpcode::Str => {
                self.cursor.read_text()?;
            }
            ValueOpcode::Bytes => {
                self.cursor.read_blob()?;
            }
            ValueOpcode::PersistentRef => {
                let oid = self.cursor.read_oid()?;
                self.summary.references.push(oid);
            }
            ValueOpcode::ClassLiteral => {
                let class = self.cursor.read_class()?;
                self.summary.literal_classes.push(class);
            }
            ValueOpcode::List => {
                self.nested(at, depth)?;
                let count = self.cursor.read_count()?;
                for _ in 0..count {
                    self.value(depth + 1)?;
                }
            }
            ValueOpcode::Map => {
                self.nested(at, depth)?;
                let count = self.cursor.read_count()?;
                for _ in 0..count {
                    self.cursor.read_name()?;
                    self.value(depth + 1)?;
                }
            }
            ValueOpcode::Instance => {
                self.nested(at, depth)?;
                let class = self.cursor.read_class()?;
                self.summary.inline_classes.push(class);
                let count = self.cursor.read_count()?;
                for _ in 0..count {
                    self.cursor.read_name()?;
                    self.value(depth + 1)?;
                }
            }
        }
        Ok(())
    }

    fn nested(&self, at: usize, depth: usize) -> RecordResult<()> {
        if depth >= MAX_NESTING_DEPTH {
            return Err(self
                .cursor
                .malformed(at, format!("nesting deeper than {MAX_NESTING_DEPTH}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::RecordBuilder;
    use crate::error::RecordError;

    fn sample() -> Vec<u8> {
        let mut b = RecordBuilder::new(&ClassRef::new("app.models", "Account")).unwrap();
        b.begin_state(4);
        b.name("owner").unwrap();
        b.persistent_ref(Oid::new(7));
        b.name("kind").unwrap();
        b.class_literal(&ClassRef::new("app.kinds", "Savings")).unwrap();
        b.name("history").unwrap();
        b.begin_list(2);
        b.persistent_ref(Oid::new(9));
        b.begin_instance(&ClassRef::new("app.models", "Entry"), 1).unwrap();
        b.name("amount").unwrap();
        b.int(-5);
        b.name("raw").unwrap();
        b.bytes(&[b'P', 0, 0, 0, 0, 0, 0, 0, 1]);
        b.finish()
    }

    #[test]
    fn extract_class_from_header() {
        let class = extract_class(&sample()).unwrap();
        assert_eq!(class.module, "app.models");
        assert_eq!(class.name, "Account");
    }

    #[test]
    fn extract_class_of_unknown_module() {
        let mut b = RecordBuilder::new(&ClassRef::new(
            "path.that.does.not.exist",
            "likewise.the.class",
        ))
        .unwrap();
        b.begin_state(0);
        let class = extract_class(&b.finish()).unwrap();
        assert_eq!(class.qualified_name(), "path.that.does.not.exist.likewise.the.class");
    }

    #[test]
    fn corrupt_first_byte_is_malformed() {
        let mut record = sample();
        record[0] = b'X';
        let err = extract_class(&record).unwrap_err();
        assert!(matches!(err, RecordError::Malformed { offset: 0, .. }));
    }

    #[test]
    fn empty_input_is_malformed() {
        assert!(matches!(
            extract_class(&[]),
            Err(RecordError::Malformed { .. })
        ));
    }

    #[test]
    fn truncation_never_yields_output() {
        let record = sample();
        for cut in 0..record.len() {
            assert!(
                inspect(&record[..cut]).is_err(),
                "inspect accepted a record cut at {cut}"
            );
        }
        let header_len = 1 + 1 + "app.models".len() + 1 + "Account".len();
        for cut in 0..header_len {
            assert!(extract_class(&record[..cut]).is_err());
        }
        assert!(extract_class(&record[..header_len]).is_ok());
    }

    #[test]
    fn references_in_order_and_bytes_are_not_references() {
        let refs = scan_references(&sample()).unwrap();
        assert_eq!(refs, vec![Oid::new(7), Oid::new(9)]);
    }

    #[test]
    fn inspect_collects_everything() {
        let summary = inspect(&sample()).unwrap();
        assert_eq!(summary.class, ClassRef::new("app.models", "Account"));
        assert_eq!(summary.attributes, vec!["owner", "kind", "history", "raw"]);
        assert_eq!(summary.literal_classes, vec![ClassRef::new("app.kinds", "Savings")]);
        assert_eq!(summary.inline_classes, vec![ClassRef::new("app.models", "Entry")]);
        assert_eq!(summary.size, sample().len());
    }

    #[test]
    fn trailing_garbage_rejected_by_inspect_only() {
        let mut record = sample();
        record.push(0);
        assert!(inspect(&record).is_err());
        assert!(extract_class(&record).is_ok());
    }

    #[test]
    fn excessive_nesting_rejected() {
        let mut b = RecordBuilder::new(&ClassRef::new("m", "K")).unwrap();
        b.begin_state(1);
        b.name("deep").unwrap();
        for _ in 0..=MAX_NESTING_DEPTH {
            b.begin_list(1);
        }
        b.none();
        let err = inspect(&b.finish()).unwrap_err();
        assert!(err.to_string().contains("nesting deeper"));
    }

    #[test]
    fn huge_count_fails_without_allocating() {
        let mut b = RecordBuilder::new(&ClassRef::new("m", "K")).unwrap();
        b.begin_state(1);
        b.name("list").unwrap();
        b.begin_list(usize::MAX);
        assert!(inspect(&b.finish()).is_err());
    }

    #[test]
    fn summary_serializes_to_json() {
        let summary = inspect(&sample()).unwrap();
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["class"]["name"], "Account");
        assert_eq!(json["references"], serde_json::json!([7, 9]));
    }
}

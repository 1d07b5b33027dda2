//! Status Decoder

use std::sync::Arc;

use crate::snapshot::DerivedState;
use crate::{FieldIndexTable, FieldSpec, FieldValue, RawRecord, Scale, StatusSnapshot};

/// Folds raw records into status snapshots using a field index table
#[derive(Debug, Clone)]
pub struct StatusDecoder {
    table: Arc<FieldIndexTable>,
}

impl StatusDecoder {
    pub fn new(table: Arc<FieldIndexTable>) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &Arc<FieldIndexTable> {
        &self.table
    }

    /// Snapshot to start accumulating from
    pub fn empty_snapshot(&self) -> StatusSnapshot {
        StatusSnapshot::empty(Arc::clone(&self.table))
    }

    /// Produce the snapshot that follows `previous` once `record` is applied
    ///
    /// Only fields of the record's message type whose offset lies inside the
    /// record are updated. Every other field keeps its previous value.
    pub fn decode(&self, previous: &StatusSnapshot, record: &RawRecord) -> StatusSnapshot {
        let mut values = if Arc::ptr_eq(previous.table(), &self.table) {
            previous.values.clone()
        } else {
            vec![None; self.table.len()]
        };

        for (slot, field) in values.iter_mut().zip(self.table.fields()) {
            if field.message != record.message() {
                continue;
            }
            if let Some(raw) = record.get(field.offset) {
                *slot = Some(decode_field(field, raw));
            }
        }

        let mut message_times = previous.message_times;
        message_times[record.message().index()] = Some(record.received_at());

        StatusSnapshot {
            table: Arc::clone(&self.table),
            derived: DerivedState::compute(&self.table, &values),
            values,
            updated_at: Some(record.received_at()),
            message_times,
            sequence: previous.sequence + 1,
            device: Some(*record.header()),
        }
    }
}

/// Decode one raw integer according to its field spec
pub fn decode_field(field: &FieldSpec, raw: i32) -> FieldValue {
    if let Some(mask) = field.mask {
        return FieldValue::Flag((raw as u32 & mask) != 0);
    }

    let wide = if field.signed {
        i64::from(raw)
    } else {
        i64::from(raw as u32)
    };
    match field.scale {
        Scale::Raw => FieldValue::Integer(wide),
        Scale::Divide(divisor) => FieldValue::Number(wide as f64 / f64::from(divisor.max(1))),
        Scale::Multiply(factor) => FieldValue::Integer(wide * i64::from(factor)),
    }
}

use crate::error::{ProtocolError, ProtocolResult};
use bytes::BytesMut;

/// Accumulates the variable-tail bytes of a packet while recording, for each
/// field written, the byte offset (relative to the start of the tail) at
/// which it began. Those offsets are what gets written into the fixed block.
#[derive(Default)]
pub struct VarOffsetWriter {
    tail: BytesMut,
}

impl VarOffsetWriter {
    pub fn new() -> Self {
        Self {
            tail: BytesMut::new(),
        }
    }

    /// Record the current tail length as this field's offset, then append its bytes.
    pub fn write_field(&mut self, write_fn: impl FnOnce(&mut BytesMut)) -> u32 {
        let offset = self.tail.len() as u32;
        write_fn(&mut self.tail);
        offset
    }

    pub fn len(&self) -> usize {
        self.tail.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tail.is_empty()
    }

    pub fn finish(self) -> BytesMut {
        self.tail
    }
}

/// Reads fields out of an already-materialized variable tail by seeking to
/// recorded offsets. `max_size` is the packet type's declared maximum
/// variable-block size; any offset outside `[0, max_size]` is rejected before
/// the tail is even examined, satisfying §3's "no offset exceeds declared
/// maxima" invariant independent of the tail's actual length.
pub struct VarOffsetReader<'a> {
    tail: &'a [u8],
    max_size: u32,
}

impl<'a> VarOffsetReader<'a> {
    pub fn new(tail: &'a [u8], max_size: u32) -> Self {
        Self { tail, max_size }
    }

    pub fn read_field<T>(
        &self,
        offset: u32,
        read_fn: impl FnOnce(&mut BytesMut) -> ProtocolResult<T>,
    ) -> ProtocolResult<T> {
        if offset > self.max_size || offset as usize > self.tail.len() {
            return Err(ProtocolError::InvalidOffset {
                offset,
                max: self.max_size,
            });
        }
        let mut sub = BytesMut::from(&self.tail[offset as usize..]);
        read_fn(&mut sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::{read_string, write_string};

    #[test]
    fn writer_records_offsets_in_declaration_order() {
        let mut w = VarOffsetWriter::new();
        let off_a = w.write_field(|b| write_string(b, "hello"));
        let off_b = w.write_field(|b| write_string(b, "world!!"));
        assert_eq!(off_a, 0);
        assert_eq!(off_b, 1 + "hello".len() as u32);
        let tail = w.finish();
        assert_eq!(tail.len(), off_b as usize + 1 + "world!!".len());
    }

    #[test]
    fn reader_seeks_to_offset_and_reads_field() {
        let mut w = VarOffsetWriter::new();
        let off_a = w.write_field(|b| write_string(b, "alpha"));
        let off_b = w.write_field(|b| write_string(b, "beta"));
        let tail = w.finish();
        let reader = VarOffsetReader::new(&tail, 1024);
        let a: String = reader
            .read_field(off_a, |b| read_string(b, "a", 64))
            .unwrap();
        let b: String = reader
            .read_field(off_b, |b| read_string(b, "b", 64))
            .unwrap();
        assert_eq!(a, "alpha");
        assert_eq!(b, "beta");
    }

    #[test]
    fn offset_beyond_declared_max_is_rejected() {
        let tail = [0u8; 4];
        let reader = VarOffsetReader::new(&tail, 8);
        let err = reader
            .read_field::<()>(100, |_| Ok(()))
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidOffset {
                offset: 100,
                max: 8
            }
        );
    }

    #[test]
    fn offset_beyond_actual_tail_is_rejected_even_under_max() {
        let tail = [0u8; 4];
        let reader = VarOffsetReader::new(&tail, 1024);
        let err = reader.read_field::<()>(10, |_| Ok(())).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidOffset { .. }));
    }
}

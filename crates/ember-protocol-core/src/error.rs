use thiserror::Error;

/// Everything that can go wrong reading, writing, or validating a packet.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("not enough data to read {0}")]
    Truncated(&'static str),
    #[error("varint exceeds 5 bytes")]
    VarIntTooBig,
    #[error("varlong exceeds 10 bytes")]
    VarLongTooBig,
    #[error("offset {offset} out of variable block bounds (max {max})")]
    InvalidOffset { offset: u32, max: u32 },
    #[error("length {len} exceeds max {max} for field `{field}`")]
    InvalidLength {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("invalid encoding in field `{0}`")]
    BadEncoding(&'static str),
    #[error("malformed packet: {0}")]
    Malformed(&'static str),
    #[error("serialized size {size} exceeds declared max {max}")]
    SizeExceeded { size: usize, max: usize },
    #[error("unknown packet id {0}")]
    UnknownPacketId(i32),
    #[error("recursion limit exceeded: {0}")]
    RecursionLimit(&'static str),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Outcome of `validate`: how many bytes a well-formed packet consumed, or why
/// it was rejected. Kept distinct from `ProtocolResult` so callers that only
/// need validation never have to allocate a populated value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    Valid { bytes_consumed: usize },
    Invalid(ProtocolError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid { .. })
    }
}

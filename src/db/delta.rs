use cbordata::Cborize;

const DELTA_VER: u32 = 0x00030001;

/// Delta type, describe the older-versions of an indexed entry.
#[derive(Clone, Debug, Eq, PartialEq, Cborize)]
pub enum Delta<D> {
    U { delta: D, seqno: u64 },
    D { seqno: u64 },
}

impl<D> Delta<D> {
    pub const ID: u32 = DELTA_VER;

    /// Construct a delta carrying the difference against the older version.
    pub fn new_upsert(delta: D, seqno: u64) -> Delta<D> {
        Delta::U { delta, seqno }
    }

    /// Construct a delta marking the older version as deleted.
    pub fn new_delete(seqno: u64) -> Delta<D> {
        Delta::D { seqno }
    }

    pub fn to_seqno(&self) -> u64 {
        match self {
            Delta::U { seqno, .. } => *seqno,
            Delta::D { seqno } => *seqno,
        }
    }

    /// Split into (seqno, delta), the latter `None` when the older version was a
    /// delete.
    pub fn unpack(&self) -> (u64, Option<&D>) {
        match self {
            Delta::U { delta, seqno } => (*seqno, Some(delta)),
            Delta::D { seqno } => (*seqno, None),
        }
    }

    /// Return the delta payload, if the older version was not a delete.
    pub fn to_delta(&self) -> Option<D>
    where
        D: Clone,
    {
        match self {
            Delta::U { delta, .. } => Some(delta.clone()),
            Delta::D { .. } => None,
        }
    }

    /// Return whether the older version represented by this delta was a delete.
    pub fn is_deleted(&self) -> bool {
        match self {
            Delta::U { .. } => false,
            Delta::D { .. } => true,
        }
    }
}

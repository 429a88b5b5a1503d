//! Index records.

/// An index entry. The spatial index stamps one copy of a record per cell of the
/// object's decomposition, so records must be cheap to clone.
pub trait Record: Clone {
    /// Z-value under which the record is stored.
    fn z(&self) -> i64;

    /// Stamps the record with a z-value.
    fn set_z(&mut self, z: i64);

    /// True if the spatial index should assign a surrogate object id when none is set.
    fn requires_soid(&self) -> bool {
        false
    }

    /// Surrogate object id, if one has been assigned.
    fn soid(&self) -> Option<u64> {
        None
    }

    /// Assigns a surrogate object id.
    fn set_soid(&mut self, _soid: u64) {}
}

/// A record carrying a payload and, optionally, a surrogate object id.
///
/// # Example
/// ```
/// use zjoin::{BasicRecord, Record};
/// let mut record = BasicRecord::new("harbour");
/// assert!(record.requires_soid());
/// record.set_soid(7);
/// assert_eq!(record.soid(), Some(7));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BasicRecord<T> {
    z: i64,
    soid: Option<u64>,
    wants_soid: bool,
    payload: T,
}

impl<T> BasicRecord<T> {
    /// A record that gets a surrogate id when first added to a spatial index.
    pub fn new(payload: T) -> Self {
        BasicRecord {
            z: 0,
            soid: None,
            wants_soid: true,
            payload,
        }
    }

    /// A record that never carries a surrogate id.
    pub fn without_soid(payload: T) -> Self {
        BasicRecord {
            z: 0,
            soid: None,
            wants_soid: false,
            payload,
        }
    }

    /// The payload.
    pub fn payload(&self) -> &T {
        &self.payload
    }
}

impl<T: Clone> Record for BasicRecord<T> {
    fn z(&self) -> i64 {
        self.z
    }

    fn set_z(&mut self, z: i64) {
        self.z = z;
    }

    fn requires_soid(&self) -> bool {
        self.wants_soid
    }

    fn soid(&self) -> Option<u64> {
        self.soid
    }

    fn set_soid(&mut self, soid: u64) {
        self.soid = Some(soid);
    }
}

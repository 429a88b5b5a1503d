//! Bit-level arithmetic on z-values.
//!
//! A z-value identifies a cell of the implicit binary subdivision tree of a space.
//! It is a non-negative `i64` laid out as:
//!
//! ```text
//!  63  62                                   6 5        0
//! +---+--------------------------------------+----------+
//! | 0 | interleaved coordinate bits (57)     | length   |
//! +---+--------------------------------------+----------+
//! ```
//!
//! Coordinate bits are left justified: encoded bit position `i` lives at bit `62 - i`.
//! The length field says how many of them are significant; the rest are zero.
//!
//! With this layout plain integer order is a pre-order walk of the cell tree. A cell
//! sorts before all of its descendants, and the descendants form one contiguous
//! range of ids. The spatial join depends on both properties.

/// Maximum number of interleaved coordinate bits.
pub const MAX_Z_BITS: u32 = 57;

/// Number of low bits holding the length field.
pub const LENGTH_BITS: u32 = 6;

/// Marks an unused slot at the end of a decomposition.
pub const Z_UNUSED: i64 = -1;

/// Marks an exhausted join input. Larger than every valid z-value.
pub const Z_EOF: i64 = i64::MAX;

const LENGTH_MASK: i64 = (1 << LENGTH_BITS) - 1;

/// The root cell: no significant bits, covers the whole space.
pub const ROOT: i64 = 0;

/// Mask selecting the first `length` coordinate bits.
#[inline]
const fn prefix_mask(length: u32) -> i64 {
    if length == 0 {
        0
    } else {
        ((1_i64 << length) - 1) << (63 - length)
    }
}

/// Mask selecting coordinate bit position `position` (0 is the most significant).
#[inline]
pub(crate) const fn position_bit(position: u32) -> i64 {
    1_i64 << (62 - position)
}

/// Builds a z-value from left-justified coordinate bits and a length.
///
/// Bits beyond `length` are cleared, so the result is always well formed.
#[inline]
pub const fn z_value(bits: i64, length: u32) -> i64 {
    debug_assert!(length <= MAX_Z_BITS);
    (bits & prefix_mask(length)) | length as i64
}

/// Number of significant coordinate bits of `z`.
#[inline]
pub const fn length(z: i64) -> u32 {
    (z & LENGTH_MASK) as u32
}

/// The coordinate bits of `z`, with the length field cleared.
#[inline]
pub const fn bits(z: i64) -> i64 {
    z & !LENGTH_MASK
}

/// True if `z` is a well formed z-value.
pub const fn is_valid(z: i64) -> bool {
    z >= 0 && length(z) <= MAX_Z_BITS && bits(z) & !prefix_mask(length(z)) == 0
}

/// The parent of `z`, or `None` for the root.
pub const fn parent(z: i64) -> Option<i64> {
    match length(z) {
        0 => None,
        length => Some(z_value(bits(z), length - 1)),
    }
}

/// The ancestor of `z` with the given length. `length` must not exceed `z`'s length.
#[inline]
pub const fn ancestor(z: i64, length: u32) -> i64 {
    debug_assert!(length <= self::length(z));
    z_value(bits(z), length)
}

/// The child of `z` taking `bit` (0 or 1) as its next coordinate bit.
/// `z` must be shorter than `MAX_Z_BITS`.
#[inline]
pub const fn child(z: i64, bit: u32) -> i64 {
    let length = length(z);
    debug_assert!(length < MAX_Z_BITS);
    let mut bits = bits(z);
    if bit != 0 {
        bits |= position_bit(length);
    }
    z_value(bits, length + 1)
}

/// True if `a` is an ancestor of, or equal to, `b`.
#[inline]
pub const fn contains(a: i64, b: i64) -> bool {
    let length = length(a);
    length <= self::length(b) && (a ^ b) & prefix_mask(length) == 0
}

/// True if `a` and `b` are distinct children of the same parent.
#[inline]
pub const fn siblings(a: i64, b: i64) -> bool {
    let length = length(a);
    length > 0
        && length == self::length(b)
        && (a ^ b) & prefix_mask(length) == position_bit(length - 1)
}

/// The deepest cell containing both `a` and `b`.
pub const fn common_ancestor(a: i64, b: i64) -> i64 {
    // Bit 63 is always clear, so the first differing position is one less than the
    // count of leading zeros.
    let diff = bits(a ^ b);
    let agreeing = if diff == 0 {
        MAX_Z_BITS
    } else {
        diff.leading_zeros() - 1
    };
    let mut common = length(a);
    if length(b) < common {
        common = length(b);
    }
    if agreeing < common {
        common = agreeing;
    }
    z_value(bits(a), common)
}

/// The lowest id in the subtree of `z`: `z` itself, normalized.
#[inline]
pub const fn z_lo(z: i64) -> i64 {
    z_value(bits(z), length(z))
}

/// The highest id in the subtree of `z` for a space of `z_bits` bits: the prefix of
/// `z` followed by ones down to `z_bits`, at full resolution.
#[inline]
pub const fn z_hi(z: i64, z_bits: u32) -> i64 {
    let length = length(z);
    debug_assert!(length <= z_bits);
    let fill = prefix_mask(z_bits) & !prefix_mask(length);
    (bits(z) & prefix_mask(length)) | fill | z_bits as i64
}

//! Target address type.

use std::fmt;
use std::ops::Add;

/// Strongly typed target address
///
/// Wraps the `u64` parsed out of an `m`/`M`/`X` command so that addresses
/// can't be mixed up with transfer lengths or register indices.
///
/// Arithmetic wraps: a transfer that starts near the top of the address space
/// simply wraps around, and it is up to the [`Target`](crate::target::Target)
/// to reject addresses it does not back.
///
/// ## Example
///
/// ```rust
/// use dbgstub_core::types::Address;
///
/// let addr = Address::from(0x1000);
/// let next_addr = addr + 0x10;
/// assert_eq!(next_addr.value(), 0x1010);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The null address (0x0)
    pub const ZERO: Self = Address(0);

    /// Create a new address from a `u64` value
    ///
    /// Equivalent to `Address::from(value)` but usable in const contexts.
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Get the raw `u64` value of this address
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Offset of this address from `base`, if it lies at or above it
    ///
    /// Used by RAM-backed targets to turn an address into an index.
    ///
    /// ```rust
    /// use dbgstub_core::types::Address;
    ///
    /// assert_eq!(Address::new(0x110).offset_from(Address::new(0x100)), Some(0x10));
    /// assert_eq!(Address::new(0x0f0).offset_from(Address::new(0x100)), None);
    /// ```
    pub fn offset_from(self, base: Address) -> Option<u64>
    {
        self.0.checked_sub(base.0)
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, rhs: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(rhs))
    }
}

/*!
 * User Address Space
 * Simulated per-process user memory with bounds-checked access
 */

use crate::core::types::{Size, UserAddr};

/// Flat user address space covering `[0, size)`
///
/// Address 0 is an ordinary user address, as in xv6; absence of an
/// optional pointer is decided by the syscall layer, not here.
pub struct AddressSpace {
    mem: Vec<u8>,
}

impl AddressSpace {
    pub fn new(size: Size) -> Self {
        Self { mem: vec![0; size] }
    }

    /// Process size (`sz`)
    #[inline]
    pub fn size(&self) -> Size {
        self.mem.len()
    }

    /// Whether `[addr, addr + len)` lies inside the address space
    ///
    /// The start must itself be a valid address even for `len == 0`.
    pub fn contains(&self, addr: UserAddr, len: Size) -> bool {
        let sz = self.size();
        if addr >= sz {
            return false;
        }
        matches!(addr.checked_add(len), Some(end) if end <= sz)
    }

    pub fn read(&self, addr: UserAddr, len: Size) -> Option<&[u8]> {
        if !self.contains(addr, len) {
            return None;
        }
        Some(&self.mem[addr..addr + len])
    }

    pub fn write(&mut self, addr: UserAddr, data: &[u8]) -> bool {
        if !self.contains(addr, data.len()) {
            return false;
        }
        self.mem[addr..addr + data.len()].copy_from_slice(data);
        true
    }

    pub fn read_i32(&self, addr: UserAddr) -> Option<i32> {
        let raw = self.read(addr, std::mem::size_of::<i32>())?;
        Some(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    pub fn write_i32(&mut self, addr: UserAddr, value: i32) -> bool {
        self.write(addr, &value.to_le_bytes())
    }
}

impl std::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AddressSpace").field("size", &self.size()).finish()
    }
}

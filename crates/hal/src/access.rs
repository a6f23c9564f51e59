use core::ptr;

/// Capability to load and store hardware registers.
///
/// Accesses are fire-and-forget: a store never fails and a load returns
/// whatever the device currently presents. Implementations must not cache,
/// merge or reorder accesses.
pub trait RegisterAccess {
    fn read_u8(&mut self, addr: u32) -> u8;
    fn write_u8(&mut self, addr: u32, value: u8);
    fn read_u32(&mut self, addr: u32) -> u32;
    fn write_u32(&mut self, addr: u32, value: u32);
}

impl<T: RegisterAccess + ?Sized> RegisterAccess for &mut T {
    fn read_u8(&mut self, addr: u32) -> u8 {
        (**self).read_u8(addr)
    }

    fn write_u8(&mut self, addr: u32, value: u8) {
        (**self).write_u8(addr, value)
    }

    fn read_u32(&mut self, addr: u32) -> u32 {
        (**self).read_u32(addr)
    }

    fn write_u32(&mut self, addr: u32, value: u32) {
        (**self).write_u32(addr, value)
    }
}

/// Direct volatile access to the physical address space.
#[derive(Debug)]
pub struct Mmio {
    _private: (),
}

impl Mmio {
    /// # Safety
    ///
    /// Every address later passed to this accessor must be a device register
    /// (or RAM) of the matching width on the running platform.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl RegisterAccess for Mmio {
    #[inline(always)]
    fn read_u8(&mut self, addr: u32) -> u8 {
        unsafe { ptr::read_volatile(addr as usize as *const u8) }
    }

    #[inline(always)]
    fn write_u8(&mut self, addr: u32, value: u8) {
        unsafe { ptr::write_volatile(addr as usize as *mut u8, value) }
    }

    #[inline(always)]
    fn read_u32(&mut self, addr: u32) -> u32 {
        unsafe { ptr::read_volatile(addr as usize as *const u32) }
    }

    #[inline(always)]
    fn write_u32(&mut self, addr: u32, value: u32) {
        unsafe { ptr::write_volatile(addr as usize as *mut u32, value) }
    }
}

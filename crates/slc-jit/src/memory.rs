//! Raw executable and data memory, allocated directly from the OS.
//! Each handle owns its mapping and releases it on `Drop`.

use anyhow::{bail, Result};

/// 8 MiB, matching the ELF backend's `create_stack` allocation.
pub const DATA_STACK_SIZE: usize = 8 << 20;

/// A read-execute mapping holding copied-in machine code.
pub struct ExecutableMemory {
    ptr: *mut u8,
    len: usize,
}

impl ExecutableMemory {
    pub fn new(code: &[u8]) -> Result<Self> {
        let ptr = sys::map_exec(code.len())?;
        unsafe { std::ptr::copy_nonoverlapping(code.as_ptr(), ptr, code.len()) };
        Ok(ExecutableMemory { ptr, len: code.len() })
    }

    /// The program's entry point: `int64_t (*)(void *stack)`.
    pub fn entry_fn(&self) -> extern "C" fn(*mut u8) -> i64 {
        unsafe { std::mem::transmute::<*mut u8, extern "C" fn(*mut u8) -> i64>(self.ptr) }
    }
}

impl Drop for ExecutableMemory {
    fn drop(&mut self) {
        if let Err(e) = unsafe { sys::unmap(self.ptr, self.len) } {
            log::warn!("failed to release executable memory: {e}");
        }
    }
}

/// A read-write mapping used as the program's data stack.
pub struct DataStack {
    ptr: *mut u8,
    len: usize,
}

impl DataStack {
    pub fn new(size: usize) -> Result<Self> {
        let ptr = sys::map_rw(size)?;
        Ok(DataStack { ptr, len: size })
    }

    pub fn base_ptr(&self) -> *mut u8 {
        self.ptr
    }
}

impl Drop for DataStack {
    fn drop(&mut self) {
        if let Err(e) = unsafe { sys::unmap(self.ptr, self.len) } {
            log::warn!("failed to release the data stack: {e}");
        }
    }
}

#[cfg(unix)]
mod sys {
    use super::*;

    pub fn map_exec(len: usize) -> Result<*mut u8> {
        map(len, libc::PROT_EXEC | libc::PROT_READ | libc::PROT_WRITE)
    }

    pub fn map_rw(len: usize) -> Result<*mut u8> {
        map(len, libc::PROT_READ | libc::PROT_WRITE)
    }

    fn map(len: usize, prot: i32) -> Result<*mut u8> {
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                prot,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            bail!("mmap failed: {}", std::io::Error::last_os_error());
        }
        Ok(ptr as *mut u8)
    }

    /// # Safety
    /// `ptr`/`len` must describe a live mapping returned by `map`.
    pub unsafe fn unmap(ptr: *mut u8, len: usize) -> Result<()> {
        if libc::munmap(ptr as *mut libc::c_void, len) != 0 {
            bail!("munmap failed: {}", std::io::Error::last_os_error());
        }
        Ok(())
    }
}

#[cfg(windows)]
mod sys {
    use super::*;
    use winapi::um::memoryapi::{VirtualAlloc, VirtualFree};
    use winapi::um::winnt::{MEM_COMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_EXECUTE_READWRITE, PAGE_READWRITE};

    pub fn map_exec(len: usize) -> Result<*mut u8> {
        map(len, PAGE_EXECUTE_READWRITE)
    }

    pub fn map_rw(len: usize) -> Result<*mut u8> {
        map(len, PAGE_READWRITE)
    }

    fn map(len: usize, protect: u32) -> Result<*mut u8> {
        let ptr = unsafe {
            VirtualAlloc(std::ptr::null_mut(), len, MEM_COMMIT | MEM_RESERVE, protect)
        };
        if ptr.is_null() {
            bail!("VirtualAlloc failed");
        }
        Ok(ptr as *mut u8)
    }

    /// # Safety
    /// `ptr` must describe a live mapping returned by `map`; `len` is
    /// ignored, matching `VirtualFree`'s `MEM_RELEASE` contract.
    pub unsafe fn unmap(ptr: *mut u8, _len: usize) -> Result<()> {
        if VirtualFree(ptr as *mut _, 0, MEM_RELEASE) == 0 {
            bail!("VirtualFree failed");
        }
        Ok(())
    }
}

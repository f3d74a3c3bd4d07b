//! `#[repr(C)]` types crossing the plugin boundary
//!
//! Two disjoint families keep ownership unambiguous:
//!
//! - **Borrowed views** ([`RbString`], [`RbBytes`]): point into memory the
//!   caller owns, valid only for the call they are passed to. The plugin side
//!   copies anything it wants to keep.
//! - **Owned buffers** ([`RbStringOwned`], [`RbBytesOwned`], [`RbResponse`]):
//!   allocated by the plugin side and recorded in the [`AllocationLedger`].
//!   The host releases each exactly once through the matching free function
//!   and never through its own allocator.
//!
//! In both families `len == 0 && data == null` means absent, while
//! `len == 0 && data != null` means present but empty.

use crate::ledger::{Allocation, AllocationLedger};
use plugwire_core::{ErrorCode, PluginError, PluginResult, RawMessage};
use std::ffi::{CStr, c_void};
use std::slice;

/// Interpret a caller-supplied pointer and length as a borrowed slice
///
/// A null pointer is an absent view regardless of `len`.
///
/// # Safety
///
/// When non-null, `data` must be valid for reads of `len` bytes for `'a`.
pub(crate) unsafe fn borrowed_slice<'a>(data: *const u8, len: usize) -> Option<&'a [u8]> {
    if data.is_null() {
        return None;
    }
    Some(unsafe { slice::from_raw_parts(data, len) })
}

fn wire_len(len: usize) -> PluginResult<u32> {
    u32::try_from(len).map_err(|_| {
        PluginError::Serialization(format!("{len} bytes exceed the 4 GiB boundary limit"))
    })
}

// Lengths were checked against u32 before allocating, capacities are at most
// seven bytes larger and stay in range.
fn wire_capacity(allocation: &Allocation) -> u32 {
    u32::try_from(allocation.capacity).unwrap_or(u32::MAX)
}

/// Release `data` through the global ledger
///
/// Null is a no-op. An address that is not live is logged and left alone.
fn release_owned(data: *const u8, what: &str) -> bool {
    if data.is_null() {
        return true;
    }
    if AllocationLedger::global().release(data) {
        true
    } else {
        tracing::warn!(
            address = data as usize,
            "ignoring release of {what} that is not live (double free or foreign pointer)"
        );
        false
    }
}

// ============================================================================
// Borrowed views
// ============================================================================

/// Borrowed UTF-8 string view
///
/// ```text
/// +--------+--------+
/// |  len   |  data  |
/// | (u32)  | (*u8)  |
/// +--------+--------+
/// ```
///
/// When present, `data` is null-terminated and `len` excludes the terminator.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RbString {
    pub len: u32,
    pub data: *const u8,
}

impl RbString {
    /// The absent string
    #[inline]
    pub const fn none() -> Self {
        Self {
            len: 0,
            data: std::ptr::null(),
        }
    }

    /// Borrow a C string; the view is valid as long as `s` is
    pub fn from_c_str(s: &CStr) -> Self {
        Self {
            len: u32::try_from(s.to_bytes().len()).unwrap_or(u32::MAX),
            data: s.as_ptr().cast(),
        }
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        !self.data.is_null()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Read the view as `&str`
    ///
    /// Returns `Ok(None)` for the absent string and an `Ffi` error when the
    /// bytes are not UTF-8.
    ///
    /// # Safety
    ///
    /// `data` must be valid for reads of `len` bytes for the chosen lifetime
    /// `'a`. The result borrows the pointee, not the view.
    pub unsafe fn as_str<'a>(&self) -> PluginResult<Option<&'a str>> {
        match unsafe { borrowed_slice(self.data, self.len as usize) } {
            None => Ok(None),
            Some(bytes) => std::str::from_utf8(bytes)
                .map(Some)
                .map_err(|e| PluginError::Ffi(format!("string view is not UTF-8: {e}"))),
        }
    }
}

// SAFETY: a view is only a pointer and a length; validity of the pointee is
// the caller's obligation for the duration of the call.
unsafe impl Send for RbString {}
unsafe impl Sync for RbString {}

impl Default for RbString {
    fn default() -> Self {
        Self::none()
    }
}

/// Borrowed byte view with the same layout as [`RbString`]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RbBytes {
    pub len: u32,
    pub data: *const u8,
}

impl RbBytes {
    /// The absent byte view
    #[inline]
    pub const fn none() -> Self {
        Self {
            len: 0,
            data: std::ptr::null(),
        }
    }

    /// Borrow a slice; the view is valid as long as `bytes` is
    pub fn from_slice(bytes: &[u8]) -> PluginResult<Self> {
        Ok(Self {
            len: wire_len(bytes.len())?,
            data: bytes.as_ptr(),
        })
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        !self.data.is_null()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// # Safety
    ///
    /// `data` must be valid for reads of `len` bytes for the chosen lifetime
    /// `'a`. The result borrows the pointee, not the view.
    #[inline]
    pub unsafe fn as_slice<'a>(&self) -> Option<&'a [u8]> {
        unsafe { borrowed_slice(self.data, self.len as usize) }
    }
}

// SAFETY: see RbString
unsafe impl Send for RbBytes {}
unsafe impl Sync for RbBytes {}

impl Default for RbBytes {
    fn default() -> Self {
        Self::none()
    }
}

// ============================================================================
// Owned buffers
// ============================================================================

/// Plugin-owned, null-terminated UTF-8 string
///
/// Must be released with `rb_string_free`.
#[repr(C)]
#[derive(Debug)]
pub struct RbStringOwned {
    /// Length in bytes, excluding the terminator
    pub len: u32,
    pub data: *mut u8,
    pub capacity: u32,
}

impl RbStringOwned {
    /// The absent string
    #[inline]
    pub const fn none() -> Self {
        Self {
            len: 0,
            data: std::ptr::null_mut(),
            capacity: 0,
        }
    }

    /// Copy `s` into a ledger-owned, null-terminated buffer
    pub fn from_slice(s: &str) -> PluginResult<Self> {
        let len = wire_len(s.len())?;
        let allocation = AllocationLedger::global().allocate_c_string(s.as_bytes());
        Ok(Self {
            len,
            data: allocation.data,
            capacity: wire_capacity(&allocation),
        })
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        !self.data.is_null()
    }

    /// Borrowed view of this string
    #[inline]
    pub fn as_borrowed(&self) -> RbString {
        RbString {
            len: self.len,
            data: self.data,
        }
    }

    /// Return the memory to the ledger and reset the fields
    ///
    /// Returns false when the buffer was not live.
    pub fn release(&mut self) -> bool {
        let released = release_owned(self.data, "owned string");
        *self = Self::none();
        released
    }
}

// SAFETY: the pointee is owned by the ledger, not by a thread.
unsafe impl Send for RbStringOwned {}

impl Default for RbStringOwned {
    fn default() -> Self {
        Self::none()
    }
}

/// Plugin-owned byte buffer
///
/// Must be released with `rb_bytes_free`.
#[repr(C)]
#[derive(Debug)]
pub struct RbBytesOwned {
    pub len: u32,
    pub data: *mut u8,
    pub capacity: u32,
}

impl RbBytesOwned {
    /// The absent buffer
    #[inline]
    pub const fn none() -> Self {
        Self {
            len: 0,
            data: std::ptr::null_mut(),
            capacity: 0,
        }
    }

    /// Copy `bytes` into a ledger-owned buffer
    pub fn from_slice(bytes: &[u8]) -> PluginResult<Self> {
        let len = wire_len(bytes.len())?;
        let allocation = AllocationLedger::global().allocate(bytes);
        Ok(Self {
            len,
            data: allocation.data,
            capacity: wire_capacity(&allocation),
        })
    }

    #[inline]
    pub fn is_present(&self) -> bool {
        !self.data.is_null()
    }

    #[inline]
    pub fn as_borrowed(&self) -> RbBytes {
        RbBytes {
            len: self.len,
            data: self.data,
        }
    }

    /// Return the memory to the ledger and reset the fields
    ///
    /// Returns false when the buffer was not live.
    pub fn release(&mut self) -> bool {
        let released = release_owned(self.data, "owned bytes");
        *self = Self::none();
        released
    }
}

// SAFETY: see RbStringOwned
unsafe impl Send for RbBytesOwned {}

impl Default for RbBytesOwned {
    fn default() -> Self {
        Self::none()
    }
}

// ============================================================================
// Response envelope
// ============================================================================

/// Result of a transport call
///
/// ```text
/// +------------+--------+----------+------------+
/// | error_code |  len   | capacity |    data    |
/// |   (u32)    | (u32)  |  (u32)   | (*mut void)|
/// +------------+--------+----------+------------+
/// ```
///
/// - `error_code == 0`: `data` holds the `len`-byte response struct, 8-byte
///   aligned so the host may cast it directly
/// - `error_code != 0`: `data` holds a null-terminated diagnostic of `len`
///   bytes (terminator excluded)
///
/// The envelope is an owned buffer; release it with `rb_response_free`.
#[repr(C)]
#[derive(Debug)]
pub struct RbResponse {
    pub error_code: u32,
    pub len: u32,
    pub capacity: u32,
    pub data: *mut c_void,
}

impl RbResponse {
    /// Envelope with no payload and code 0
    pub const fn empty() -> Self {
        Self {
            error_code: 0,
            len: 0,
            capacity: 0,
            data: std::ptr::null_mut(),
        }
    }

    /// Successful envelope carrying a copy of `payload`
    pub fn success(payload: &[u8]) -> Self {
        let len = match wire_len(payload.len()) {
            Ok(len) => len,
            Err(e) => return Self::from_error(&e),
        };
        let allocation = AllocationLedger::global().allocate(payload);
        Self {
            error_code: ErrorCode::None.as_u32(),
            len,
            capacity: wire_capacity(&allocation),
            data: allocation.data.cast(),
        }
    }

    /// Error envelope with `message` as the diagnostic
    pub fn error(code: ErrorCode, message: &str) -> Self {
        let allocation = AllocationLedger::global().allocate_c_string(message.as_bytes());
        Self {
            error_code: code.as_u32(),
            len: u32::try_from(allocation.len).unwrap_or(u32::MAX),
            capacity: wire_capacity(&allocation),
            data: allocation.data.cast(),
        }
    }

    /// Flatten an error into the envelope; the diagnostic is its display text
    pub fn from_error(err: &PluginError) -> Self {
        Self::error(err.code(), &err.to_string())
    }

    pub fn from_result(result: PluginResult<Vec<u8>>) -> Self {
        match result {
            Ok(payload) => Self::success(&payload),
            Err(e) => Self::from_error(&e),
        }
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        self.error_code != 0
    }

    #[inline]
    pub fn code(&self) -> ErrorCode {
        ErrorCode::from_u32(self.error_code)
    }

    /// Success payload bytes
    ///
    /// # Safety
    ///
    /// The envelope must be live (not yet released).
    pub unsafe fn payload(&self) -> Option<&[u8]> {
        if self.is_error() {
            return None;
        }
        unsafe { borrowed_slice(self.data.cast_const().cast(), self.len as usize) }
    }

    /// Diagnostic text of an error envelope
    ///
    /// # Safety
    ///
    /// The envelope must be live (not yet released).
    pub unsafe fn error_message(&self) -> Option<String> {
        if !self.is_error() {
            return None;
        }
        unsafe { borrowed_slice(self.data.cast_const().cast(), self.len as usize) }
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    /// Decode the success payload as a raw struct
    ///
    /// # Safety
    ///
    /// The envelope must be live (not yet released).
    pub unsafe fn read<T: RawMessage>(&self) -> PluginResult<T> {
        unsafe { self.to_result() }.and_then(|bytes| T::read_from(&bytes))
    }

    /// Rebuild the internal result from the flattened envelope
    ///
    /// # Safety
    ///
    /// The envelope must be live (not yet released).
    pub unsafe fn to_result(&self) -> PluginResult<Vec<u8>> {
        if self.is_error() {
            let message = unsafe { self.error_message() }.unwrap_or_default();
            return Err(PluginError::from_code(self.error_code, message));
        }
        Ok(unsafe { self.payload() }.map(<[u8]>::to_vec).unwrap_or_default())
    }

    /// Return the memory to the ledger and reset the fields
    ///
    /// Returns false when the buffer was not live.
    pub fn release(&mut self) -> bool {
        let released = release_owned(self.data.cast_const().cast(), "response envelope");
        *self = Self::empty();
        released
    }
}

// SAFETY: see RbStringOwned
unsafe impl Send for RbResponse {}

impl Default for RbResponse {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
#[path = "binary_types/binary_types_tests.rs"]
mod binary_types_tests;

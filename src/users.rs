//! User-database lookups backing `~user` expansion.

use crate::wchar::{wstr, WString};
use std::ffi::{CStr, CString};
use std::mem::MaybeUninit;

/// Resolves user names to home directories.
pub trait UserDirs {
    /// Return the home directory of the named user, or None if there is no such user.
    fn home_for_user(&self, name: &wstr) -> Option<WString>;
}

/// The system user database, via getpwnam_r(3).
pub struct SystemUserDirs;

impl UserDirs for SystemUserDirs {
    fn home_for_user(&self, name: &wstr) -> Option<WString> {
        let name_cstr = CString::new(name.to_string()).ok()?;
        let mut userinfo = MaybeUninit::uninit();
        let mut result: *mut libc::passwd = std::ptr::null_mut();
        let mut buf = [0 as libc::c_char; 8192];
        let retval = unsafe {
            libc::getpwnam_r(
                name_cstr.as_ptr(),
                userinfo.as_mut_ptr(),
                buf.as_mut_ptr(),
                buf.len(),
                &mut result,
            )
        };
        if retval != 0 || result.is_null() {
            return None;
        }
        let userinfo = unsafe { userinfo.assume_init() };
        let home = unsafe { CStr::from_ptr(userinfo.pw_dir) };
        Some(WString::from_str(&home.to_string_lossy()))
    }
}

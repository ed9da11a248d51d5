//! Support for wide strings.
//!
//! Shell text flows through expansion as UTF-32, one `char` per code point,
//! so that in-band marker code points and string offsets stay cheap to work
//! with. Two types are used throughout:
//!   - wstr: a string slice without a nul terminator. Like `&str` but wide chars.
//!   - WString: an owning string without a nul terminator. Like `String` but wide chars.

pub use widestring::{Utf32Str as wstr, Utf32String as WString};

pub mod prelude {
    pub use crate::wchar::{wstr, WString, L};
    pub use crate::wchar_ext::{IntoCharIter, ToWString, WExt};
}

/// Creates a wstr string slice, like the "L" prefix of C.
/// The result is of type wstr. It is NOT nul-terminated.
#[macro_export]
macro_rules! L {
    ($string:expr) => {
        widestring::utf32str!($string)
    };
}
pub use L;

//! Generic utilities library.

use crate::wchar::prelude::*;
use std::cmp::Ordering;

/// Return the process id of this shell.
pub fn getpid() -> i32 {
    unsafe { libc::getpid() }
}

/// Compares two wide character strings with an (arguably) intuitive ordering. This function tries
/// to order strings in a way which is intuitive to humans with regards to sorting strings
/// containing numbers.
///
/// Most sorting functions would sort the strings 'file1.txt' 'file5.txt' and 'file12.txt' as:
///
/// file1.txt
/// file12.txt
/// file5.txt
///
/// This function regards any sequence of digits as a single entity when performing comparisons, so
/// the output is instead:
///
/// file1.txt
/// file5.txt
/// file12.txt
///
/// Which most people would find more intuitive.
///
/// This won't return the optimum results for numbers in bases higher than ten, such as hexadecimal,
/// but at least a stable sort order will result.
///
/// This function performs a two-tiered sort, where difference in case and in number of leading
/// zeroes in numbers only have effect if no other differences between strings are found. This way,
/// a 'file1' and 'File1' will not be considered identical, and hence their internal sort order is
/// not arbitrary, but the names 'file1', 'File2' and 'file3' will still be sorted in the order
/// given above.
pub fn wcsfilecmp_glob(a: &wstr, b: &wstr) -> Ordering {
    let mut retval = Ordering::Equal;
    let mut ai = 0;
    let mut bi = 0;
    while ai < a.len() && bi < b.len() {
        let ac = a.as_char_slice()[ai];
        let bc = b.as_char_slice()[bi];
        if ac.is_ascii_digit() && bc.is_ascii_digit() {
            let (ad, bd);
            (retval, ad, bd) = wcsfilecmp_leading_digits(a.slice_from(ai), b.slice_from(bi));
            ai += ad;
            bi += bd;
            // If we know the strings aren't logically equal or we've reached the end of one or
            // both strings we can stop iterating over the chars in each string.
            if retval != Ordering::Equal || ai == a.len() || bi == b.len() {
                break;
            }
            continue;
        }

        // Fast path: skip the case fold.
        if ac == bc {
            ai += 1;
            bi += 1;
            continue;
        }

        let acl = ac.to_lowercase().next().unwrap();
        let bcl = bc.to_lowercase().next().unwrap();
        match acl.cmp(&bcl) {
            Ordering::Equal => {
                ai += 1;
                bi += 1;
            }
            other => {
                retval = other;
                break;
            }
        }
    }

    if retval != Ordering::Equal {
        return retval; // we already know the strings aren't logically equal
    }

    if ai == a.len() {
        if bi == b.len() {
            // The strings are logically equal. They may or may not be the same length depending on
            // whether numbers were present but that doesn't matter. Disambiguate strings that
            // differ by letter case or length.
            a.cmp(b)
        } else {
            // String a is a prefix of b and b is longer.
            Ordering::Less
        }
    } else {
        assert!(bi == b.len());
        // String b is a prefix of a and a is longer.
        Ordering::Greater
    }
}

// Compare the strings to see if they begin with an integer that can be compared and return the
// result of that comparison, plus how many characters of each string were consumed.
fn wcsfilecmp_leading_digits(a: &wstr, b: &wstr) -> (Ordering, usize, usize) {
    // Ignore leading 0s.
    let mut ai = a.chars().take_while(|c| *c == '0').count();
    let mut bi = b.chars().take_while(|c| *c == '0').count();

    let mut ret = Ordering::Equal;
    loop {
        let ac = a.try_char_at(ai).unwrap_or('\0');
        let bc = b.try_char_at(bi).unwrap_or('\0');
        if ac.is_ascii_digit() && bc.is_ascii_digit() {
            // We keep the cmp value for the first differing digit.
            //
            // If the numbers have the same length, that's the value.
            if ret == Ordering::Equal {
                // Comparing the character value is the same as numerical for digits.
                ret = ac.cmp(&bc);
            }
        } else {
            // We don't have negative numbers and we only allow ints, and we have already skipped
            // leading zeroes, so the longer number is larger automatically.
            if ac.is_ascii_digit() {
                ret = Ordering::Greater;
            }
            if bc.is_ascii_digit() {
                ret = Ordering::Less;
            }
            break;
        }
        ai += 1;
        bi += 1;
    }

    // Skip trailing whitespace, so that sorting globs stays stable for
    // numbers followed by padding.
    ai += a.chars().skip(ai).take_while(|c| c.is_whitespace()).count();
    bi += b.chars().skip(bi).take_while(|c| c.is_whitespace()).count();
    (ret, ai, bi)
}

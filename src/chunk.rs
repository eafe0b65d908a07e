//! Pure helpers that split an opaque string into ordered fragments.
//!
//! Lengths are measured in characters so every part stays a valid string.
//! The transport codecs used for QR output are ASCII, where this is the same
//! as counting bytes. Sizes bound the fragment itself; the framed wire string
//! produced by an [`Envelope`](crate::envelope::Envelope) is longer.
//!
//! Both functions return the parts in order: element `0` holds fragment
//! index 1 and starts at the first character of the blob.

use std::num::NonZeroUsize;

/// Split `blob` into exactly `count` contiguous parts of near-equal length.
///
/// Part lengths differ by at most one, with the longer parts first. An empty
/// blob yields a single empty part regardless of `count`.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use truthframe::chunk::split_by_count;
///
/// let parts = split_by_count("abcdefg", NonZeroUsize::new(3).expect("non-zero"));
/// assert_eq!(parts, ["abc", "de", "fg"]);
/// ```
#[must_use]
pub fn split_by_count(blob: &str, count: NonZeroUsize) -> Vec<String> {
    let len = blob.chars().count();
    if len == 0 {
        return vec![String::new()];
    }

    let count = count.get();
    let base = len / count;
    let longer = len % count;

    let mut parts = Vec::with_capacity(count);
    let mut chars = blob.chars();
    for position in 0..count {
        let take = if position < longer { base + 1 } else { base };
        parts.push(chars.by_ref().take(take).collect());
    }
    parts
}

/// Split `blob` into consecutive parts of at most `max_size` characters.
///
/// Produces `ceil(len / max_size)` parts where only the last may be shorter.
/// An empty blob yields a single empty part.
///
/// # Examples
///
/// ```
/// use std::num::NonZeroUsize;
///
/// use truthframe::chunk::split_by_size;
///
/// let parts = split_by_size("abcdefg", NonZeroUsize::new(3).expect("non-zero"));
/// assert_eq!(parts, ["abc", "def", "g"]);
/// ```
#[must_use]
pub fn split_by_size(blob: &str, max_size: NonZeroUsize) -> Vec<String> {
    let len = blob.chars().count();
    if len == 0 {
        return vec![String::new()];
    }

    let max = max_size.get();
    let mut parts = Vec::with_capacity(len.div_ceil(max));
    let mut chars = blob.chars().peekable();
    while chars.peek().is_some() {
        parts.push(chars.by_ref().take(max).collect());
    }
    parts
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use rstest::rstest;

    use super::{split_by_count, split_by_size};

    fn nz(value: usize) -> NonZeroUsize { NonZeroUsize::new(value).expect("non-zero") }

    #[rstest]
    #[case("abcdefghij", 3, &["abcd", "efg", "hij"])]
    #[case("abcdef", 3, &["ab", "cd", "ef"])]
    #[case("abc", 1, &["abc"])]
    #[case("ab", 4, &["a", "b", "", ""])]
    fn count_split_balances_lengths(
        #[case] blob: &str,
        #[case] count: usize,
        #[case] expected: &[&str],
    ) {
        assert_eq!(split_by_count(blob, nz(count)), expected);
    }

    #[rstest]
    #[case("abcdefghij", 4, &["abcd", "efgh", "ij"])]
    #[case("abcdefgh", 4, &["abcd", "efgh"])]
    #[case("abc", 10, &["abc"])]
    #[case("abc", 1, &["a", "b", "c"])]
    fn size_split_caps_each_part(
        #[case] blob: &str,
        #[case] size: usize,
        #[case] expected: &[&str],
    ) {
        assert_eq!(split_by_size(blob, nz(size)), expected);
    }

    #[test]
    fn empty_blob_yields_one_empty_part() {
        assert_eq!(split_by_count("", nz(5)), [""]);
        assert_eq!(split_by_size("", nz(5)), [""]);
    }

    #[test]
    fn never_splits_inside_a_character() {
        let parts = split_by_size("ñañañ", nz(2));
        assert_eq!(parts, ["ña", "ña", "ñ"]);
        assert_eq!(split_by_count("✓✓✓", nz(2)), ["✓✓", "✓"]);
    }
}

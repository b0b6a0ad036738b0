//! Word-packed bit array over caller-provided storage.
//!
//! Bit `i` lives in word `i / 64` at position `i % 64`. A set bit means the
//! frame is in use.

use core::fmt;

const WORD_BITS: u64 = u64::BITS as u64;

pub struct FrameBitmap<'b> {
    words: &'b mut [u64],
    len: u64,
}

impl<'b> FrameBitmap<'b> {
    /// Take `words`, mark every bit used and expose the first `len` bits.
    ///
    /// `len` is clamped to the bits `words` can hold.
    pub fn new_all_set(words: &'b mut [u64], len: u64) -> Self {
        words.fill(u64::MAX);
        let len = len.min(words.len() as u64 * WORD_BITS);
        Self { words, len }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether bit `index` is set. Bits beyond [`len`](Self::len) read as set.
    #[inline]
    #[must_use]
    pub fn get(&self, index: u64) -> bool {
        if index >= self.len {
            return true;
        }
        let (word, bit) = split(index);
        self.words[word] & (1 << bit) != 0
    }

    pub fn set_range(&mut self, start: u64, end: u64) {
        let end = end.min(self.len);
        for_each_word(start, end, |word, mask| self.words[word] |= mask);
    }

    pub fn clear_range(&mut self, start: u64, end: u64) {
        let end = end.min(self.len);
        for_each_word(start, end, |word, mask| self.words[word] &= !mask);
    }

    /// Number of clear bits in `start..end`.
    #[must_use]
    pub fn count_clear(&self, start: u64, end: u64) -> u64 {
        let end = end.min(self.len);
        let mut n = 0;
        for_each_word(start, end, |word, mask| {
            n += u64::from((!self.words[word] & mask).count_ones());
        });
        n
    }

    /// Lowest clear bit in `start..end`.
    #[must_use]
    pub fn first_clear(&self, start: u64, end: u64) -> Option<u64> {
        let end = end.min(self.len);
        let mut found = None;
        for_each_word(start, end, |word, mask| {
            let clear = !self.words[word] & mask;
            if found.is_none() && clear != 0 {
                found = Some(word as u64 * WORD_BITS + u64::from(clear.trailing_zeros()));
            }
        });
        found
    }

    /// Lowest index `i` such that `i..i + count` is clear and ends at or before `end`.
    ///
    /// Fully used and fully free words are stepped over in one go.
    #[must_use]
    pub fn find_clear_run(&self, end: u64, count: u64) -> Option<u64> {
        let end = end.min(self.len);
        if count == 0 || count > end {
            return None;
        }

        let mut run_start = 0;
        let mut run_len = 0;
        let mut i = 0;
        while i < end {
            let (word, bit) = split(i);
            if bit == 0 && i + WORD_BITS <= end {
                match self.words[word] {
                    u64::MAX => {
                        run_len = 0;
                        i += WORD_BITS;
                        continue;
                    }
                    0 => {
                        if run_len == 0 {
                            run_start = i;
                        }
                        run_len += WORD_BITS;
                        if run_len >= count {
                            return Some(run_start);
                        }
                        i += WORD_BITS;
                        continue;
                    }
                    _ => {}
                }
            }

            if self.words[word] & (1 << bit) == 0 {
                if run_len == 0 {
                    run_start = i;
                }
                run_len += 1;
                if run_len == count {
                    return Some(run_start);
                }
            } else {
                run_len = 0;
            }
            i += 1;
        }
        None
    }
}

impl fmt::Debug for FrameBitmap<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameBitmap")
            .field("len", &self.len)
            .field("clear", &self.count_clear(0, self.len))
            .finish()
    }
}

#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn split(index: u64) -> (usize, u32) {
    ((index / WORD_BITS) as usize, (index % WORD_BITS) as u32)
}

/// Call `f(word, mask)` for every word overlapping `start..end`.
fn for_each_word(start: u64, end: u64, mut f: impl FnMut(usize, u64)) {
    let mut i = start;
    while i < end {
        let (word, bit) = split(i);
        let n = (WORD_BITS - u64::from(bit)).min(end - i);
        let mask = if n == WORD_BITS {
            u64::MAX
        } else {
            ((1u64 << n) - 1) << bit
        };
        f(word, mask);
        i += n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_fully_used() {
        let mut words = [0u64; 4];
        let bm = FrameBitmap::new_all_set(&mut words, 200);
        assert_eq!(bm.len(), 200);
        assert_eq!(bm.count_clear(0, 200), 0);
        assert!(bm.get(199));
    }

    #[test]
    fn len_is_clamped_to_storage() {
        let mut words = [0u64; 2];
        let bm = FrameBitmap::new_all_set(&mut words, 1000);
        assert_eq!(bm.len(), 128);
    }

    #[test]
    fn ranges_across_word_boundaries() {
        let mut words = [0u64; 4];
        let mut bm = FrameBitmap::new_all_set(&mut words, 256);
        bm.clear_range(60, 140);
        assert_eq!(bm.count_clear(0, 256), 80);
        assert!(bm.get(59));
        assert!(!bm.get(60));
        assert!(!bm.get(139));
        assert!(bm.get(140));
        bm.set_range(64, 128);
        assert_eq!(bm.count_clear(0, 256), 16);
        assert_eq!(bm.first_clear(0, 256), Some(60));
        assert_eq!(bm.first_clear(64, 256), Some(128));
        assert_eq!(bm.first_clear(140, 256), None);
    }

    #[test]
    fn out_of_range_reads_as_used() {
        let mut words = [0u64; 1];
        let mut bm = FrameBitmap::new_all_set(&mut words, 10);
        bm.clear_range(0, 64);
        assert_eq!(bm.count_clear(0, 64), 10);
        assert!(bm.get(10));
    }

    #[test]
    fn first_fit_prefers_lowest_run() {
        let mut words = [0u64; 2];
        let mut bm = FrameBitmap::new_all_set(&mut words, 128);
        bm.clear_range(3, 5);
        bm.clear_range(10, 20);
        bm.clear_range(30, 100);
        assert_eq!(bm.find_clear_run(128, 1), Some(3));
        assert_eq!(bm.find_clear_run(128, 2), Some(3));
        assert_eq!(bm.find_clear_run(128, 3), Some(10));
        assert_eq!(bm.find_clear_run(128, 11), Some(30));
        assert_eq!(bm.find_clear_run(128, 70), Some(30));
        assert_eq!(bm.find_clear_run(128, 71), None);
        assert_eq!(bm.find_clear_run(50, 30), None);
    }

    #[test]
    fn run_spanning_a_free_word() {
        let mut words = [0u64; 3];
        let mut bm = FrameBitmap::new_all_set(&mut words, 192);
        bm.clear_range(60, 192);
        assert_eq!(bm.find_clear_run(192, 100), Some(60));
        assert_eq!(bm.find_clear_run(192, 132), Some(60));
        assert_eq!(bm.find_clear_run(192, 133), None);
    }

    #[test]
    fn free_word_run_does_not_overrun_end() {
        let mut words = [0u64; 2];
        let mut bm = FrameBitmap::new_all_set(&mut words, 128);
        bm.clear_range(0, 128);
        assert_eq!(bm.find_clear_run(70, 70), Some(0));
        assert_eq!(bm.find_clear_run(70, 71), None);
    }
}

//! Encoding of the packed lock state word.
//!
//! A single 32-bit word carries both the lock flag and the number of threads
//! that gave up spinning and registered themselves on the blocking path:
//!
//! ```text
//!  31                                   1   0
//! +---------------------------------------+---+
//! |           contender count             | H |
//! +---------------------------------------+---+
//! ```
//!
//! Registering a contender adds [`CONTENDER`] (that is, `2`) to the word.
//! A registered contender that finds `H` clear acquires the lock by
//! subtracting [`HELD`] from the word it observed: because `H` was clear,
//! that subtraction both removes one contender and sets `H` in one step.
//!
//! All functions in this module are pure. The mutex never stores a decoded
//! pair back, it computes the next word with [`encode`] from the one it
//! observed and installs it with a compare-and-swap.
//!
//! # Examples
//!
//! ```
//! use futexlock::state;
//!
//! let word = state::encode(true, 3);
//! assert!(state::is_held(word));
//! assert_eq!(state::contenders(word), 3);
//! assert_eq!(word, 7);
//! ```

/// The word of an unheld lock with no registered contenders.
pub const FREE: u32 = 0;

/// The bit that is set while some thread holds the lock.
pub const HELD: u32 = 1;

/// The amount a thread adds to the word to register as a contender.
pub const CONTENDER: u32 = HELD << 1;

/// Returns `true` if the held bit of `word` is set.
#[inline(always)]
#[must_use]
pub const fn is_held(word: u32) -> bool {
    word & HELD != 0
}

/// Returns the number of registered contenders in `word`.
#[inline(always)]
#[must_use]
pub const fn contenders(word: u32) -> u32 {
    word >> 1
}

/// Packs a held flag and a contender count into a state word.
///
/// The count must fit in 31 bits, which is far beyond any realistic number
/// of threads blocked on a single lock.
#[inline(always)]
#[must_use]
pub const fn encode(held: bool, contenders: u32) -> u32 {
    (contenders << 1) | held as u32
}

/// Returns `true` if `word` describes a lock that is neither held nor has
/// any registered contender.
#[inline(always)]
#[must_use]
pub const fn is_free(word: u32) -> bool {
    word == FREE
}

/// The word installed by a thread that acquires the lock while spinning:
/// held bit set, contender count unchanged.
#[inline(always)]
pub(crate) const fn acquired_spinning(word: u32) -> u32 {
    encode(true, contenders(word))
}

/// The word installed by a registered contender that acquires the lock:
/// held bit set, one less contender.
///
/// Requires `word` to be unheld and to count the caller as a contender.
#[inline(always)]
pub(crate) const fn acquired_contended(word: u32) -> u32 {
    encode(true, contenders(word) - 1)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn free_word_decodes_to_nothing() {
        assert!(!is_held(FREE));
        assert_eq!(contenders(FREE), 0);
        assert!(is_free(encode(false, 0)));
    }

    #[test]
    fn held_bit_is_independent_of_count() {
        for count in [0, 1, 2, 17, u32::MAX >> 1] {
            assert!(is_held(encode(true, count)));
            assert!(!is_held(encode(false, count)));
            assert_eq!(contenders(encode(true, count)), count);
            assert_eq!(contenders(encode(false, count)), count);
        }
    }

    #[test]
    fn registering_adds_one_contender() {
        let word = encode(true, 0);
        assert_eq!(contenders(word + CONTENDER), 1);
        assert!(is_held(word + CONTENDER));
    }

    #[test]
    fn contended_acquire_is_decrement_by_one() {
        // Two contenders registered, lock just released.
        let word = encode(false, 2);
        let next = acquired_contended(word);
        assert_eq!(next, word - HELD);
        assert!(is_held(next));
        assert_eq!(contenders(next), 1);
    }

    #[test]
    fn spinning_acquire_keeps_count() {
        let word = encode(false, 5);
        let next = acquired_spinning(word);
        assert_eq!(next, word | HELD);
        assert_eq!(contenders(next), 5);
    }

    #[test]
    fn release_of_sole_holder_frees_the_word() {
        assert!(is_free(encode(true, 0) - HELD));
        assert!(!is_free(encode(true, 1) - HELD));
    }
}

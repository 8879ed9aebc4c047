//! The deduplicated constant pool.
//!
//! Interned values share storage: the same int or float bit pattern is
//! stored once and every load refers to its byte offset. Uniform globals
//! instead reserve private windows that never deduplicate, so the host can
//! patch one uniform without disturbing another that happens to share a
//! value.

use std::collections::HashMap;

/// Distinguishes int and float entries so `1` and the float with the same
/// bit pattern stay separate pool slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ConstClass {
    I32,
    F32,
}

#[derive(Debug, Default)]
pub struct ConstPool {
    words: Vec<u32>,
    dedup: HashMap<(ConstClass, u32), u32>,
}

impl ConstPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Byte offset of `bits`, inserting it on first sight.
    pub fn intern(&mut self, class: ConstClass, bits: u32) -> u32 {
        if let Some(&offset) = self.dedup.get(&(class, bits)) {
            return offset;
        }
        let offset = (self.words.len() * 4) as u32;
        self.words.push(bits);
        self.dedup.insert((class, bits), offset);
        offset
    }

    /// Reserves a window of `init.len()` words outside deduplication and
    /// returns its byte offset.
    pub fn reserve(&mut self, init: &[u32]) -> u32 {
        let offset = (self.words.len() * 4) as u32;
        self.words.extend_from_slice(init);
        offset
    }

    /// Distinct interned values of one class. Windows are not counted.
    pub fn interned_count(&self, class: ConstClass) -> usize {
        self.dedup.keys().filter(|(c, _)| *c == class).count()
    }

    pub fn byte_len(&self) -> u32 {
        (self.words.len() * 4) as u32
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn into_words(self) -> Vec<u32> {
        self.words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_values_share_one_slot() {
        let mut pool = ConstPool::new();
        let a = pool.intern(ConstClass::F32, 1.0f32.to_bits());
        let b = pool.intern(ConstClass::F32, 2.0f32.to_bits());
        let c = pool.intern(ConstClass::F32, 1.0f32.to_bits());
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.byte_len(), 8);
    }

    #[test]
    fn classes_do_not_collide() {
        let mut pool = ConstPool::new();
        let int_one = pool.intern(ConstClass::I32, 1);
        let float_with_bits_one = pool.intern(ConstClass::F32, 1);
        assert_ne!(int_one, float_with_bits_one);
        assert_eq!(pool.interned_count(ConstClass::I32), 1);
        assert_eq!(pool.interned_count(ConstClass::F32), 1);
    }

    #[test]
    fn windows_never_deduplicate() {
        let mut pool = ConstPool::new();
        let interned = pool.intern(ConstClass::F32, 1.0f32.to_bits());
        let window = pool.reserve(&[1.0f32.to_bits()]);
        assert_ne!(interned, window);
        // A later intern of the same value still finds the interned slot,
        // not the window.
        assert_eq!(pool.intern(ConstClass::F32, 1.0f32.to_bits()), interned);
    }
}

//! Packed dual-value fields: two `u128` halves sharing one 256-bit word.
//!
//! The word is kept in its big-endian wire form. The low half holds the first
//! value (gold, draws per match), the high half the second (marble, draw length).
//! Every update rebuilds the whole word from both halves.

use serde::{Deserialize, Serialize};
use std::fmt;
use crate::crypto::Bytes32;

#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct PackedWord(Bytes32);

impl PackedWord {
    pub const ZERO: PackedWord = PackedWord([0u8; 32]);

    pub fn pack(low: u128, high: u128) -> Self {
        let mut word = [0u8; 32];
        word[..16].copy_from_slice(&high.to_be_bytes());
        word[16..].copy_from_slice(&low.to_be_bytes());
        PackedWord(word)
    }

    pub fn from_bytes(word: Bytes32) -> Self {
        PackedWord(word)
    }

    pub fn to_bytes(&self) -> Bytes32 {
        self.0
    }

    pub fn low(&self) -> u128 {
        let mut half = [0u8; 16];
        half.copy_from_slice(&self.0[16..]);
        u128::from_be_bytes(half)
    }

    pub fn high(&self) -> u128 {
        let mut half = [0u8; 16];
        half.copy_from_slice(&self.0[..16]);
        u128::from_be_bytes(half)
    }

    pub fn with_low(self, low: u128) -> Self {
        Self::pack(low, self.high())
    }

    pub fn with_high(self, high: u128) -> Self {
        Self::pack(self.low(), high)
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for PackedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for PackedWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PackedWord(low={}, high={})", self.low(), self.high())
    }
}

/// Currency balance: gold in the low half, marble in the high half.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Balance(PackedWord);

impl Balance {
    pub fn new(gold: u128, marble: u128) -> Self {
        Balance(PackedWord::pack(gold, marble))
    }

    pub fn gold(&self) -> u128 {
        self.0.low()
    }

    pub fn marble(&self) -> u128 {
        self.0.high()
    }

    pub fn word(&self) -> PackedWord {
        self.0
    }

    /// `None` when the gold half would leave `u128`; marble is never touched.
    pub fn checked_add_gold(self, amount: u128) -> Option<Self> {
        self.gold().checked_add(amount).map(|g| Balance(self.0.with_low(g)))
    }

    pub fn checked_sub_gold(self, amount: u128) -> Option<Self> {
        self.gold().checked_sub(amount).map(|g| Balance(self.0.with_low(g)))
    }

    pub fn checked_add_marble(self, amount: u128) -> Option<Self> {
        self.marble().checked_add(amount).map(|m| Balance(self.0.with_high(m)))
    }

    pub fn checked_sub_marble(self, amount: u128) -> Option<Self> {
        self.marble().checked_sub(amount).map(|m| Balance(self.0.with_high(m)))
    }
}

/// Progression stats: draws per match in the low half, draw length in the high half.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct Progression(PackedWord);

impl Progression {
    pub fn new(draws_per_match: u128, draw_length: u128) -> Self {
        Progression(PackedWord::pack(draws_per_match, draw_length))
    }

    pub fn draws_per_match(&self) -> u128 {
        self.0.low()
    }

    pub fn draw_length(&self) -> u128 {
        self.0.high()
    }

    pub fn word(&self) -> PackedWord {
        self.0
    }
}

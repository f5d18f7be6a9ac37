//! VFAT long filename (LFN) fragments and their reassembly.
//!
//! A long name is stored as a run of 32-byte fragments placed directly before
//! the short entry it belongs to, last fragment first. Each fragment carries 13
//! UTF-16 code units and the checksum of the short entry's 11-byte name.

use std::mem;

use super::le16;

pub const LFN_LAST:         u8 = 0x40;
pub const LFN_ORDINAL_MASK: u8 = 0x1F;
pub const LFN_CHARS:        usize = 13;

const LFN_CHECKSUM: usize = 13;

/// One long-name fragment decoded from a directory slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LfnFragment {
    pub sequence: u8,
    pub checksum: u8,
    pub units:    [u16; LFN_CHARS],
}

impl LfnFragment {
    /// Decode a 32-byte slot whose attribute marks it as a long-name fragment.
    pub fn decode(slot: &[u8]) -> Self {
        let mut units = [0u16; LFN_CHARS];
        // 5 / 6 / 2 code units at byte offsets 1, 14 and 28.
        for (i, unit) in units[..5].iter_mut().enumerate() {
            *unit = le16(slot, 1 + i * 2);
        }
        for (i, unit) in units[5..11].iter_mut().enumerate() {
            *unit = le16(slot, 14 + i * 2);
        }
        for (i, unit) in units[11..].iter_mut().enumerate() {
            *unit = le16(slot, 28 + i * 2);
        }
        Self { sequence: slot[0], checksum: slot[LFN_CHECKSUM], units }
    }

    pub fn is_last(&self) -> bool { self.sequence & LFN_LAST != 0 }

    /// 1-based position of the fragment within the name.
    pub fn ordinal(&self) -> u8 { self.sequence & LFN_ORDINAL_MASK }

    /// Name code units, up to the first NUL or 0xFFFF fill.
    pub fn name_units(&self) -> &[u16] {
        let end = self
            .units
            .iter()
            .position(|&u| u == 0x0000 || u == 0xFFFF)
            .unwrap_or(LFN_CHARS);
        &self.units[..end]
    }
}

/// Checksum of an 11-byte padded short name: rotate right by one, then add.
pub fn lfn_checksum(short_name: &[u8; 11]) -> u8 {
    short_name
        .iter()
        .fold(0u8, |sum, &b| sum.rotate_right(1).wrapping_add(b))
}

#[derive(Default)]
enum State {
    #[default]
    Idle,
    Accumulating {
        checksum: u8,
        /// Ordinal the next fragment must carry; zero once the name is complete.
        expected: u8,
        units:    Vec<u16>,
    },
}

/// Reassembles one long name across consecutive directory slots.
#[derive(Default)]
pub struct LongName {
    state: State,
}

impl LongName {
    pub fn feed(&mut self, frag: &LfnFragment) {
        if frag.is_last() {
            if frag.ordinal() == 0 {
                log::debug!("lfn: fragment {:#04x} has ordinal zero, discarding", frag.sequence);
                self.state = State::Idle;
                return;
            }
            self.state = State::Accumulating {
                checksum: frag.checksum,
                expected: frag.ordinal() - 1,
                units:    frag.name_units().to_vec(),
            };
            return;
        }

        match &mut self.state {
            State::Accumulating { checksum, expected, units }
                if *checksum == frag.checksum && *expected != 0 && *expected == frag.ordinal() =>
            {
                let mut name = frag.name_units().to_vec();
                name.extend_from_slice(units);
                *units = name;
                *expected -= 1;
            }
            _ => {
                log::debug!(
                    "lfn: out-of-sequence fragment {:#04x} (checksum {:#04x}), discarding long name",
                    frag.sequence, frag.checksum
                );
                self.state = State::Idle;
            }
        }
    }

    /// Drop whatever has been accumulated.
    pub fn reset(&mut self) {
        self.state = State::Idle;
    }

    /// Consume the accumulated name for the short entry named `short_name`.
    /// Returns `None` unless a complete name with a matching checksum is pending.
    pub fn take(&mut self, short_name: &[u8; 11]) -> Option<String> {
        match mem::take(&mut self.state) {
            State::Idle => None,
            State::Accumulating { checksum, expected: 0, units } if checksum == lfn_checksum(short_name) => {
                Some(decode_utf16(&units))
            }
            State::Accumulating { .. } => {
                log::debug!("lfn: long name does not belong to the following short entry, using 8.3 name");
                None
            }
        }
    }
}

/// UTF-16 to UTF-8; unpaired surrogates become U+FFFD.
fn decode_utf16(units: &[u16]) -> String {
    char::decode_utf16(units.iter().copied())
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}

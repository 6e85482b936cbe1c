/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! The CPC keyboard matrix: 10 lines of up to 8 keys each, scanned through the PSG's
//! I/O port A the same way the firmware's `KM READ CHAR` routine does it.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

const LINE_COUNT: usize = 10;

/// Ten lines of 8 keys, one bit per key, `1` meaning "pressed" (the matrix itself reads
/// back active-low on real hardware; [CpcKeyboard::read_line] performs that inversion).
#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct CpcKeyboard {
    lines: [u8; LINE_COUNT],
    selected: u8,
}

impl CpcKeyboard {
    /// Sets or clears a single key's pressed state. `line` is 0-9, `bit` is 0-7.
    pub fn set_key(&mut self, line: u8, bit: u8, pressed: bool) {
        if (line as usize) >= LINE_COUNT {
            return;
        }
        let mask = 1u8 << (bit & 7);
        if pressed {
            self.lines[line as usize] |= mask;
        } else {
            self.lines[line as usize] &= !mask;
        }
    }

    /// Replaces an entire line's pressed-key bitmap at once.
    pub fn set_line(&mut self, line: u8, bits: u8) {
        if let Some(slot) = self.lines.get_mut(line as usize) {
            *slot = bits;
        }
    }

    /// Selects the keyboard line the next [CpcKeyboard::read_line] call reads, written
    /// through the PSG's register 14 output (port A) by the AY's control firmware.
    pub fn select_line(&mut self, line: u8) {
        self.selected = line;
    }

    pub fn selected_line(&self) -> u8 {
        self.selected
    }

    /// Reads the currently selected line, active-low, as seen on the PSG's port A input.
    pub fn read_line(&self) -> u8 {
        let line = self.selected as usize;
        if line >= LINE_COUNT {
            return 0xff;
        }
        !self.lines[line]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_back_active_low() {
        let mut kb = CpcKeyboard::default();
        kb.set_key(3, 2, true);
        kb.select_line(3);
        assert_eq!(kb.read_line(), !0b0000_0100);
    }

    #[test]
    fn unselected_lines_read_all_released() {
        let mut kb = CpcKeyboard::default();
        kb.set_key(0, 0, true);
        kb.select_line(1);
        assert_eq!(kb.read_line(), 0xff);
    }
}

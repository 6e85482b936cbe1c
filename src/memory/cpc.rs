/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! Amstrad CPC memory: 16k-paged 128k RAM plus a selectable lower/upper ROM pair, implementing
//! the same [ZxMemory] trait the Spectrum memory types in [super] implement (see `DESIGN.md`,
//! open question OQ-1) rather than a parallel CPC-only trait.
#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use super::{
    MemoryKind, Result, ZxMemory, ZxMemoryError, ScreenArray
};

const PAGE_SIZE: usize = 0x4000;
/// Lower OS ROM, default upper BASIC ROM, and one expansion upper ROM slot (AMSDOS).
const ROM_BANKS: usize = 3;
const ROM_OS: usize = 0;
const ROM_BASIC: usize = 1;
const ROM_AMSDOS: usize = 2;
/// 128kb of RAM: a CPC 6128/Plus complement. A plain 464 only ever uses banks 0..3.
const RAM_BANKS: usize = 8;
const ROM_SIZE: usize = ROM_BANKS * PAGE_SIZE;
const MEM_SIZE: usize = (ROM_BANKS + RAM_BANKS) * PAGE_SIZE;

/// The CPC gate array RAM configuration table (`spec.md` §4.2): the low 3 bits of the value
/// written to the RAM banking function select which RAM bank backs each of the four 16k
/// pages at 0x0000, 0x4000, 0x8000 and 0xc000.
const RAM_CONFIGS: [[usize; 4]; 8] = [
    [0, 1, 2, 3],
    [0, 1, 2, 7],
    [4, 5, 6, 7],
    [0, 3, 2, 7],
    [0, 4, 2, 3],
    [0, 5, 2, 3],
    [0, 6, 2, 3],
    [0, 7, 2, 3],
];

/// The handful of CPC memory-controller operations [crate::chip::cpc::Cpc464] and
/// [crate::chip::cpc::CpcPlus] drive directly from decoded Gate Array/ROM-select I/O
/// writes, kept separate from [ZxMemory] since they're specific to the CPC's banking
/// scheme rather than part of the shared paging interface.
pub trait CpcMemoryControl {
    /// Programs the gate array RAM banking register.
    fn select_ram(&mut self, cfg: u8);
    /// Programs the upper ROM selector.
    fn select_rom(&mut self, id: u8);
    /// Enables or disables the lower/upper ROM overlay.
    fn set_rom_enable(&mut self, lower: bool, upper: bool);
}

impl CpcMemoryControl for CpcMemory {
    fn select_ram(&mut self, cfg: u8) { CpcMemory::select_ram(self, cfg) }
    fn select_rom(&mut self, id: u8) { CpcMemory::select_rom(self, id) }
    fn set_rom_enable(&mut self, lower: bool, upper: bool) { CpcMemory::set_rom_enable(self, lower, upper) }
}

/// CPC 16k-paged memory: 128kb of RAM banked per [RAM_CONFIGS], a lower OS ROM and a
/// selectable upper ROM (BASIC or AMSDOS).
///
/// Unlike the Spectrum's `Memory128k` this type never attaches external ROMs through
/// [ZxMemory::map_exrom] — the CPC's expansion ROM boards are few enough in practice to model
/// as fixed additional ROM banks selected with [ZxMemory::map_rom_bank] through
/// [CpcMemory::select_rom] instead.
#[derive(Clone)]
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
pub struct CpcMemory {
    #[cfg_attr(feature = "snapshot", serde(with = "serde_big_array_impl"))]
    mem: Box<[u8; MEM_SIZE]>,
    /// Low 3 bits select one of the eight [RAM_CONFIGS]; CPC+ memory expansions widen this
    /// with extra bits appended above bit 2, per `spec.md` §4.2 ("extra bits for >128K").
    ram_config: u8,
    /// Per-page RAM bank override set by [ZxMemory::map_ram_bank], taking precedence over
    /// [RAM_CONFIGS] until the next [CpcMemory::select_ram] call clears it.
    ram_override: [Option<usize>; 4],
    /// The ROM bank currently selected for page 3 (0xc000..0xffff) when upper ROM is enabled.
    upper_rom_bank: usize,
    rom_lower_enabled: bool,
    rom_upper_enabled: bool,
}

impl Default for CpcMemory {
    fn default() -> Self {
        CpcMemory {
            mem: Box::new([0xff; MEM_SIZE]),
            ram_config: 0,
            ram_override: [None; 4],
            upper_rom_bank: ROM_BASIC,
            rom_lower_enabled: true,
            rom_upper_enabled: true,
        }
    }
}

impl CpcMemory {
    /// Programs the gate array RAM banking register (`select_ram` in `spec.md` §4.2).
    ///
    /// Only the low 3 bits select amongst [RAM_CONFIGS]; higher bits (CPC+ extended memory)
    /// are accepted but currently select the same bank set, as this core models a 128k CPC.
    pub fn select_ram(&mut self, cfg: u8) {
        self.ram_config = cfg & 0x07;
        self.ram_override = [None; 4];
    }

    /// Programs the upper ROM selector (`select_rom` in `spec.md` §4.2). `0` selects BASIC,
    /// `7` selects AMSDOS (the two ROM images this core ships); any other id falls back to
    /// BASIC, matching real hardware's behavior when no ROM board answers for that id.
    pub fn select_rom(&mut self, id: u8) {
        self.upper_rom_bank = match id {
            0 => ROM_BASIC,
            7 => ROM_AMSDOS,
            _ => ROM_BASIC,
        };
    }

    /// Enables or disables the lower (0x0000..0x3fff) and upper (0xc000..0xffff) ROM overlay,
    /// per the gate array's ROM enable bits (`spec.md` §4.2).
    pub fn set_rom_enable(&mut self, lower: bool, upper: bool) {
        self.rom_lower_enabled = lower;
        self.rom_upper_enabled = upper;
    }

    pub fn load_amsdos_rom<R: std::io::Read>(&mut self, rd: R) -> Result<()> {
        self.load_into_rom_bank(ROM_AMSDOS, rd)
    }

    #[inline]
    fn ram_bank_for_page(&self, page: u8) -> usize {
        self.ram_override[page as usize]
            .unwrap_or(RAM_CONFIGS[self.ram_config as usize][page as usize])
    }
}

impl ZxMemory for CpcMemory {
    const PAGE_SIZE: usize = PAGE_SIZE;
    const ROM_SIZE: usize = ROM_SIZE;
    const RAMTOP: u16 = u16::max_value();
    const PAGES_MAX: u8 = 3;
    const SCR_BANKS_MAX: usize = RAM_BANKS - 1;
    const ROM_BANKS_MAX: usize = ROM_BANKS - 1;
    const RAM_BANKS_MAX: usize = RAM_BANKS - 1;

    fn reset(&mut self) {
        self.ram_config = 0;
        self.upper_rom_bank = ROM_BASIC;
        self.rom_lower_enabled = true;
        self.rom_upper_enabled = true;
    }

    fn read(&self, addr: u16) -> u8 {
        let page = (addr >> 14) as u8;
        let offset = (addr & 0x3fff) as usize;
        let slice = self.page_ref(page).unwrap();
        slice[offset]
    }

    fn read16(&self, addr: u16) -> u16 {
        self.read(addr) as u16 | (self.read(addr.wrapping_add(1)) as u16) << 8
    }

    fn read_screen(&self, _screen_bank: usize, _addr: u16) -> u8 {
        panic!("CPC screen memory is CRTC-addressed; read it through ZxMemory::read, not read_screen")
    }

    fn write(&mut self, addr: u16, val: u8) {
        let page = (addr >> 14) as u8;
        if self.page_kind(page).unwrap() == MemoryKind::Rom {
            return;
        }
        let offset = (addr & 0x3fff) as usize;
        let slice = self.page_mut(page).unwrap();
        slice[offset] = val;
    }

    fn write16(&mut self, addr: u16, val: u16) {
        self.write(addr, val as u8);
        self.write(addr.wrapping_add(1), (val >> 8) as u8);
    }

    fn mem_ref(&self) -> &[u8] {
        &self.mem[..]
    }

    fn mem_mut(&mut self) -> &mut [u8] {
        &mut self.mem[..]
    }

    fn screen_ref(&self, _screen_bank: usize) -> Result<&ScreenArray> {
        Err(ZxMemoryError::UnsupportedAddressRange)
    }

    fn screen_mut(&mut self, _screen_bank: usize) -> Result<&mut ScreenArray> {
        Err(ZxMemoryError::UnsupportedAddressRange)
    }

    fn page_kind(&self, page: u8) -> Result<MemoryKind> {
        match page {
            0 if self.rom_lower_enabled => Ok(MemoryKind::Rom),
            3 if self.rom_upper_enabled => Ok(MemoryKind::Rom),
            0..=3 => Ok(MemoryKind::Ram),
            _ => Err(ZxMemoryError::InvalidPageIndex),
        }
    }

    fn page_bank(&self, page: u8) -> Result<(MemoryKind, usize)> {
        match page {
            0..=3 => {
                if page == 0 && self.rom_lower_enabled {
                    Ok((MemoryKind::Rom, ROM_OS))
                }
                else if page == 3 && self.rom_upper_enabled {
                    Ok((MemoryKind::Rom, self.upper_rom_bank))
                }
                else {
                    Ok((MemoryKind::Ram, self.ram_bank_for_page(page)))
                }
            }
            _ => Err(ZxMemoryError::InvalidPageIndex),
        }
    }

    fn page_ref(&self, page: u8) -> Result<&[u8]> {
        let (kind, bank) = self.page_bank(page)?;
        match kind {
            MemoryKind::Rom => self.rom_bank_ref(bank),
            MemoryKind::Ram => self.ram_bank_ref(bank),
        }
    }

    fn page_mut(&mut self, page: u8) -> Result<&mut [u8]> {
        let (kind, bank) = self.page_bank(page)?;
        match kind {
            MemoryKind::Rom => self.rom_bank_mut(bank),
            MemoryKind::Ram => self.ram_bank_mut(bank),
        }
    }

    fn rom_bank_ref(&self, rom_bank: usize) -> Result<&[u8]> {
        if rom_bank > Self::ROM_BANKS_MAX {
            return Err(ZxMemoryError::InvalidBankIndex);
        }
        let start = rom_bank * PAGE_SIZE;
        Ok(&self.mem[start..start + PAGE_SIZE])
    }

    fn rom_bank_mut(&mut self, rom_bank: usize) -> Result<&mut [u8]> {
        if rom_bank > Self::ROM_BANKS_MAX {
            return Err(ZxMemoryError::InvalidBankIndex);
        }
        let start = rom_bank * PAGE_SIZE;
        Ok(&mut self.mem[start..start + PAGE_SIZE])
    }

    fn ram_bank_ref(&self, ram_bank: usize) -> Result<&[u8]> {
        if ram_bank > Self::RAM_BANKS_MAX {
            return Err(ZxMemoryError::InvalidBankIndex);
        }
        let start = ROM_SIZE + ram_bank * PAGE_SIZE;
        Ok(&self.mem[start..start + PAGE_SIZE])
    }

    fn ram_bank_mut(&mut self, ram_bank: usize) -> Result<&mut [u8]> {
        if ram_bank > Self::RAM_BANKS_MAX {
            return Err(ZxMemoryError::InvalidBankIndex);
        }
        let start = ROM_SIZE + ram_bank * PAGE_SIZE;
        Ok(&mut self.mem[start..start + PAGE_SIZE])
    }

    fn map_rom_bank(&mut self, rom_bank: usize, page: u8) -> Result<()> {
        if rom_bank > Self::ROM_BANKS_MAX {
            return Err(ZxMemoryError::InvalidBankIndex);
        }
        match page {
            0 => { self.rom_lower_enabled = true; Ok(()) }
            3 => { self.rom_upper_enabled = true; self.upper_rom_bank = rom_bank; Ok(()) }
            _ => Err(ZxMemoryError::InvalidPageIndex),
        }
    }

    fn map_ram_bank(&mut self, ram_bank: usize, page: u8) -> Result<()> {
        if ram_bank > Self::RAM_BANKS_MAX {
            return Err(ZxMemoryError::InvalidBankIndex);
        }
        match page {
            0..=3 => {
                self.ram_override[page as usize] = Some(ram_bank);
                match page {
                    0 => self.rom_lower_enabled = false,
                    3 => self.rom_upper_enabled = false,
                    _ => {}
                }
                Ok(())
            }
            _ => Err(ZxMemoryError::InvalidPageIndex),
        }
    }
}

#[cfg(feature = "snapshot")]
mod serde_big_array_impl {
    use serde::{Serializer, Deserializer, Deserialize};
    use serde::de::Error;

    pub fn serialize<S: Serializer>(data: &Box<[u8; super::MEM_SIZE]>, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_bytes(&data[..])
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Box<[u8; super::MEM_SIZE]>, D::Error> {
        let bytes: Vec<u8> = Vec::deserialize(de)?;
        if bytes.len() != super::MEM_SIZE {
            return Err(D::Error::custom("unexpected CPC memory image size"));
        }
        let mut arr = Box::new([0u8; super::MEM_SIZE]);
        arr.copy_from_slice(&bytes);
        Ok(arr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_maps_os_rom_and_basic() {
        let mem = CpcMemory::default();
        assert_eq!(mem.page_kind(0).unwrap(), MemoryKind::Rom);
        assert_eq!(mem.page_bank(0).unwrap(), (MemoryKind::Rom, ROM_OS));
        assert_eq!(mem.page_kind(3).unwrap(), MemoryKind::Rom);
        assert_eq!(mem.page_bank(3).unwrap(), (MemoryKind::Rom, ROM_BASIC));
        assert_eq!(mem.page_kind(1).unwrap(), MemoryKind::Ram);
        assert_eq!(mem.page_kind(2).unwrap(), MemoryKind::Ram);
    }

    #[test]
    fn ram_config_selects_bank_table() {
        let mut mem = CpcMemory::default();
        mem.set_rom_enable(false, false);
        mem.select_ram(2);
        assert_eq!(mem.page_bank(0).unwrap(), (MemoryKind::Ram, 4));
        assert_eq!(mem.page_bank(1).unwrap(), (MemoryKind::Ram, 5));
        assert_eq!(mem.page_bank(2).unwrap(), (MemoryKind::Ram, 6));
        assert_eq!(mem.page_bank(3).unwrap(), (MemoryKind::Ram, 7));
    }

    #[test]
    fn select_rom_switches_upper_rom_bank() {
        let mut mem = CpcMemory::default();
        mem.select_rom(7);
        assert_eq!(mem.page_bank(3).unwrap(), (MemoryKind::Rom, ROM_AMSDOS));
        mem.select_rom(0);
        assert_eq!(mem.page_bank(3).unwrap(), (MemoryKind::Rom, ROM_BASIC));
    }

    #[test]
    fn rom_is_read_only() {
        let mut mem = CpcMemory::default();
        mem.write(0x0000, 0xAB);
        assert_ne!(mem.read(0x0000), 0xAB);
        mem.write(0x4000, 0xAB);
        assert_eq!(mem.read(0x4000), 0xAB);
    }
}

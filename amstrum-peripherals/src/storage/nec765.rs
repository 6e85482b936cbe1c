/*
    Copyright (C) 2020-2022  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! A [BusDevice] for the **NEC 765/uPD765** floppy disc controller, as wired on the
//! Amstrad CPC (and +3 Spectrum) `FDC 1772`-compatible disc interface.
//!
//! Unlike the WD1793, the uPD765 is phase-driven: the Z80 shifts a variable-length
//! command into the data register one byte at a time, the controller then executes it
//! and makes a result phase byte sequence available, all gated by the Main Status
//! Register's `RQM`/`DIO` bits.
use core::fmt;
use core::num::NonZeroU16;

#[cfg(feature = "snapshot")]
use serde::{Serialize, Deserialize};

use amstrum_core::bus::{BusDevice, PortAddress};

use super::disk::{FloppyDrive, FloppyImage, SectorId};
use crate::bus::ay::PassByAyAudioBusDevice;

/// The CPC wires the uPD765's Main Status Register and Data register on adjacent I/O
/// addresses, decoded on bits A8 (FDC chip select) and A0 (register select); other
/// address bits are open and ignored by the real hardware's incomplete decode.
#[derive(Clone, Copy, Default, Debug)]
pub struct Nec765PortAddress;
impl PortAddress for Nec765PortAddress {
    const ADDRESS_MASK: u16 = 0x0100;
    const ADDRESS_BITS: u16 = 0x0100;
}

const REG_MAIN_STATUS: u16 = 0x0100;
const REG_DATA: u16 = 0x0101;

bitflags! {
    #[derive(Default)]
    pub struct MainStatus: u8 {
        const DRIVE0_BUSY = 0b0000_0001;
        const DRIVE1_BUSY = 0b0000_0010;
        const DRIVE2_BUSY = 0b0000_0100;
        const DRIVE3_BUSY = 0b0000_1000;
        const CMD_BUSY    = 0b0001_0000;
        const NON_DMA     = 0b0010_0000;
        const DIO         = 0b0100_0000; // 1 = FDC->CPU (read)
        const RQM         = 0b1000_0000; // 1 = data register ready
    }
}

bitflags! {
    #[derive(Default)]
    pub struct St0: u8 {
        const DS0      = 0b0000_0001;
        const DS1      = 0b0000_0010;
        const HEAD     = 0b0000_0100;
        const NOT_READY = 0b0000_1000;
        const EQUIP_CHECK = 0b0001_0000;
        const SEEK_END = 0b0010_0000;
        const IC0      = 0b0100_0000;
        const IC1      = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct St1: u8 {
        const MISSING_ADDR_MARK = 0b0000_0001;
        const NOT_WRITABLE      = 0b0000_0010;
        const NO_DATA           = 0b0000_0100;
        const OVERRUN           = 0b0001_0000;
        const DATA_ERROR        = 0b0010_0000;
        const END_OF_CYLINDER   = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Default)]
    pub struct St2: u8 {
        const MISSING_DATA_MARK = 0b0000_0001;
        const BAD_CYLINDER      = 0b0000_0010;
        const SCAN_NOT_SATISFIED = 0b0000_0100;
        const SCAN_EQUAL_HIT    = 0b0000_1000;
        const WRONG_CYLINDER    = 0b0001_0000;
        const DATA_ERROR_IN_DATA_FIELD = 0b0010_0000;
        const CONTROL_MARK      = 0b0100_0000;
    }
}

/// One of the commands the uPD765's command decoder recognizes, keyed by its opcode's
/// low 5 bits (MT/MFM/SK modifier bits are masked off during dispatch).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Command {
    ReadData, WriteData, ReadId, FormatTrack,
    Recalibrate, SenseInterruptStatus, Specify, SenseDriveStatus,
    Seek, ScanEqual, ScanLowOrEqual, ScanHighOrEqual, ReadDeletedData, WriteDeletedData,
    Invalid,
}

impl Command {
    fn decode(opcode: u8) -> Self {
        use Command::*;
        match opcode & 0x1f {
            0x06 => ReadData,
            0x05 => WriteData,
            0x0a => ReadId,
            0x0d => FormatTrack,
            0x07 => Recalibrate,
            0x08 => SenseInterruptStatus,
            0x03 => Specify,
            0x04 => SenseDriveStatus,
            0x0f => Seek,
            0x11 => ScanEqual,
            0x19 => ScanLowOrEqual,
            0x1d => ScanHighOrEqual,
            0x0c => ReadDeletedData,
            0x09 => WriteDeletedData,
            _ => Invalid,
        }
    }
    /// Length of the command's argument phase in bytes, including the opcode byte itself.
    fn command_len(self) -> usize {
        use Command::*;
        match self {
            ReadData | WriteData | ReadDeletedData | WriteDeletedData
                | ScanEqual | ScanLowOrEqual | ScanHighOrEqual => 9,
            ReadId => 2,
            FormatTrack => 6,
            Recalibrate => 2,
            SenseInterruptStatus => 1,
            Specify => 3,
            SenseDriveStatus => 2,
            Seek => 3,
            Invalid => 1,
        }
    }
}

#[derive(Clone, Debug)]
enum Phase {
    CommandIdle,
    Command { opcode_buf: Vec<u8>, expect_len: usize },
    Execution { cmd: Command, args: Vec<u8>, data: Vec<u8>, index: usize, write: bool },
    Result { bytes: Vec<u8>, index: usize },
}

impl Default for Phase {
    fn default() -> Self { Phase::CommandIdle }
}

/// An NEC 765 (uPD765) floppy disc controller emulator, connected as a [BusDevice].
#[cfg_attr(feature = "snapshot", derive(Serialize, Deserialize))]
#[derive(Clone, Default)]
pub struct Nec765BusDevice<D> {
    #[cfg_attr(feature = "snapshot", serde(skip))]
    drives: [FloppyDrive; 4],
    st0: u8,
    pcn: [u8; 4],
    seek_end: [bool; 4],
    #[cfg_attr(feature = "snapshot", serde(skip))]
    phase: Phase,
    #[cfg_attr(feature = "snapshot", serde(default))]
    bus: D,
}

impl<D> fmt::Debug for Nec765BusDevice<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Nec765BusDevice").field("phase", &self.phase).finish()
    }
}

impl<D> fmt::Display for Nec765BusDevice<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NEC765 / uPD765 FDC")
    }
}

impl<D> PassByAyAudioBusDevice for Nec765BusDevice<D> {}

impl<D> Nec765BusDevice<D> {
    pub fn drive_mut(&mut self, index: usize) -> &mut FloppyDrive {
        &mut self.drives[index]
    }

    fn main_status(&self) -> u8 {
        let mut ms = MainStatus::RQM;
        match &self.phase {
            Phase::CommandIdle => {}
            Phase::Command { .. } => {}
            Phase::Execution { write: false, .. } | Phase::Result { .. } => ms |= MainStatus::DIO,
            Phase::Execution { write: true, .. } => {}
        }
        if !matches!(self.phase, Phase::CommandIdle) {
            ms |= MainStatus::CMD_BUSY;
        }
        ms.bits()
    }

    fn locate_sector(&self, unit: usize, head: u8, sector: u8) -> Option<(SectorId, usize)> {
        let drive = &self.drives[unit];
        let image = drive.image.as_ref()?;
        let track = image.track(head, drive.cylinder).ok()?;
        track.sectors.iter().position(|s| s.id.sector == sector)
            .map(|idx| (track.sectors[idx].id, idx))
    }

    /// Returns the ID field of the first sector recorded on the track under `head` at the
    /// drive's current cylinder — the sector a real uPD765 would report for `READ ID`,
    /// since it answers with whatever ID field passes under the head next rather than
    /// tracking which sector number software last asked for.
    fn first_sector_under_head(&self, unit: usize, head: u8) -> Option<SectorId> {
        let drive = &self.drives[unit];
        let image = drive.image.as_ref()?;
        let track = image.track(head, drive.cylinder).ok()?;
        track.sectors.first().map(|s| s.id)
    }

    fn write_result_for_rw(&mut self, unit: usize, head: u8, cyl: u8, sector: u8, ok: bool) {
        let st0 = (unit as u8 & 3) | if head != 0 { St0::HEAD.bits() } else { 0 };
        let (st1, st2) = if ok { (0, 0) } else { (St1::NO_DATA.bits(), 0) };
        self.phase = Phase::Result {
            bytes: vec![st0, st1, st2, cyl, head, sector, 2],
            index: 0,
        };
    }

    fn dispatch(&mut self, opcode_buf: Vec<u8>) {
        let opcode = opcode_buf[0];
        let cmd = Command::decode(opcode);
        let unit = (opcode_buf.get(1).copied().unwrap_or(0) & 3) as usize;
        let head = (opcode_buf.get(1).copied().unwrap_or(0) >> 2) & 1;
        match cmd {
            Command::Specify => {
                self.phase = Phase::CommandIdle;
            }
            Command::SenseDriveStatus => {
                let drive = &self.drives[unit];
                let mut st3 = unit as u8 & 3;
                if head != 0 { st3 |= St0::HEAD.bits(); }
                if drive.is_track_00() { st3 |= 0b0001_0000; }
                if drive.image.as_ref().map_or(true, |i| i.write_protect) { st3 |= 0b0100_0000; }
                if drive.image.is_some() { st3 |= 0b0010_0000; } // READY
                self.phase = Phase::Result { bytes: vec![st3], index: 0 };
            }
            Command::Recalibrate => {
                self.drives[unit].cylinder = 0;
                self.pcn[unit] = 0;
                self.seek_end[unit] = true;
                self.st0 = (unit as u8 & 3) | St0::SEEK_END.bits();
                self.phase = Phase::CommandIdle;
            }
            Command::Seek => {
                let target = opcode_buf.get(2).copied().unwrap_or(0);
                self.drives[unit].cylinder = target;
                self.pcn[unit] = target;
                self.seek_end[unit] = true;
                self.st0 = (unit as u8 & 3) | St0::SEEK_END.bits();
                self.phase = Phase::CommandIdle;
            }
            Command::SenseInterruptStatus => {
                let idx = self.seek_end.iter().position(|&s| s).unwrap_or(0);
                let st0 = self.st0;
                self.seek_end = [false; 4];
                self.phase = Phase::Result { bytes: vec![st0, self.pcn[idx]], index: 0 };
            }
            Command::ReadId => {
                let cyl = self.drives[unit].cylinder;
                let st0 = unit as u8 & 3;
                match self.first_sector_under_head(unit, head) {
                    Some(id) => {
                        self.phase = Phase::Result {
                            bytes: vec![st0, 0, 0, id.cylinder, id.head, id.sector, id.size_code],
                            index: 0,
                        };
                    }
                    None => {
                        self.phase = Phase::Result {
                            bytes: vec![st0 | St0::IC0.bits(), St1::MISSING_ADDR_MARK.bits(), 0, cyl, head, 0, 0],
                            index: 0,
                        };
                    }
                }
            }
            Command::ReadData | Command::ReadDeletedData => {
                let cyl = opcode_buf.get(2).copied().unwrap_or(0);
                let sector = opcode_buf.get(4).copied().unwrap_or(1);
                if let Some((id, _)) = self.locate_sector(unit, head, sector) {
                    let data = self.drives[unit].image.as_ref()
                        .and_then(|img| img.track(head, cyl).ok())
                        .and_then(|t| t.sector(sector))
                        .map(|s| s.data.clone())
                        .unwrap_or_else(|| vec![0u8; id.size()]);
                    self.phase = Phase::Execution {
                        cmd, args: opcode_buf, data, index: 0, write: false,
                    };
                } else {
                    self.write_result_for_rw(unit, head, cyl, sector, false);
                }
            }
            Command::WriteData | Command::WriteDeletedData => {
                let id = self.locate_sector(unit, head, opcode_buf.get(4).copied().unwrap_or(1))
                    .map(|(id, _)| id)
                    .unwrap_or(SectorId { cylinder: 0, head, sector: 1, size_code: 2 });
                self.phase = Phase::Execution {
                    cmd, args: opcode_buf, data: vec![0u8; id.size()], index: 0, write: true,
                };
            }
            Command::FormatTrack => {
                self.phase = Phase::Result { bytes: vec![unit as u8 & 3, 0, 0, 0, 0, 0, 0], index: 0 };
            }
            _ => {
                self.phase = Phase::Result { bytes: vec![0x80], index: 0 };
            }
        }
    }

    fn finish_transfer(&mut self, unit: usize, head: u8, cyl: u8, sector: u8, write: bool, data: Vec<u8>) {
        if write {
            if let Some(image) = self.drives[unit].image.as_mut() {
                if let Ok(track) = image.track_mut(head, cyl) {
                    if let Some(s) = track.sector_mut(sector) {
                        s.data = data;
                    }
                }
            }
        }
        self.write_result_for_rw(unit, head, cyl, sector, true);
    }
}

impl<D> BusDevice for Nec765BusDevice<D>
    where D: BusDevice
{
    type Timestamp = D::Timestamp;
    type NextDevice = D;

    #[inline]
    fn next_device_mut(&mut self) -> &mut Self::NextDevice { &mut self.bus }
    #[inline]
    fn next_device_ref(&self) -> &Self::NextDevice { &self.bus }
    #[inline]
    fn into_next_device(self) -> Self::NextDevice { self.bus }

    fn reset(&mut self, timestamp: Self::Timestamp) {
        self.phase = Phase::CommandIdle;
        self.st0 = 0;
        self.bus.reset(timestamp)
    }

    fn read_io(&mut self, port: u16, timestamp: Self::Timestamp) -> Option<(u8, Option<NonZeroU16>)> {
        if !Nec765PortAddress::match_port(port) {
            return self.bus.read_io(port, timestamp);
        }
        // This port range is exclusively decoded by the FDC chip select (CPC's A8 line);
        // no other device on the chain is ever wired to it, so the FDC's own byte is
        // returned outright instead of being merged with whatever an unrelated downstream
        // device happens to answer.
        let data = match port & 0x0101 {
            REG_MAIN_STATUS => self.main_status(),
            REG_DATA => match &mut self.phase {
                Phase::Execution { cmd, args, data, index, write: false } => {
                    let byte = data[*index];
                    *index += 1;
                    if *index >= data.len() {
                        let unit = (args.get(1).copied().unwrap_or(0) & 3) as usize;
                        let head = (args.get(1).copied().unwrap_or(0) >> 2) & 1;
                        let cyl = args.get(2).copied().unwrap_or(0);
                        let sector = args.get(4).copied().unwrap_or(1);
                        let _ = cmd;
                        self.finish_transfer(unit, head, cyl, sector, false, Vec::new());
                    }
                    byte
                }
                Phase::Result { bytes, index } => {
                    let byte = bytes[*index];
                    *index += 1;
                    if *index >= bytes.len() {
                        self.phase = Phase::CommandIdle;
                    }
                    byte
                }
                _ => 0xff,
            },
            _ => return self.bus.read_io(port, timestamp),
        };
        Some((data, None))
    }

    fn write_io(&mut self, port: u16, data: u8, timestamp: Self::Timestamp) -> Option<u16> {
        if Nec765PortAddress::match_port(port) && port & 0x0101 == REG_DATA {
            match &mut self.phase {
                Phase::CommandIdle => {
                    let expect_len = Command::decode(data).command_len();
                    if expect_len <= 1 {
                        self.dispatch(vec![data]);
                    } else {
                        self.phase = Phase::Command { opcode_buf: vec![data], expect_len };
                    }
                }
                Phase::Command { opcode_buf, expect_len } => {
                    opcode_buf.push(data);
                    if opcode_buf.len() >= *expect_len {
                        let buf = core::mem::take(opcode_buf);
                        self.dispatch(buf);
                    }
                }
                Phase::Execution { cmd, args, data: buf, index, write: true } => {
                    buf[*index] = data;
                    *index += 1;
                    if *index >= buf.len() {
                        let unit = (args.get(1).copied().unwrap_or(0) & 3) as usize;
                        let head = (args.get(1).copied().unwrap_or(0) >> 2) & 1;
                        let cyl = args.get(2).copied().unwrap_or(0);
                        let sector = args.get(4).copied().unwrap_or(1);
                        let _ = cmd;
                        let bytes = core::mem::take(buf);
                        self.finish_transfer(unit, head, cyl, sector, true, bytes);
                    }
                }
                _ => {}
            }
            return Some(0);
        }
        self.bus.write_io(port, data, timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amstrum_core::bus::NullDevice;
    use super::super::disk::Track;

    type TestFdc = Nec765BusDevice<NullDevice<()>>;

    fn image_with_sector(data: &[u8]) -> FloppyImage {
        let mut image = FloppyImage::new(1, 40);
        let mut track = Track::default();
        track.sectors.push(super::super::disk::SectorData {
            id: SectorId { cylinder: 0, head: 0, sector: 1, size_code: 2 },
            data: data.to_vec(),
            deleted: false,
            crc_error: false,
        });
        image.set_track(0, 0, track).unwrap();
        image
    }

    #[test]
    fn sense_drive_status_reports_not_ready_without_a_disk() {
        let mut fdc: TestFdc = Default::default();
        fdc.write_io(REG_DATA, 0x04, ());
        fdc.write_io(REG_DATA, 0, ());
        assert!(matches!(fdc.phase, Phase::Result { .. }));
        let (status, _) = fdc.read_io(REG_DATA, ()).unwrap();
        assert_eq!(status & 0b0010_0000, 0);
    }

    #[test]
    fn read_data_returns_sector_bytes() {
        let mut fdc: TestFdc = Default::default();
        fdc.drive_mut(0).insert(image_with_sector(&[1, 2, 3, 4]));
        let cmd = [0x06u8, 0x00, 0x00, 0x00, 0x01, 0x02, 0xff, 0xff, 0x00];
        for &b in &cmd {
            fdc.write_io(REG_DATA, b, ());
        }
        let mut out = Vec::new();
        for _ in 0..512 {
            let (byte, _) = fdc.read_io(REG_DATA, ()).unwrap();
            out.push(byte);
            if !matches!(fdc.phase, Phase::Execution { .. }) {
                break;
            }
        }
        assert_eq!(&out[..4], &[1, 2, 3, 4]);
    }
}

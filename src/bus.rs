/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! System bus device emulators to be used with [ControlUnit][crate::chip::ControlUnit]s.
// pub mod ay;
// mod dynbus;
// pub mod debug;
// pub mod joystick;
// pub mod mouse;
// pub mod zxinterface1;
// pub mod zxprinter;

// use crate::clock::{FTs, VFrameTsCounter, VideoTs};
// use crate::memory::ZxMemory;

// pub use amstrum_peripherals::bus::*;
pub use amstrum_core::bus::*;
#[cfg(feature = "peripherals")] pub use crate::peripherals::bus::*;

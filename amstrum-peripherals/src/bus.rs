/*
    Copyright (C) 2020  Rafal Michalski

    This file is part of AMSTRUM, a Rust library for building emulators.

    For the full copyright notice, see the lib.rs file.
*/
//! System bus device emulators to be used with [ControlUnit][amstrum_core::chip::ControlUnit]s.
pub mod ay;
pub mod debug;
pub mod joystick;
pub mod mouse;
pub mod parallel;
pub mod zxinterface1;
pub mod zxprinter;

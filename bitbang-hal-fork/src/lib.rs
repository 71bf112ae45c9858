//! Bit-banged bus implementations on top of `embedded-hal` 1.0 pins.
//!
//! Only SPI is carried in this fork. The bus does not own a chip-select
//! line, so several devices can share it and each driver toggles its own.

#![no_std]

pub mod spi;

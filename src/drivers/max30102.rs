//! MAX30102 pulse-oximetry front end.
//!
//! Blocking driver over any [`embedded_hal::i2c::I2c`] bus.  Configures
//! SpO2 mode (red + IR LEDs) at 100 sps with 4-sample on-chip averaging,
//! which yields 25 paired samples per second through a 32-deep FIFO.
//!
//! ```text
//!  FIFO_DATA, one sample = 6 bytes:
//!  ┌────────┬────────┬────────┬────────┬────────┬────────┐
//!  │ RED[23:16]      RED[7:0] │ IR[23:16]        IR[7:0] │
//!  └────────┴────────┴────────┴────────┴────────┴────────┘
//!  only the low 18 bits of each channel are meaningful
//! ```

use embedded_hal::i2c::I2c;
use log::{debug, info};

use crate::app::ports::SensorPort;
use crate::error::SensorError;
use crate::sensors::RawSample;

/// 7-bit bus address (fixed in silicon).
pub const DEFAULT_ADDRESS: u8 = 0x57;

const EXPECTED_PART_ID: u8 = 0x15;
const FIFO_DEPTH: u8 = 32;
const SAMPLE_BYTES: usize = 6;
const CHANNEL_MASK: u32 = 0x3_FFFF;
/// Register polls allowed while waiting for a soft reset to finish.
const RESET_POLLS: u8 = 100;

mod reg {
    pub const FIFO_WR_PTR: u8 = 0x04;
    pub const OVF_COUNTER: u8 = 0x05;
    pub const FIFO_RD_PTR: u8 = 0x06;
    pub const FIFO_DATA: u8 = 0x07;
    pub const FIFO_CONFIG: u8 = 0x08;
    pub const MODE_CONFIG: u8 = 0x09;
    pub const SPO2_CONFIG: u8 = 0x0A;
    pub const LED1_PA: u8 = 0x0C;
    pub const LED2_PA: u8 = 0x0D;
    pub const PART_ID: u8 = 0xFF;
}

mod bits {
    pub const MODE_RESET: u8 = 0x40;
    pub const MODE_SPO2: u8 = 0x03;
    /// SMP_AVE = 4, FIFO rollover enabled.
    pub const FIFO_AVG4_ROLLOVER: u8 = 0x50;
    /// ADC range 4096 nA, 100 sps, 411 µs pulse (18-bit).
    pub const SPO2_4096_100SPS_18BIT: u8 = 0x27;
    /// Roughly 12 mA per LED.
    pub const LED_CURRENT: u8 = 0x3C;
}

pub struct Max30102<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Max30102<I> {
    pub fn new(i2c: I, address: u8) -> Self {
        Self { i2c, address }
    }

    /// Give the bus back.
    pub fn release(self) -> I {
        self.i2c
    }

    fn write_reg(&mut self, reg: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.address, &[reg, value])
            .map_err(|_| SensorError::Bus)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8];
        self.i2c
            .write_read(self.address, &[reg], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(buf[0])
    }

    pub fn part_id(&mut self) -> Result<u8, SensorError> {
        self.read_reg(reg::PART_ID)
    }

    /// Soft reset, then SpO2 mode with the FIFO emptied.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.write_reg(reg::MODE_CONFIG, bits::MODE_RESET)?;
        let mut polls = 0;
        while self.read_reg(reg::MODE_CONFIG)? & bits::MODE_RESET != 0 {
            polls += 1;
            if polls >= RESET_POLLS {
                return Err(SensorError::NotFound);
            }
        }

        self.write_reg(reg::FIFO_WR_PTR, 0)?;
        self.write_reg(reg::OVF_COUNTER, 0)?;
        self.write_reg(reg::FIFO_RD_PTR, 0)?;
        self.write_reg(reg::FIFO_CONFIG, bits::FIFO_AVG4_ROLLOVER)?;
        self.write_reg(reg::SPO2_CONFIG, bits::SPO2_4096_100SPS_18BIT)?;
        self.write_reg(reg::LED1_PA, bits::LED_CURRENT)?;
        self.write_reg(reg::LED2_PA, bits::LED_CURRENT)?;
        self.write_reg(reg::MODE_CONFIG, bits::MODE_SPO2)?;
        debug!("MAX30102: SpO2 mode, 25 sps effective");
        Ok(())
    }

    /// Samples waiting in the FIFO.
    pub fn available(&mut self) -> Result<u8, SensorError> {
        let wr = self.read_reg(reg::FIFO_WR_PTR)?;
        let rd = self.read_reg(reg::FIFO_RD_PTR)?;
        Ok(wr.wrapping_sub(rd) % FIFO_DEPTH)
    }

    /// Pop one sample off the FIFO.  Only call when [`available`](Self::available) > 0.
    pub fn read_fifo_sample(&mut self) -> Result<RawSample, SensorError> {
        let mut buf = [0u8; SAMPLE_BYTES];
        self.i2c
            .write_read(self.address, &[reg::FIFO_DATA], &mut buf)
            .map_err(|_| SensorError::Bus)?;
        Ok(decode_sample(&buf))
    }
}

fn decode_sample(buf: &[u8; SAMPLE_BYTES]) -> RawSample {
    let channel = |b: &[u8]| {
        (u32::from(b[0]) << 16 | u32::from(b[1]) << 8 | u32::from(b[2])) & CHANNEL_MASK
    };
    RawSample {
        red: channel(&buf[0..3]),
        ir: channel(&buf[3..6]),
    }
}

impl<I: I2c> SensorPort for Max30102<I> {
    fn probe(&mut self) -> Result<(), SensorError> {
        let id = self.part_id().map_err(|_| SensorError::NotFound)?;
        if id != EXPECTED_PART_ID {
            return Err(SensorError::NotFound);
        }
        self.init()?;
        info!("MAX30102: found at 0x{:02x}", self.address);
        Ok(())
    }

    fn poll_sample(&mut self) -> Result<Option<RawSample>, SensorError> {
        if self.available()? == 0 {
            return Ok(None);
        }
        self.read_fifo_sample().map(Some)
    }

    /// Drains the FIFO and reports the newest IR value.
    fn ir_level(&mut self) -> Result<u32, SensorError> {
        let mut newest = RawSample::default();
        for _ in 0..self.available()? {
            newest = self.read_fifo_sample()?;
        }
        Ok(newest.ir)
    }
}

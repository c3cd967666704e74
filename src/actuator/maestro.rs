//! maestro.rs
//! Pololu Maestro servo controller over a serial port.
//!
//! Wire format (Pololu protocol): `0xAA, device, command & 0x7F, args...`.
//! - Targets/speeds/accels are 14-bit values sent as two 7-bit bytes, low first.
//! - Get-position replies with two bytes, low first.
//! - Get-moving-state replies with one byte, non-zero while anything moves.
//!
//! Travel ranges are not stored on the device; they are enforced here by
//! clamping each target before it is written.

use log::{debug, info};
use serialport::SerialPort;
use std::{
    io::{Read, Write},
    time::Duration,
};

use crate::actuator::driver::ServoBus;
use crate::utils::config::SerialConfig;
use crate::utils::error::{BusError, RobotError};

const POLOLU_START: u8 = 0xAA;
const CMD_SET_TARGET: u8 = 0x04;
const CMD_SET_SPEED: u8 = 0x07;
const CMD_SET_ACCEL: u8 = 0x09;
const CMD_GET_POSITION: u8 = 0x10;
const CMD_GET_MOVING_STATE: u8 = 0x13;

/// Largest Maestro model (Mini Maestro 24).
pub const MAX_CHANNELS: usize = 24;

pub struct MaestroController<P = Box<dyn SerialPort>> {
    port: Option<P>,
    device: u8,
    // Last commanded target per channel; 0 = never commanded.
    targets: [u16; MAX_CHANNELS],
    ranges: [Option<(u16, u16)>; MAX_CHANNELS],
}

impl MaestroController<Box<dyn SerialPort>> {
    /// Opens the serial port. Failure here is a startup failure.
    pub fn connect(config: &SerialConfig) -> Result<Self, RobotError> {
        let port = serialport::new(&config.port, config.baud)
            .timeout(Duration::from_millis(config.timeout_ms))
            .open()
            .map_err(|e| RobotError::Connection {
                port: config.port.clone(),
                reason: e.to_string(),
            })?;

        info!("Maestro connected on {} (device {:#04x})", config.port, config.device);
        Ok(Self::with_port(port, config.device))
    }
}

impl<P: Read + Write + Send> MaestroController<P> {
    pub fn with_port(port: P, device: u8) -> Self {
        Self {
            port: Some(port),
            device,
            targets: [0; MAX_CHANNELS],
            ranges: [None; MAX_CHANNELS],
        }
    }

    fn slot(channel: u8) -> Result<usize, BusError> {
        let idx = channel as usize;
        if idx < MAX_CHANNELS { Ok(idx) } else { Err(BusError::InvalidChannel(channel)) }
    }

    fn send(&mut self, command: u8, args: &[u8]) -> Result<(), BusError> {
        let port = self.port.as_mut().ok_or(BusError::Closed)?;
        let mut frame = Vec::with_capacity(3 + args.len());
        frame.extend_from_slice(&[POLOLU_START, self.device, command & 0x7F]);
        frame.extend_from_slice(args);
        port.write_all(&frame)?;
        port.flush()?;
        Ok(())
    }

    fn read_reply<const N: usize>(&mut self) -> Result<[u8; N], BusError> {
        let port = self.port.as_mut().ok_or(BusError::Closed)?;
        let mut buf = [0u8; N];
        let mut got = 0;
        while got < N {
            match port.read(&mut buf[got..])? {
                0 => return Err(BusError::ShortReply { expected: N, got }),
                n => got += n,
            }
        }
        Ok(buf)
    }

    fn send_14bit(&mut self, command: u8, channel: u8, value: u16) -> Result<(), BusError> {
        let lsb = (value & 0x7F) as u8;
        let msb = ((value >> 7) & 0x7F) as u8;
        self.send(command, &[channel, lsb, msb])
    }
}

impl<P: Read + Write + Send> ServoBus for MaestroController<P> {
    fn set_target(&mut self, channel: u8, target: u16) -> Result<(), BusError> {
        let idx = Self::slot(channel)?;
        let target = match self.ranges[idx] {
            Some((min, max)) => target.clamp(min, max),
            None => target,
        };
        self.send_14bit(CMD_SET_TARGET, channel, target)?;
        self.targets[idx] = target;
        Ok(())
    }

    fn set_speed(&mut self, channel: u8, speed: u16) -> Result<(), BusError> {
        Self::slot(channel)?;
        self.send_14bit(CMD_SET_SPEED, channel, speed)
    }

    fn set_accel(&mut self, channel: u8, accel: u16) -> Result<(), BusError> {
        Self::slot(channel)?;
        self.send_14bit(CMD_SET_ACCEL, channel, accel)
    }

    fn set_range(&mut self, channel: u8, min: u16, max: u16) -> Result<(), BusError> {
        let idx = Self::slot(channel)?;
        self.ranges[idx] = Some((min.min(max), max.max(min)));
        debug!("channel {} range [{}, {}]", channel, min, max);
        Ok(())
    }

    fn get_position(&mut self, channel: u8) -> Result<u16, BusError> {
        Self::slot(channel)?;
        self.send(CMD_GET_POSITION, &[channel])?;
        let [lsb, msb] = self.read_reply::<2>()?;
        Ok(u16::from(lsb) | (u16::from(msb) << 8))
    }

    fn is_moving(&mut self, channel: u8) -> Result<bool, BusError> {
        let idx = Self::slot(channel)?;
        let target = self.targets[idx];
        if target == 0 {
            return Ok(false);
        }
        Ok(self.get_position(channel)? != target)
    }

    fn get_moving_state(&mut self) -> Result<bool, BusError> {
        self.send(CMD_GET_MOVING_STATE, &[])?;
        let [state] = self.read_reply::<1>()?;
        Ok(state != 0)
    }

    fn close(&mut self) -> Result<(), BusError> {
        if let Some(mut port) = self.port.take() {
            port.flush()?;
            info!("Maestro port closed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakePort {
        written: Vec<u8>,
        reply: VecDeque<u8>,
    }

    impl Read for FakePort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.reply.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl Write for FakePort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn controller(reply: &[u8]) -> MaestroController<FakePort> {
        let port = FakePort { written: Vec::new(), reply: reply.iter().copied().collect() };
        MaestroController::with_port(port, 0x0c)
    }

    fn written(ctl: &MaestroController<FakePort>) -> &[u8] {
        &ctl.port.as_ref().unwrap().written
    }

    #[test]
    fn set_target_frames_fourteen_bit_value() {
        let mut ctl = controller(&[]);
        ctl.set_target(1, 6000).unwrap();
        // 6000 = 0b101110_1110000 -> lsb 0x70, msb 0x2E
        assert_eq!(written(&ctl), &[0xAA, 0x0c, 0x04, 1, 0x70, 0x2E]);
    }

    #[test]
    fn range_clamps_before_transmission() {
        let mut ctl = controller(&[]);
        ctl.set_range(3, 4000, 8000).unwrap();
        ctl.set_target(3, 9000).unwrap();
        let frame = written(&ctl);
        let value = u16::from(frame[4]) | (u16::from(frame[5]) << 7);
        assert_eq!(value, 8000);
    }

    #[test]
    fn get_position_reads_two_bytes_low_first() {
        let mut ctl = controller(&[0x70, 0x17]);
        assert_eq!(ctl.get_position(4).unwrap(), 0x1770);
        assert_eq!(written(&ctl), &[0xAA, 0x0c, 0x10, 4]);
    }

    #[test]
    fn short_reply_is_an_error() {
        let mut ctl = controller(&[0x70]);
        assert!(matches!(
            ctl.get_position(0),
            Err(BusError::ShortReply { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn is_moving_compares_against_last_target() {
        // 6000 = 0x1770
        let mut ctl = controller(&[0x70, 0x17, 0x00, 0x10]);
        assert!(!ctl.is_moving(2).unwrap());
        ctl.set_target(2, 6000).unwrap();
        assert!(!ctl.is_moving(2).unwrap());
        ctl.set_target(2, 7000).unwrap();
        assert!(ctl.is_moving(2).unwrap());
    }

    #[test]
    fn moving_state_and_close() {
        let mut ctl = controller(&[0x01]);
        assert!(ctl.get_moving_state().unwrap());
        ctl.close().unwrap();
        assert!(matches!(ctl.set_target(0, 6000), Err(BusError::Closed)));
    }

    #[test]
    fn out_of_range_channel_rejected() {
        let mut ctl = controller(&[]);
        assert!(matches!(ctl.set_target(30, 6000), Err(BusError::InvalidChannel(30))));
    }
}

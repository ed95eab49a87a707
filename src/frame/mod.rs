// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use core::fmt;

mod coils;
mod data;

pub use self::{coils::*, data::*};
use crate::util::packed_coils_len;
use byteorder::{BigEndian, ByteOrder};

/// Number of bytes that are always sufficient for a response PDU.
///
/// The Modbus application protocol limits a PDU to 253 bytes.
pub const MAX_PDU_LEN: usize = 253;

/// A Modbus function code served by the processor.
///
/// It is represented by an unsigned 8 bit integer.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionCode {
    /// Modbus Function Code: `01` (`0x01`).
    ReadCoils,

    /// Modbus Function Code: `02` (`0x02`).
    ReadDiscreteInputs,

    /// Modbus Function Code: `03` (`0x03`).
    ReadHoldingRegisters,

    /// Modbus Function Code: `04` (`0x04`).
    ReadInputRegisters,

    /// Modbus Function Code: `05` (`0x05`).
    WriteSingleCoil,

    /// Modbus Function Code: `06` (`0x06`).
    WriteSingleRegister,

    /// Modbus Function Code: `15` (`0x0F`).
    WriteMultipleCoils,

    /// Modbus Function Code: `16` (`0x10`).
    WriteMultipleRegisters,

    /// Modbus Function Code: `22` (`0x16`).
    MaskWriteRegister,

    /// Modbus Function Code: `23` (`0x17`).
    ReadWriteMultipleRegisters,
}

impl FunctionCode {
    /// Look up the [`FunctionCode`] for `value`.
    ///
    /// Returns `None` for codes that are not served.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        let code = match value {
            0x01 => Self::ReadCoils,
            0x02 => Self::ReadDiscreteInputs,
            0x03 => Self::ReadHoldingRegisters,
            0x04 => Self::ReadInputRegisters,
            0x05 => Self::WriteSingleCoil,
            0x06 => Self::WriteSingleRegister,
            0x0F => Self::WriteMultipleCoils,
            0x10 => Self::WriteMultipleRegisters,
            0x16 => Self::MaskWriteRegister,
            0x17 => Self::ReadWriteMultipleRegisters,
            _ => return None,
        };
        Some(code)
    }

    /// Get the [`u8`] value of the current [`FunctionCode`].
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::ReadCoils => 0x01,
            Self::ReadDiscreteInputs => 0x02,
            Self::ReadHoldingRegisters => 0x03,
            Self::ReadInputRegisters => 0x04,
            Self::WriteSingleCoil => 0x05,
            Self::WriteSingleRegister => 0x06,
            Self::WriteMultipleCoils => 0x0F,
            Self::WriteMultipleRegisters => 0x10,
            Self::MaskWriteRegister => 0x16,
            Self::ReadWriteMultipleRegisters => 0x17,
        }
    }

    /// Number of fixed header bytes following the function code.
    ///
    /// Variable length requests carry their byte count as the last header byte.
    #[must_use]
    pub const fn header_len(self) -> usize {
        match self {
            Self::ReadCoils
            | Self::ReadDiscreteInputs
            | Self::ReadHoldingRegisters
            | Self::ReadInputRegisters
            | Self::WriteSingleCoil
            | Self::WriteSingleRegister => 4,
            Self::WriteMultipleCoils | Self::WriteMultipleRegisters => 5,
            Self::MaskWriteRegister => 6,
            Self::ReadWriteMultipleRegisters => 9,
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.value().fmt(f)
    }
}

/// The logical sub-device addressed behind a single endpoint.
pub type UnitId = u8;

/// A Modbus address is represented by 16 bit (from `0` to `65535`).
pub type Address = u16;

/// A Coil represents a single bit.
///
/// - `true` is equivalent to `ON`, `1` and `0xFF00`.
/// - `false` is equivalent to `OFF`, `0` and `0x0000`.
pub type Coil = bool;

/// Modbus uses 16 bit for its data items (big-endian representation).
pub type Word = u16;

/// Number of items to process (`0` - `65535`).
pub type Quantity = u16;

/// Raw PDU data
type RawData<'r> = &'r [u8];

/// A decoded request PDU.
///
/// Multi-item payloads borrow the bytes of the PDU they were decoded from.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request<'r> {
    ReadCoils(Address, Quantity),
    ReadDiscreteInputs(Address, Quantity),
    ReadHoldingRegisters(Address, Quantity),
    ReadInputRegisters(Address, Quantity),
    /// The raw value is kept as received (`0xFF00` or `0x0000` when valid).
    WriteSingleCoil(Address, Word),
    WriteSingleRegister(Address, Word),
    WriteMultipleCoils(Address, Coils<'r>),
    WriteMultipleRegisters(Address, Data<'r>),
    /// Address, AND mask, OR mask
    MaskWriteRegister(Address, Word, Word),
    /// Read address, read quantity, write address, write data
    ReadWriteMultipleRegisters(Address, Quantity, Address, Data<'r>),
}

impl From<Request<'_>> for FunctionCode {
    fn from(r: Request<'_>) -> Self {
        use Request as R;

        match r {
            R::ReadCoils(_, _) => Self::ReadCoils,
            R::ReadDiscreteInputs(_, _) => Self::ReadDiscreteInputs,
            R::ReadHoldingRegisters(_, _) => Self::ReadHoldingRegisters,
            R::ReadInputRegisters(_, _) => Self::ReadInputRegisters,
            R::WriteSingleCoil(_, _) => Self::WriteSingleCoil,
            R::WriteSingleRegister(_, _) => Self::WriteSingleRegister,
            R::WriteMultipleCoils(_, _) => Self::WriteMultipleCoils,
            R::WriteMultipleRegisters(_, _) => Self::WriteMultipleRegisters,
            R::MaskWriteRegister(_, _, _) => Self::MaskWriteRegister,
            R::ReadWriteMultipleRegisters(_, _, _, _) => Self::ReadWriteMultipleRegisters,
        }
    }
}

impl Request<'_> {
    /// Number of bytes of the serialized success response PDU,
    /// including the function code.
    #[must_use]
    pub const fn response_pdu_len(&self) -> usize {
        match *self {
            Self::ReadCoils(_, quantity) | Self::ReadDiscreteInputs(_, quantity) => {
                2 + packed_coils_len(quantity as usize)
            }
            Self::ReadHoldingRegisters(_, quantity)
            | Self::ReadInputRegisters(_, quantity)
            | Self::ReadWriteMultipleRegisters(_, quantity, _, _) => 2 + quantity as usize * 2,
            Self::WriteSingleCoil(_, _)
            | Self::WriteSingleRegister(_, _)
            | Self::WriteMultipleCoils(_, _)
            | Self::WriteMultipleRegisters(_, _) => 5,
            Self::MaskWriteRegister(_, _, _) => 7,
        }
    }
}

/// A server (slave) exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
    ServerDeviceFailure = 0x04,
    Acknowledge = 0x05,
    ServerDeviceBusy = 0x06,
    MemoryParityError = 0x08,
    GatewayPathUnavailable = 0x0A,
    GatewayTargetDevice = 0x0B,
}

impl Exception {
    const fn get_name(self) -> &'static str {
        match self {
            Self::IllegalFunction => "Illegal function",
            Self::IllegalDataAddress => "Illegal data address",
            Self::IllegalDataValue => "Illegal data value",
            Self::ServerDeviceFailure => "Server device failure",
            Self::Acknowledge => "Acknowledge",
            Self::ServerDeviceBusy => "Server device busy",
            Self::MemoryParityError => "Memory parity error",
            Self::GatewayPathUnavailable => "Gateway path unavailable",
            Self::GatewayTargetDevice => "Gateway target device failed to respond",
        }
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.get_name())
    }
}

#[cfg(all(feature = "defmt", target_os = "none"))]
impl defmt::Format for Exception {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{}", self.get_name())
    }
}

/// A server (slave) exception response.
///
/// `function` is the raw function code of the request, which need not be
/// a served [`FunctionCode`].
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExceptionResponse {
    pub function: u8,
    pub exception: Exception,
}

impl ExceptionResponse {
    /// Serialized length of an exception response PDU.
    pub const LEN: usize = 2;

    /// Write the exception frame, returning the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize, crate::Error> {
        if buf.len() < Self::LEN {
            return Err(crate::Error::BufferSize);
        }
        let bytes: [u8; 2] = (*self).into();
        buf[..Self::LEN].copy_from_slice(&bytes);
        Ok(Self::LEN)
    }
}

/// Write `address` and a second word, the echo layout of all write responses.
pub(crate) fn write_echo(buf: &mut [u8], address: Address, word: Word) -> usize {
    BigEndian::write_u16(&mut buf[0..2], address);
    BigEndian::write_u16(&mut buf[2..4], word);
    4
}

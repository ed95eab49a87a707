// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*, util::*};
use byteorder::{BigEndian, ByteOrder};

type Result<T> = core::result::Result<T, Error>;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        [ex.function | 0x80, ex.exception as u8]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ExceptionResponse::LEN {
            return Err(Error::BufferSize);
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = fn_err_code - 0x80;
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl<'r> TryFrom<&'r [u8]> for Request<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        let Some((&fn_code, payload)) = bytes.split_first() else {
            return Err(Error::BufferSize);
        };
        let Some(function) = FunctionCode::new(fn_code) else {
            return Err(Error::FnCode(fn_code));
        };
        Request::decode(function, payload)
    }
}

impl<'r> Request<'r> {
    /// Decode the payload following the function code.
    ///
    /// Every length related inconsistency is reported as a framing error:
    /// a truncated header, a byte count that does not match the quantity,
    /// missing or trailing bytes.
    pub fn decode(function: FunctionCode, payload: &'r [u8]) -> Result<Self> {
        use FunctionCode as f;
        use crate::frame::Request::*;

        let header_len = function.header_len();
        if payload.len() < header_len {
            return Err(Error::BufferSize);
        }
        let (header, tail) = payload.split_at(header_len);
        let word = |idx: usize| BigEndian::read_u16(&header[idx * 2..idx * 2 + 2]);

        let req = match function {
            f::ReadCoils
            | f::ReadDiscreteInputs
            | f::ReadHoldingRegisters
            | f::ReadInputRegisters
            | f::WriteSingleCoil
            | f::WriteSingleRegister
            | f::MaskWriteRegister => {
                expect_empty(header_len, tail)?;
                let addr = word(0);
                let value = word(1);
                match function {
                    f::ReadCoils => ReadCoils(addr, value),
                    f::ReadDiscreteInputs => ReadDiscreteInputs(addr, value),
                    f::ReadHoldingRegisters => ReadHoldingRegisters(addr, value),
                    f::ReadInputRegisters => ReadInputRegisters(addr, value),
                    f::WriteSingleCoil => WriteSingleCoil(addr, value),
                    f::WriteSingleRegister => WriteSingleRegister(addr, value),
                    f::MaskWriteRegister => MaskWriteRegister(addr, value, word(2)),
                    _ => unreachable!(),
                }
            }
            f::WriteMultipleCoils => {
                let address = word(0);
                let quantity = word(1) as usize;
                let byte_count = header[4];
                let data = counted_tail(header_len, byte_count, packed_coils_len(quantity), tail)?;
                WriteMultipleCoils(address, Coils::new(data, quantity)?)
            }
            f::WriteMultipleRegisters => {
                let address = word(0);
                let quantity = word(1) as usize;
                let byte_count = header[4];
                let data = counted_tail(header_len, byte_count, quantity * 2, tail)?;
                WriteMultipleRegisters(address, Data::new(data, quantity)?)
            }
            f::ReadWriteMultipleRegisters => {
                let read_address = word(0);
                let read_quantity = word(1);
                let write_address = word(2);
                let write_quantity = word(3) as usize;
                let write_count = header[8];
                let data = counted_tail(header_len, write_count, write_quantity * 2, tail)?;
                ReadWriteMultipleRegisters(
                    read_address,
                    read_quantity,
                    write_address,
                    Data::new(data, write_quantity)?,
                )
            }
        };
        Ok(req)
    }
}

/// Fixed size requests must not carry any bytes after the header.
fn expect_empty(header_len: usize, tail: &[u8]) -> Result<()> {
    if !tail.is_empty() {
        return Err(Error::LengthMismatch(1 + header_len, 1 + header_len + tail.len()));
    }
    Ok(())
}

/// Validate the byte count of a variable length request against the
/// quantity it announces and the bytes actually present.
fn counted_tail(header_len: usize, byte_count: u8, expected: usize, tail: &[u8]) -> Result<&[u8]> {
    if byte_count as usize != expected {
        return Err(Error::ByteCount(byte_count));
    }
    if tail.len() != expected {
        return Err(Error::LengthMismatch(
            1 + header_len + expected,
            1 + header_len + tail.len(),
        ));
    }
    Ok(tail)
}

// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One handler per served function code.
//!
//! [`validate`] runs before any store access and the output buffer has been
//! sized by the processor, so the handlers only fail on store errors.

use core::slice;

use byteorder::{BigEndian, ByteOrder};

use super::Limits;
use crate::{
    frame::*,
    store::{DataStore, StoreError},
    util::*,
};

type Result<T, E = StoreError> = core::result::Result<T, E>;

/// Check quantities, address ranges, single coil values and that the
/// response fits into [`MAX_PDU_LEN`] bytes.
pub(crate) fn validate(request: &Request<'_>, limits: &Limits) -> Result<(), Exception> {
    use Request as R;

    match *request {
        R::ReadCoils(address, quantity) | R::ReadDiscreteInputs(address, quantity) => {
            check_range(address, quantity as usize, limits.read_bits)?;
        }
        R::ReadHoldingRegisters(address, quantity) | R::ReadInputRegisters(address, quantity) => {
            check_range(address, quantity as usize, limits.read_registers)?;
        }
        R::WriteSingleCoil(_, raw) => {
            u16_coil_to_bool(raw).map_err(|_| Exception::IllegalDataValue)?;
        }
        R::WriteSingleRegister(_, _) | R::MaskWriteRegister(_, _, _) => {}
        R::WriteMultipleCoils(address, coils) => {
            check_range(address, coils.len(), limits.write_coils)?;
        }
        R::WriteMultipleRegisters(address, words) => {
            check_range(address, words.len(), limits.write_registers)?;
        }
        R::ReadWriteMultipleRegisters(read_address, read_quantity, write_address, words) => {
            check_range(write_address, words.len(), limits.read_write_write_registers)?;
            check_range(
                read_address,
                read_quantity as usize,
                limits.read_write_read_registers,
            )?;
        }
    }
    if request.response_pdu_len() > MAX_PDU_LEN {
        return Err(Exception::IllegalDataValue);
    }
    Ok(())
}

/// `quantity` must be within `1..=max` and the last address must not exceed `0xFFFF`.
fn check_range(address: Address, quantity: usize, max: Quantity) -> Result<(), Exception> {
    if quantity == 0 || quantity > max as usize {
        return Err(Exception::IllegalDataValue);
    }
    if address as usize + quantity > usize::from(Address::MAX) + 1 {
        return Err(Exception::IllegalDataAddress);
    }
    Ok(())
}

/// Run a validated request against the store.
///
/// `out` receives the response payload following the function code and is
/// exactly as long as that payload.
pub(crate) fn execute<S>(
    store: &S,
    unit: UnitId,
    request: Request<'_>,
    out: &mut [u8],
) -> Result<usize>
where
    S: DataStore + ?Sized,
{
    use Request as R;

    match request {
        R::ReadCoils(address, quantity) => {
            read_bits(out, address, quantity, |a| store.get_coil(unit, a))
        }
        R::ReadDiscreteInputs(address, quantity) => {
            read_bits(out, address, quantity, |a| store.get_discrete_input(unit, a))
        }
        R::ReadHoldingRegisters(address, quantity) => {
            read_registers(out, address, quantity, |a| store.get_holding_register(unit, a))
        }
        R::ReadInputRegisters(address, quantity) => {
            read_registers(out, address, quantity, |a| store.get_input_register(unit, a))
        }
        R::WriteSingleCoil(address, raw) => {
            store.set_coil(unit, address, raw == bool_to_u16_coil(true))?;
            Ok(write_echo(out, address, raw))
        }
        R::WriteSingleRegister(address, value) => {
            store.set_holding_register(unit, address, value)?;
            Ok(write_echo(out, address, value))
        }
        R::WriteMultipleCoils(address, coils) => {
            write_bits(coils, address, |a, coil| store.set_coil(unit, a, coil))?;
            Ok(write_echo(out, address, coils.len() as Quantity))
        }
        R::WriteMultipleRegisters(address, words) => {
            write_registers(store, unit, address, words)?;
            Ok(write_echo(out, address, words.len() as Quantity))
        }
        R::MaskWriteRegister(address, and_mask, or_mask) => {
            let current = store.get_holding_register(unit, address)?;
            let value = (current & and_mask) | (or_mask & !and_mask);
            store.set_holding_register(unit, address, value)?;
            let len = write_echo(out, address, and_mask);
            BigEndian::write_u16(&mut out[len..len + 2], or_mask);
            Ok(len + 2)
        }
        R::ReadWriteMultipleRegisters(read_address, read_quantity, write_address, words) => {
            write_registers(store, unit, write_address, words)?;
            read_registers(out, read_address, read_quantity, |a| {
                store.get_holding_register(unit, a)
            })
        }
    }
}

fn write_bits<F>(coils: Coils<'_>, address: Address, mut write: F) -> Result<()>
where
    F: FnMut(Address, Coil) -> Result<()>,
{
    let quantity = coils.len();
    let mut bits = [false; 8];
    for (n, byte) in coils.data[..coils.packed_len()].iter().enumerate() {
        let start = n * 8;
        let len = (quantity - start).min(8);
        let unpacked = unpack_coils(slice::from_ref(byte), len as Quantity, &mut bits);
        debug_assert_eq!(unpacked, Ok(()));
        for (i, bit) in bits[..len].iter().enumerate() {
            write(address + (start + i) as Address, *bit)?;
        }
    }
    Ok(())
}

fn write_registers<S>(store: &S, unit: UnitId, address: Address, words: Data<'_>) -> Result<()>
where
    S: DataStore + ?Sized,
{
    for (i, word) in words.into_iter().enumerate() {
        store.set_holding_register(unit, address + i as Address, word)?;
    }
    Ok(())
}

fn read_registers<F>(
    out: &mut [u8],
    address: Address,
    quantity: Quantity,
    mut read: F,
) -> Result<usize>
where
    F: FnMut(Address) -> Result<Word>,
{
    let byte_count = quantity as usize * 2;
    let (count, data) = out.split_at_mut(1);
    count[0] = byte_count as u8;
    for (i, chunk) in data[..byte_count].chunks_exact_mut(2).enumerate() {
        BigEndian::write_u16(chunk, read(address + i as Address)?);
    }
    Ok(1 + byte_count)
}

fn read_bits<F>(out: &mut [u8], address: Address, quantity: Quantity, mut read: F) -> Result<usize>
where
    F: FnMut(Address) -> Result<Coil>,
{
    let quantity = quantity as usize;
    let byte_count = packed_coils_len(quantity);
    let (count, data) = out.split_at_mut(1);
    count[0] = byte_count as u8;
    let mut bits = [false; 8];
    for (n, byte) in data[..byte_count].iter_mut().enumerate() {
        let start = n * 8;
        let len = (quantity - start).min(8);
        for (i, bit) in bits[..len].iter_mut().enumerate() {
            *bit = read(address + (start + i) as Address)?;
        }
        let packed = pack_coils(&bits[..len], slice::from_mut(byte));
        debug_assert_eq!(packed, Ok(1));
    }
    Ok(1 + byte_count)
}

// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus server (slave) request processing.

mod handlers;

use crate::{
    error::Error,
    frame::*,
    store::{DataStore, StoreError},
};

/// Maximum quantities accepted per request.
///
/// Requests exceeding a limit are answered with
/// [`Exception::IllegalDataValue`]. Regardless of the limits, a response
/// must fit into [`MAX_PDU_LEN`] bytes.
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Read Coils and Read Discrete Inputs
    pub read_bits: Quantity,
    /// Read Holding Registers and Read Input Registers
    pub read_registers: Quantity,
    /// Write Multiple Coils
    pub write_coils: Quantity,
    /// Write Multiple Registers
    pub write_registers: Quantity,
    /// Read part of Read/Write Multiple Registers
    pub read_write_read_registers: Quantity,
    /// Write part of Read/Write Multiple Registers
    pub read_write_write_registers: Quantity,
}

impl Limits {
    /// The maxima of the Modbus application protocol specification.
    pub const MODBUS: Self = Self {
        read_bits: 2000,
        read_registers: 125,
        write_coils: 1968,
        write_registers: 123,
        read_write_read_registers: 125,
        read_write_write_registers: 121,
    };

    /// No quantity limits.
    pub const UNBOUNDED: Self = Self {
        read_bits: Quantity::MAX,
        read_registers: Quantity::MAX,
        write_coils: Quantity::MAX,
        write_registers: Quantity::MAX,
        read_write_read_registers: Quantity::MAX,
        read_write_write_registers: Quantity::MAX,
    };
}

impl Default for Limits {
    fn default() -> Self {
        Self::MODBUS
    }
}

/// Translates request PDUs into [`DataStore`] calls and back into response PDUs.
///
/// The processor holds no state besides its [`Limits`]. It can be shared
/// between connections as long as the store tolerates concurrent access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Processor {
    limits: Limits,
}

impl Processor {
    #[must_use]
    pub const fn new() -> Self {
        Self::with_limits(Limits::MODBUS)
    }

    #[must_use]
    pub const fn with_limits(limits: Limits) -> Self {
        Self { limits }
    }

    #[must_use]
    pub const fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Process the request `pdu` of `unit` and write the response PDU into `buf`.
    ///
    /// Returns the length of the success or exception response.
    /// Fails only on framing errors or if `buf` is too small for the
    /// response; the store is not accessed in that case. A buffer of
    /// [`MAX_PDU_LEN`] bytes is always large enough.
    pub fn process<S>(
        &self,
        store: &S,
        unit: UnitId,
        pdu: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, Error>
    where
        S: DataStore + ?Sized,
    {
        let Some((&fn_code, payload)) = pdu.split_first() else {
            log::warn!("Received empty request PDU for unit {unit}");
            return Err(Error::BufferSize);
        };
        let Some(function) = FunctionCode::new(fn_code) else {
            log::debug!("Unsupported function code 0x{fn_code:0>2X} for unit {unit}");
            return exception(fn_code, Exception::IllegalFunction, buf);
        };
        let request = Request::decode(function, payload).map_err(|err| {
            log::warn!("Failed to decode request PDU for unit {unit}: {err}");
            err
        })?;
        log::trace!("Processing request for unit {unit}: {request:?}");

        if let Err(ex) = handlers::validate(&request, &self.limits) {
            log::debug!("Rejected function {function} for unit {unit}: {ex}");
            return exception(fn_code, ex, buf);
        }

        let rsp_len = request.response_pdu_len();
        if buf.len() < rsp_len {
            return Err(Error::BufferSize);
        }
        match handlers::execute(store, unit, request, &mut buf[1..rsp_len]) {
            Ok(len) => {
                debug_assert_eq!(len + 1, rsp_len);
                buf[0] = fn_code;
                Ok(rsp_len)
            }
            Err(StoreError::Exception(ex)) => {
                log::debug!("Function {function} for unit {unit} failed: {ex}");
                exception(fn_code, ex, buf)
            }
            Err(err @ StoreError::Internal) => {
                log::error!("Function {function} for unit {unit} failed: {err}");
                exception(fn_code, err.exception(), buf)
            }
        }
    }
}

fn exception(function: u8, exception: Exception, buf: &mut [u8]) -> Result<usize, Error> {
    ExceptionResponse {
        function,
        exception,
    }
    .encode(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{SIZE, TableStore};

    const UNIT: UnitId = 0x11;

    fn process(store: &TableStore, pdu: &[u8], buf: &mut [u8]) -> Result<usize, Error> {
        Processor::new().process(store, UNIT, pdu, buf)
    }

    #[test]
    fn processor_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Copy>() {}
        assert_send_sync::<Processor>();
    }

    #[test]
    fn unknown_function_code() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = process(&store, &[0x99, 0x00, 0x01], buf).unwrap();
        assert_eq!(&buf[..len], &[0x99, 0x01]);

        let len = process(&store, &[0x2B, 0x0E, 0x01, 0x00], buf).unwrap();
        assert_eq!(&buf[..len], &[0xAB, 0x01]);
    }

    #[test]
    fn empty_pdu() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        assert_eq!(process(&store, &[], buf), Err(Error::BufferSize));
    }

    #[test]
    fn truncated_header() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        assert_eq!(process(&store, &[0x03, 0x00, 0x01], buf), Err(Error::BufferSize));
    }

    #[test]
    fn read_holding_registers() {
        let store = TableStore::new(UNIT);
        store.holding[0].set(0x0A0B);
        store.holding[1].set(0x0C0D);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = process(&store, &[0x03, 0x00, 0x00, 0x00, 0x02], buf).unwrap();
        assert_eq!(&buf[..len], &[0x03, 0x04, 0x0A, 0x0B, 0x0C, 0x0D]);
    }

    #[test]
    fn read_register_response_length() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        for quantity in 1..=SIZE as u16 {
            let pdu = [0x03, 0x00, 0x00, 0x00, quantity as u8];
            let len = process(&store, &pdu, buf).unwrap();
            assert_eq!(len, 2 + 2 * quantity as usize);
            assert_eq!(buf[1] as usize, 2 * quantity as usize);
        }
    }

    #[test]
    fn too_many_registers() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = process(&store, &[0x04, 0x00, 0x00, 0x00, 126], buf).unwrap();
        assert_eq!(&buf[..len], &[0x84, 0x03]);
    }

    #[test]
    fn address_outside_table() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = process(&store, &[0x01, 0x00, 0x3F, 0x00, 0x02], buf).unwrap();
        assert_eq!(&buf[..len], &[0x81, 0x02]);
    }

    #[test]
    fn address_overflow() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = process(&store, &[0x02, 0xFF, 0xFF, 0x00, 0x02], buf).unwrap();
        assert_eq!(&buf[..len], &[0x82, 0x02]);
    }

    #[test]
    fn write_single_coil() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = process(&store, &[0x05, 0x00, 0x03, 0xFF, 0x00], buf).unwrap();
        assert_eq!(&buf[..len], &[0x05, 0x00, 0x03, 0xFF, 0x00]);
        assert!(store.coils[3].get());

        let len = process(&store, &[0x05, 0x00, 0x03, 0x00, 0x00], buf).unwrap();
        assert_eq!(&buf[..len], &[0x05, 0x00, 0x03, 0x00, 0x00]);
        assert!(!store.coils[3].get());

        let len = process(&store, &[0x05, 0x00, 0x03, 0x12, 0x34], buf).unwrap();
        assert_eq!(&buf[..len], &[0x85, 0x03]);
        assert_eq!(store.writes.get(), 2);
    }

    #[test]
    fn write_multiple_coils() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let pdu = &[0x0F, 0x00, 0x0A, 0x00, 0x09, 0x02, 0b_0000_1101, 0b_0000_0001];
        let len = process(&store, pdu, buf).unwrap();
        assert_eq!(&buf[..len], &[0x0F, 0x00, 0x0A, 0x00, 0x09]);
        assert!(store.coils[10].get());
        assert!(!store.coils[11].get());
        assert!(store.coils[12].get());
        assert!(store.coils[13].get());
        assert!(!store.coils[17].get());
        assert!(store.coils[18].get());

        let len = process(&store, &[0x01, 0x00, 0x0A, 0x00, 0x09], buf).unwrap();
        assert_eq!(&buf[..len], &[0x01, 0x02, 0b_0000_1101, 0b_0000_0001]);
    }

    #[test]
    fn byte_count_mismatch_writes_nothing() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let pdu = &[
            0x10, 0x00, 0x00, 0x00, 0x04, 0x06, 0x00, 0x01, 0x00, 0x02, 0x00, 0x03,
        ];
        assert_eq!(process(&store, pdu, buf), Err(Error::ByteCount(6)));
        assert_eq!(store.writes.get(), 0);
    }

    #[test]
    fn write_single_register_twice() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let pdu = &[0x06, 0x00, 0x05, 0x00, 0x2A];
        let first = process(&store, pdu, buf).unwrap();
        let rsp = [buf[0], buf[1], buf[2], buf[3], buf[4]];
        let second = process(&store, pdu, buf).unwrap();
        assert_eq!(first, second);
        assert_eq!(&buf[..second], &rsp);
        assert_eq!(&rsp, pdu);
        assert_eq!(store.holding[5].get(), 42);
    }

    #[test]
    fn internal_store_failure() {
        let mut store = TableStore::new(UNIT);
        store.fail_at = Some(7);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = process(&store, &[0x03, 0x00, 0x06, 0x00, 0x02], buf).unwrap();
        assert_eq!(&buf[..len], &[0x83, 0x04]);
    }

    #[test]
    fn gateway_exception_passthrough() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let len = Processor::new()
            .process(&store, 0x22, &[0x06, 0x00, 0x01, 0x00, 0x01], buf)
            .unwrap();
        assert_eq!(&buf[..len], &[0x86, 0x0B]);
    }

    #[test]
    fn response_buffer_too_small() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; 5];
        assert_eq!(
            process(&store, &[0x03, 0x00, 0x00, 0x00, 0x02], buf),
            Err(Error::BufferSize)
        );
        let len = process(&store, &[0x03, 0x00, 0x00, 0x00, 0x01], buf).unwrap();
        assert_eq!(len, 4);
        let buf = &mut [0; 1];
        assert_eq!(process(&store, &[0x99], buf), Err(Error::BufferSize));
    }

    #[test]
    fn custom_limits() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let processor = Processor::with_limits(Limits {
            read_registers: 2,
            ..Limits::MODBUS
        });
        assert_eq!(processor.limits().read_registers, 2);
        let len = processor
            .process(&store, UNIT, &[0x03, 0x00, 0x00, 0x00, 0x03], buf)
            .unwrap();
        assert_eq!(&buf[..len], &[0x83, 0x03]);
    }

    #[test]
    fn unbounded_limits_answer_oversized_reads_with_exception() {
        let store = TableStore::new(UNIT);
        let buf = &mut [0; MAX_PDU_LEN];
        let processor = Processor::with_limits(Limits::UNBOUNDED);

        let len = processor
            .process(&store, UNIT, &[0x03, 0x00, 0x00, 0x00, 127], buf)
            .unwrap();
        assert_eq!(&buf[..len], &[0x83, 0x03]);

        // 2040 coils
        let len = processor
            .process(&store, UNIT, &[0x01, 0x00, 0x00, 0x07, 0xF8], buf)
            .unwrap();
        assert_eq!(&buf[..len], &[0x81, 0x03]);

        let pdu = &[
            0x17, 0x00, 0x00, 0x00, 127, 0x00, 0x00, 0x00, 0x01, 0x02, 0x00, 0x01,
        ];
        let len = processor.process(&store, UNIT, pdu, buf).unwrap();
        assert_eq!(&buf[..len], &[0x97, 0x03]);
        assert_eq!(store.writes.get(), 0);

        let len = processor
            .process(&store, UNIT, &[0x03, 0x00, 0x00, 0x00, 0x3F], buf)
            .unwrap();
        assert_eq!(len, 2 + 2 * 0x3F);
    }

    #[test]
    fn mask_write_and_read_write() {
        let store = TableStore::new(UNIT);
        store.holding[4].set(0x0012);
        let buf = &mut [0; MAX_PDU_LEN];
        let pdu = &[0x16, 0x00, 0x04, 0x00, 0xF2, 0x00, 0x25];
        let len = process(&store, pdu, buf).unwrap();
        assert_eq!(&buf[..len], pdu);
        assert_eq!(store.holding[4].get(), 0x0017);

        let pdu = &[
            0x17, 0x00, 0x04, 0x00, 0x02, 0x00, 0x05, 0x00, 0x01, 0x02, 0xBE, 0xEF,
        ];
        let len = process(&store, pdu, buf).unwrap();
        assert_eq!(&buf[..len], &[0x17, 0x04, 0x00, 0x17, 0xBE, 0xEF]);
    }
}

// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Data store interface

use core::fmt;

use crate::frame::{Address, Coil, Exception, UnitId, Word};

/// Failure reported by a [`DataStore`].
#[cfg_attr(all(feature = "defmt", target_os = "none"), derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Answered with exactly this exception code.
    ///
    /// Out of range addresses are reported as
    /// [`Exception::IllegalDataAddress`]; gateways forward
    /// [`Exception::GatewayPathUnavailable`] and
    /// [`Exception::GatewayTargetDevice`].
    Exception(Exception),
    /// Unexpected fault inside the store.
    ///
    /// Answered with [`Exception::ServerDeviceFailure`].
    Internal,
}

impl StoreError {
    /// The exception code sent to the client.
    #[must_use]
    pub const fn exception(self) -> Exception {
        match self {
            Self::Exception(ex) => ex,
            Self::Internal => Exception::ServerDeviceFailure,
        }
    }
}

impl From<Exception> for StoreError {
    fn from(ex: Exception) -> Self {
        Self::Exception(ex)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Exception(ex) => write!(f, "{ex}"),
            Self::Internal => write!(f, "Internal data store failure"),
        }
    }
}

/// Register and coil storage served by a [`Processor`](crate::Processor).
///
/// Each call must be atomic. The processor issues them one after another and
/// does no locking of its own, so a store shared between connections has to
/// synchronize internally.
pub trait DataStore {
    fn get_holding_register(&self, unit: UnitId, address: Address) -> Result<Word, StoreError>;

    fn set_holding_register(
        &self,
        unit: UnitId,
        address: Address,
        value: Word,
    ) -> Result<(), StoreError>;

    fn get_input_register(&self, unit: UnitId, address: Address) -> Result<Word, StoreError>;

    fn get_coil(&self, unit: UnitId, address: Address) -> Result<Coil, StoreError>;

    fn set_coil(&self, unit: UnitId, address: Address, value: Coil) -> Result<(), StoreError>;

    fn get_discrete_input(&self, unit: UnitId, address: Address) -> Result<Coil, StoreError>;
}

impl<T: DataStore + ?Sized> DataStore for &T {
    fn get_holding_register(&self, unit: UnitId, address: Address) -> Result<Word, StoreError> {
        (**self).get_holding_register(unit, address)
    }

    fn set_holding_register(
        &self,
        unit: UnitId,
        address: Address,
        value: Word,
    ) -> Result<(), StoreError> {
        (**self).set_holding_register(unit, address, value)
    }

    fn get_input_register(&self, unit: UnitId, address: Address) -> Result<Word, StoreError> {
        (**self).get_input_register(unit, address)
    }

    fn get_coil(&self, unit: UnitId, address: Address) -> Result<Coil, StoreError> {
        (**self).get_coil(unit, address)
    }

    fn set_coil(&self, unit: UnitId, address: Address, value: Coil) -> Result<(), StoreError> {
        (**self).set_coil(unit, address, value)
    }

    fn get_discrete_input(&self, unit: UnitId, address: Address) -> Result<Coil, StoreError> {
        (**self).get_discrete_input(unit, address)
    }
}

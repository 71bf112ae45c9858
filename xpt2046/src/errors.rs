use embedded_hal::{digital, spi};

pub type Result<T> = ::core::result::Result<T, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("touch bus error: {0}")]
    Bus(spi::ErrorKind),
    #[error("touch line error: {0}")]
    Pin(digital::ErrorKind),
    #[error("chip-select line is not configured")]
    NoChipSelect,
}

impl Error {
    pub(crate) fn bus<E: spi::Error>(error: E) -> Self {
        Self::Bus(error.kind())
    }

    pub(crate) fn pin<E: digital::Error>(error: E) -> Self {
        Self::Pin(error.kind())
    }
}

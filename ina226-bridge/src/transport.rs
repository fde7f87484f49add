/// Outbound half of the byte-stream link (BLE notify, UART DMA, ...).
///
/// Inbound bytes do not pass through this trait: the receive context pushes
/// them straight into the [`Producer`](crate::ring::Producer) of the engine's
/// ring.
pub trait Transport {
    /// Error type for a failed send.
    type Error;

    /// Send `bytes` as one block, returning once the link has accepted them.
    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    type Error = T::Error;

    fn send(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        (**self).send(bytes)
    }
}

pub mod codec;
pub mod source;
pub mod store;
pub mod writer;

pub use codec::{decode_signal, DecodeError, JsonCodec, LegacyCodec, SignalCodec};
pub use source::{MemorySignalQueue, SignalSource};
pub use store::{FileSignalQueue, QueueError};
pub use writer::{write_signal, SignalFormat};

//! Common module for library exports

pub use crate::arch::{Architecture, I386State, Mock, MockState, I386};
pub use crate::error::{Result, StubError, TargetError, TargetResult, TransportError, TransportResult};
pub use crate::target::{RamTarget, Target};
pub use crate::transport::{BufferTransport, IoTransport, Transport};
pub use crate::types::{Address, DebugState, Signal, Word};

//! 常用类型一站式导入。

pub use crate::capability::{
    Endpoint, FitableMetadata, Format, Genericable, MethodDescriptor, Target,
};
pub use crate::context::CallContext;
pub use crate::contract::{Directory, LocalInvoker, SerializationService, TransportClient};
pub use crate::error::{ErrorCategory, FerryError, Result, RetryAdvice, codes};
pub use crate::ids::{FitableId, GenericableId, WorkerId};
pub use crate::protocol::{CommunicationProtocol, SerializationFormat};
pub use crate::types::NonEmptyStr;

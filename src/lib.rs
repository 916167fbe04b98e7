pub mod constants;
pub mod errors;
pub mod logger;
pub mod math;
pub mod pools;
pub mod protocols;
pub mod router;
pub mod rpc;
pub mod utils;

pub use errors::{DexError, DexResult};
pub use pools::{Pool, Protocol, ProtocolKind, ProtocolName};
pub use router::SimpleRouter;
pub use rpc::SolClient;

//! httpmirror core
//!
//! Domain types, port traits and error handling shared by every other crate.
//! Nothing in here performs I/O; stores and origin clients live in adapter
//! crates and are consumed through the traits in [`ports`].

pub mod error;
pub mod object;
pub mod path;
pub mod ports;
pub mod stream;

pub use error::{Error, Result};
pub use object::{ObjectInfo, OriginInfo, OriginResponse};
pub use path::{decode_path, encode_path};
pub use ports::{LinkResolver, OriginClient, PrefixLinks, RemoteStore};
pub use stream::{ByteStream, collect_bytes, limit_bytes, once_bytes};

//! Record codec: the extension header that optionally prefixes a blob
//! record's payload, the command envelope it is projected to/from, and the
//! byte-order converters applied at the wire boundary.

pub mod defrag;
pub mod denc;
pub mod error;
pub mod ext_header;
pub mod io_attr;
pub mod key;

pub use defrag::{convert_defrag_ctl, DefragCtl, DefragFlags, DefragState};
pub use denc::Denc;
pub use error::{CodecError, Result};
pub use ext_header::{apply_ext_to_io, decode_ext, encode_ext, ExtHeader, EHDR_LEN};
pub use io_attr::{convert_io_attr, CommandFlags, IoAttr};
pub use key::{Key, ID_LEN};

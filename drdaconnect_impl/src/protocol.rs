// The wire protocol: frames, request serialization, reply decoding, and the
// operations of an open session.

pub mod codepoint;
pub(crate) mod dss;
pub(crate) mod frame_buffer;
pub(crate) mod operation;
pub(crate) mod parts;
pub(crate) mod reply;
pub(crate) mod request;
pub(crate) mod section;

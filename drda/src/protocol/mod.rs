//! DRDA Wire Protocol (Layer 2: Pure, Sync)
//!
//! No async, no I/O, no tokio - just values → bytes and bytes → replies.

pub mod code_points;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod reply;
pub mod value;

pub use code_points::SecurityMechanism;
pub use decoder::{HandshakeReply, Reply, SqlCard};
pub use encoder::{DEFAULT_MANAGER_LEVELS, DrdaEncoder, SecurityToken};
pub use error::{DecodeError, EncodeError};
pub use frame::{
    DSS_FLAGS, Frame, FrameHeader, FrameType, HEADER_LEN, Parameter, ParameterList,
    build_frame_header, build_parameter, parse_frame_header, parse_parameters,
};
pub use reply::ReplyBuilder;
pub use value::{Row, Value};

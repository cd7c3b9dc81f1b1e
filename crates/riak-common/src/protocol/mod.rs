pub mod error;
pub mod messages;

pub use error::{Result, ResultCode, RiakError};
pub use messages::{
    AuthReq, AuthResp, ErrorResp, GetServerInfoReq, GetServerInfoResp, ListKeysReq, ListKeysResp,
    Message, MessageCode, PingReq, PingResp,
};

//! Message codes and the message types the connection layer speaks itself.
//!
//! Every frame on the wire carries one code byte. [`MessageCode`] is the
//! static, immutable code table: converting a byte into a code is a `match`,
//! and each concrete [`Message`] type names its code as an associated
//! constant, so the type-to-code direction is resolved at compile time.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::protocol::error::RiakError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageCode {
    ErrorResp = 0,
    PingReq = 1,
    PingResp = 2,
    GetClientIdReq = 3,
    GetClientIdResp = 4,
    SetClientIdReq = 5,
    SetClientIdResp = 6,
    GetServerInfoReq = 7,
    GetServerInfoResp = 8,
    GetReq = 9,
    GetResp = 10,
    PutReq = 11,
    PutResp = 12,
    DelReq = 13,
    DelResp = 14,
    ListBucketsReq = 15,
    ListBucketsResp = 16,
    ListKeysReq = 17,
    ListKeysResp = 18,
    GetBucketReq = 19,
    GetBucketResp = 20,
    SetBucketReq = 21,
    SetBucketResp = 22,
    MapRedReq = 23,
    MapRedResp = 24,
    IndexReq = 25,
    IndexResp = 26,
    SearchQueryReq = 27,
    SearchQueryResp = 28,
    ResetBucketReq = 29,
    ResetBucketResp = 30,
    CounterUpdateReq = 50,
    CounterUpdateResp = 51,
    CounterGetReq = 52,
    CounterGetResp = 53,
    DtFetchReq = 80,
    DtFetchResp = 81,
    DtUpdateReq = 82,
    DtUpdateResp = 83,
    TsQueryReq = 90,
    TsQueryResp = 91,
    TsPutReq = 92,
    TsPutResp = 93,
    TsDelReq = 94,
    TsDelResp = 95,
    TsGetReq = 96,
    TsGetResp = 97,
    TsListKeysReq = 98,
    TsListKeysResp = 99,
    AuthReq = 253,
    AuthResp = 254,
    StartTls = 255,
}

impl MessageCode {
    /// Every registered code, in ascending order.
    pub const ALL: [MessageCode; 52] = [
        MessageCode::ErrorResp,
        MessageCode::PingReq,
        MessageCode::PingResp,
        MessageCode::GetClientIdReq,
        MessageCode::GetClientIdResp,
        MessageCode::SetClientIdReq,
        MessageCode::SetClientIdResp,
        MessageCode::GetServerInfoReq,
        MessageCode::GetServerInfoResp,
        MessageCode::GetReq,
        MessageCode::GetResp,
        MessageCode::PutReq,
        MessageCode::PutResp,
        MessageCode::DelReq,
        MessageCode::DelResp,
        MessageCode::ListBucketsReq,
        MessageCode::ListBucketsResp,
        MessageCode::ListKeysReq,
        MessageCode::ListKeysResp,
        MessageCode::GetBucketReq,
        MessageCode::GetBucketResp,
        MessageCode::SetBucketReq,
        MessageCode::SetBucketResp,
        MessageCode::MapRedReq,
        MessageCode::MapRedResp,
        MessageCode::IndexReq,
        MessageCode::IndexResp,
        MessageCode::SearchQueryReq,
        MessageCode::SearchQueryResp,
        MessageCode::ResetBucketReq,
        MessageCode::ResetBucketResp,
        MessageCode::CounterUpdateReq,
        MessageCode::CounterUpdateResp,
        MessageCode::CounterGetReq,
        MessageCode::CounterGetResp,
        MessageCode::DtFetchReq,
        MessageCode::DtFetchResp,
        MessageCode::DtUpdateReq,
        MessageCode::DtUpdateResp,
        MessageCode::TsQueryReq,
        MessageCode::TsQueryResp,
        MessageCode::TsPutReq,
        MessageCode::TsPutResp,
        MessageCode::TsDelReq,
        MessageCode::TsDelResp,
        MessageCode::TsGetReq,
        MessageCode::TsGetResp,
        MessageCode::TsListKeysReq,
        MessageCode::TsListKeysResp,
        MessageCode::AuthReq,
        MessageCode::AuthResp,
        MessageCode::StartTls,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_request(self) -> bool {
        self.response_code().is_some()
    }

    /// The single response code paired with a request code, `None` for
    /// response codes.
    ///
    /// `StartTls` is answered with `StartTls`.
    pub fn response_code(self) -> Option<MessageCode> {
        use MessageCode::*;
        let response = match self {
            PingReq => PingResp,
            GetClientIdReq => GetClientIdResp,
            SetClientIdReq => SetClientIdResp,
            GetServerInfoReq => GetServerInfoResp,
            GetReq => GetResp,
            PutReq => PutResp,
            DelReq => DelResp,
            ListBucketsReq => ListBucketsResp,
            ListKeysReq => ListKeysResp,
            GetBucketReq => GetBucketResp,
            SetBucketReq => SetBucketResp,
            MapRedReq => MapRedResp,
            IndexReq => IndexResp,
            SearchQueryReq => SearchQueryResp,
            ResetBucketReq => ResetBucketResp,
            CounterUpdateReq => CounterUpdateResp,
            CounterGetReq => CounterGetResp,
            DtFetchReq => DtFetchResp,
            DtUpdateReq => DtUpdateResp,
            TsQueryReq => TsQueryResp,
            TsPutReq => TsPutResp,
            TsDelReq => TsDelResp,
            TsGetReq => TsGetResp,
            TsListKeysReq => TsListKeysResp,
            AuthReq => AuthResp,
            StartTls => StartTls,
            _ => return None,
        };
        Some(response)
    }
}

impl TryFrom<u8> for MessageCode {
    type Error = RiakError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use MessageCode::*;
        let code = match value {
            0 => ErrorResp,
            1 => PingReq,
            2 => PingResp,
            3 => GetClientIdReq,
            4 => GetClientIdResp,
            5 => SetClientIdReq,
            6 => SetClientIdResp,
            7 => GetServerInfoReq,
            8 => GetServerInfoResp,
            9 => GetReq,
            10 => GetResp,
            11 => PutReq,
            12 => PutResp,
            13 => DelReq,
            14 => DelResp,
            15 => ListBucketsReq,
            16 => ListBucketsResp,
            17 => ListKeysReq,
            18 => ListKeysResp,
            19 => GetBucketReq,
            20 => GetBucketResp,
            21 => SetBucketReq,
            22 => SetBucketResp,
            23 => MapRedReq,
            24 => MapRedResp,
            25 => IndexReq,
            26 => IndexResp,
            27 => SearchQueryReq,
            28 => SearchQueryResp,
            29 => ResetBucketReq,
            30 => ResetBucketResp,
            50 => CounterUpdateReq,
            51 => CounterUpdateResp,
            52 => CounterGetReq,
            53 => CounterGetResp,
            80 => DtFetchReq,
            81 => DtFetchResp,
            82 => DtUpdateReq,
            83 => DtUpdateResp,
            90 => TsQueryReq,
            91 => TsQueryResp,
            92 => TsPutReq,
            93 => TsPutResp,
            94 => TsDelReq,
            95 => TsDelResp,
            96 => TsGetReq,
            97 => TsGetResp,
            98 => TsListKeysReq,
            99 => TsListKeysResp,
            253 => AuthReq,
            254 => AuthResp,
            255 => StartTls,
            other => return Err(RiakError::UnknownCode(other)),
        };
        Ok(code)
    }
}

impl fmt::Display for MessageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A typed request or response payload.
///
/// `Default` is the value an empty payload decodes to.
pub trait Message: Serialize + DeserializeOwned + Default + Send + Sync + 'static {
    const CODE: MessageCode;
}

/// Standard error response. Code 0 on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResp {
    pub errmsg: String,
    pub errcode: u32,
}

impl Message for ErrorResp {
    const CODE: MessageCode = MessageCode::ErrorResp;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingReq;

impl Message for PingReq {
    const CODE: MessageCode = MessageCode::PingReq;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResp;

impl Message for PingResp {
    const CODE: MessageCode = MessageCode::PingResp;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetServerInfoReq;

impl Message for GetServerInfoReq {
    const CODE: MessageCode = MessageCode::GetServerInfoReq;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetServerInfoResp {
    pub node: Option<String>,
    pub server_version: Option<String>,
}

impl Message for GetServerInfoResp {
    const CODE: MessageCode = MessageCode::GetServerInfoResp;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthReq {
    pub user: String,
    pub password: String,
}

impl Message for AuthReq {
    const CODE: MessageCode = MessageCode::AuthReq;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResp;

impl Message for AuthResp {
    const CODE: MessageCode = MessageCode::AuthResp;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListKeysReq {
    pub bucket: String,
    pub bucket_type: Option<String>,
    pub timeout_ms: Option<u32>,
}

impl Message for ListKeysReq {
    const CODE: MessageCode = MessageCode::ListKeysReq;
}

/// One chunk of a streamed key listing. The last chunk has `done` set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListKeysResp {
    pub keys: Vec<String>,
    pub done: bool,
}

impl Message for ListKeysResp {
    const CODE: MessageCode = MessageCode::ListKeysResp;
}

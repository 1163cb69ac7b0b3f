use serde::{Deserialize, Serialize};

// -- Registration --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub invitation: String,
    pub username: String,
    #[serde(with = "crate::b64")]
    pub passwd: Vec<u8>,
}

#[derive(Debug, Default, Serialize)]
pub struct RegisterResponse {}

// -- Login --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    #[serde(with = "crate::b64")]
    pub passwd: Vec<u8>,
    pub sig_key: String,
    pub master_key: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub bearer: String,
    pub need_prekeys: bool,
}

// -- Messages --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendItem {
    /// Opaque id of the recipient.
    pub to: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub msg: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendRequest {
    pub messages: Vec<SendItem>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendResponse {
    pub need_prekeys: bool,
}

/// One delivered message. `age_sec` is how long ago the server accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecvItem {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub msg: String,
    pub age_sec: i64,
}

// -- Prekeys --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchPrekeysRequest {
    pub ids: Vec<String>,
}

/// One entry per requested id, in request order. Empty string when none is available.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchPrekeysResponse {
    pub prekeys: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddPrekeysRequest {
    pub prekeys: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddPrekeysResponse {
    pub live_prekeys: Vec<String>,
}

// -- Directory --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserInfoRequest {
    pub username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserInfoResponse {
    pub id: String,
    pub sig_key: String,
    pub master_key: String,
}

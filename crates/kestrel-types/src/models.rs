use serde::{Deserialize, Serialize};

/// A message as held by an inbox.
///
/// While stored, `time` is the acceptance time in epoch seconds; once drained
/// it is rewritten to the message's age.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub time: i64,
    pub from: String,
    pub kind: String,
    pub msg: String,
}

/// On-disk shape of `users/<id>/user.json`. The numeric id is the directory name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountRecord {
    pub username: String,
    #[serde(with = "crate::b64")]
    pub salt: Vec<u8>,
    #[serde(with = "crate::b64")]
    pub passwd: Vec<u8>,
    pub bearer: String,
    pub sn: u64,
    pub sig_key: String,
    pub master_key: String,
    pub prekeys: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_encodes_binary_fields_as_unpadded_base64() {
        let rec = AccountRecord {
            username: "alice".into(),
            salt: vec![0xff; 4],
            passwd: vec![1, 2, 3],
            sn: 7,
            ..Default::default()
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["salt"], "_____w");
        assert_eq!(json["passwd"], "AQID");

        let back: AccountRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.salt, rec.salt);
        assert_eq!(back.sn, 7);
    }
}

use serde::{Deserialize, Serialize};

/// Per-file metadata, sent once immediately before the first binary chunk.
///
/// This is the receiver's sole source of truth for the expected size and
/// the name/type of the artifact it will produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferMeta {
    /// Display name of the file.
    pub name: String,
    /// Total byte length.
    pub size: u64,
    /// Content-type label (e.g. `application/octet-stream`).
    pub mime_type: String,
}

/// A control frame on the channel.
///
/// Serialized as a tagged JSON object; the `type` field selects the
/// variant. Unknown types fail to parse and are reported as protocol
/// violations by the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ControlMessage {
    /// Starts a new file transfer.
    Meta(TransferMeta),
    /// The current file is complete.
    Done,
    /// Abort the current file; the receiver discards partial data.
    Cancel,
    /// Keep-alive with no payload semantics beyond liveness.
    Ping,
}

impl ControlMessage {
    /// Serializes to the textual wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a textual frame received from the channel.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meta_wire_format() {
        let msg = ControlMessage::Meta(TransferMeta {
            name: "a.txt".into(),
            size: 10,
            mime_type: "text/plain".into(),
        });
        assert_eq!(
            msg.to_json().unwrap(),
            r#"{"type":"meta","name":"a.txt","size":10,"mimeType":"text/plain"}"#
        );
    }

    #[test]
    fn done_wire_format() {
        assert_eq!(ControlMessage::Done.to_json().unwrap(), r#"{"type":"done"}"#);
    }

    #[test]
    fn cancel_wire_format() {
        assert_eq!(
            ControlMessage::Cancel.to_json().unwrap(),
            r#"{"type":"cancel"}"#
        );
    }

    #[test]
    fn ping_wire_format() {
        assert_eq!(ControlMessage::Ping.to_json().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn meta_roundtrip() {
        let msg = ControlMessage::Meta(TransferMeta {
            name: "photo.jpg".into(),
            size: 3_145_728,
            mime_type: "image/jpeg".into(),
        });
        let parsed = ControlMessage::from_json(&msg.to_json().unwrap()).unwrap();
        assert_eq!(parsed, msg);
    }

    #[test]
    fn parses_zero_size_meta() {
        let parsed =
            ControlMessage::from_json(r#"{"type":"meta","name":"empty","size":0,"mimeType":""}"#)
                .unwrap();
        assert_eq!(
            parsed,
            ControlMessage::Meta(TransferMeta {
                name: "empty".into(),
                size: 0,
                mime_type: String::new(),
            })
        );
    }

    #[test]
    fn unknown_type_rejected() {
        assert!(ControlMessage::from_json(r#"{"type":"resume"}"#).is_err());
    }

    #[test]
    fn meta_missing_field_rejected() {
        assert!(ControlMessage::from_json(r#"{"type":"meta","name":"a.txt"}"#).is_err());
    }

    #[test]
    fn non_json_rejected() {
        assert!(ControlMessage::from_json("not json at all").is_err());
    }
}

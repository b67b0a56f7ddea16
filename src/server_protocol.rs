use serde_json::Value;

#[derive(Debug, PartialEq)]
pub enum ParsedClientMessage {
    Pointer { x: f32 },
    Drop,
    Retry,
    Ping { t: f64 },
}

pub fn parse_client_message(raw: &str) -> Option<ParsedClientMessage> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let object = value.as_object()?;
    let message_type = object.get("type")?.as_str()?;

    match message_type {
        "pointer" => {
            let x = object.get("x")?.as_f64()?;
            if !x.is_finite() || x.abs() > f32::MAX as f64 {
                return None;
            }
            Some(ParsedClientMessage::Pointer { x: x as f32 })
        }
        "drop" => Some(ParsedClientMessage::Drop),
        "retry" => Some(ParsedClientMessage::Retry),
        "ping" => {
            let t = object.get("t")?.as_f64()?;
            if !t.is_finite() {
                return None;
            }
            Some(ParsedClientMessage::Ping { t })
        }
        _ => None,
    }
}

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub const EVENT_TYPE_HEADER: &str = "aeg-event-type";
pub const SUBSCRIPTION_VALIDATION: &str = "SubscriptionValidation";
pub const VALIDATION_EVENT_TYPE: &str = "Microsoft.EventGrid.SubscriptionValidationEvent";
pub const VALIDATION_CODE: &str = "pulumi-create";

#[derive(Debug, Serialize)]
pub struct ValidationEvent {
    pub data: ValidationData,
    #[serde(rename = "eventType")]
    pub event_type: &'static str,
}

#[derive(Debug, Serialize)]
pub struct ValidationData {
    #[serde(rename = "validationCode")]
    pub validation_code: &'static str,
}

/// The synthetic handshake body: a one-element event array.
pub fn validation_body() -> [ValidationEvent; 1] {
    [ValidationEvent {
        data: ValidationData {
            validation_code: VALIDATION_CODE,
        },
        event_type: VALIDATION_EVENT_TYPE,
    }]
}

/// Body of the ARM `host/default/listkeys` action. Only `systemKeys` is
/// read; `masterKey` and `functionKeys` are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostKeys {
    #[serde(default)]
    pub system_keys: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{validation_body, HostKeys};

    #[test]
    fn validation_body_matches_handshake_shape() {
        assert_eq!(
            serde_json::to_value(validation_body()).expect("serializable"),
            json!([{
                "data": { "validationCode": "pulumi-create" },
                "eventType": "Microsoft.EventGrid.SubscriptionValidationEvent"
            }])
        );
    }

    #[test]
    fn host_keys_tolerate_missing_sections() {
        let keys: HostKeys = serde_json::from_value(json!({
            "masterKey": "m",
            "functionKeys": { "default": "f" }
        }))
        .expect("valid document");
        assert!(keys.system_keys.is_empty());
    }
}

//! Registry messages: the wire contract with the router.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::endpoint::{Endpoint, Route};

/// Value of the `component` tag on every message.
pub const COMPONENT_TAG: &str = "route-emitter";

/// Registers or unregisters one hostname for one backend.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegistryMessage {
    pub host: String,
    pub port: u32,
    pub uris: Vec<String>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub app: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub route_service_url: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_instance_id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_instance_index: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

impl RegistryMessage {
    /// Builds the message routing `route`'s hostname to `endpoint`.
    pub fn for_endpoint(endpoint: &Endpoint, route: &Route) -> Self {
        let private_instance_index = if endpoint.instance_guid.is_empty() {
            String::new()
        } else {
            endpoint.index.to_string()
        };

        Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            uris: vec![route.hostname.clone()],
            app: route.log_guid.clone(),
            route_service_url: route.route_service_url.clone(),
            private_instance_id: endpoint.instance_guid.clone(),
            private_instance_index,
            tags: BTreeMap::from([("component".to_string(), COMPONENT_TAG.to_string())]),
        }
    }
}

/// A registration/unregistration delta.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MessagesToEmit {
    #[serde(default)]
    pub registration_messages: Vec<RegistryMessage>,
    #[serde(default)]
    pub unregistration_messages: Vec<RegistryMessage>,
}

impl MessagesToEmit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.registration_messages.is_empty() && self.unregistration_messages.is_empty()
    }

    /// Appends `other`'s messages after this delta's own.
    pub fn merge(&mut self, other: MessagesToEmit) {
        self.registration_messages.extend(other.registration_messages);
        self.unregistration_messages.extend(other.unregistration_messages);
    }

    /// Number of hostnames being registered.
    pub fn route_registration_count(&self) -> u64 {
        count_uris(&self.registration_messages)
    }

    /// Number of hostnames being unregistered.
    pub fn route_unregistration_count(&self) -> u64 {
        count_uris(&self.unregistration_messages)
    }
}

fn count_uris(messages: &[RegistryMessage]) -> u64 {
    messages.iter().map(|m| m.uris.len() as u64).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(instance_guid: &str) -> Endpoint {
        Endpoint {
            instance_guid: instance_guid.to_string(),
            index: 3,
            host: "1.1.1.1".to_string(),
            port: 61001,
            container_port: 8080,
            ..Default::default()
        }
    }

    #[test]
    fn test_message_wire_format() {
        let route = Route::new("foo.example.com", "log-guid", "https://rs.example.com");
        let message = RegistryMessage::for_endpoint(&endpoint("ig-1"), &route);

        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "host": "1.1.1.1",
                "port": 61001,
                "uris": ["foo.example.com"],
                "app": "log-guid",
                "route_service_url": "https://rs.example.com",
                "private_instance_id": "ig-1",
                "private_instance_index": "3",
                "tags": {"component": "route-emitter"}
            })
        );
    }

    #[test]
    fn test_index_omitted_without_instance_guid() {
        let route = Route::new("foo.example.com", "", "");
        let message = RegistryMessage::for_endpoint(&endpoint(""), &route);

        assert!(message.private_instance_index.is_empty());

        let json = serde_json::to_value(&message).unwrap();
        let object = json.as_object().unwrap();
        assert!(!object.contains_key("app"));
        assert!(!object.contains_key("route_service_url"));
        assert!(!object.contains_key("private_instance_id"));
        assert!(!object.contains_key("private_instance_index"));
        assert!(object.contains_key("tags"));
    }

    #[test]
    fn test_decodes_minimal_message() {
        let message: RegistryMessage =
            serde_json::from_str(r#"{"host":"1.1.1.1","port":11,"uris":["a.com"]}"#).unwrap();
        assert_eq!(message.uris, vec!["a.com".to_string()]);
        assert!(message.tags.is_empty());
    }

    #[test]
    fn test_merge_and_counts() {
        let route = Route::new("foo.example.com", "", "");
        let mut messages = MessagesToEmit {
            registration_messages: vec![RegistryMessage::for_endpoint(&endpoint("a"), &route)],
            ..Default::default()
        };
        assert!(!messages.is_empty());

        messages.merge(MessagesToEmit {
            registration_messages: vec![RegistryMessage::for_endpoint(&endpoint("b"), &route)],
            unregistration_messages: vec![RegistryMessage::for_endpoint(&endpoint("c"), &route)],
        });

        assert_eq!(messages.route_registration_count(), 2);
        assert_eq!(messages.route_unregistration_count(), 1);
        assert_eq!(messages.registration_messages[1].private_instance_id, "b");
        assert!(MessagesToEmit::new().is_empty());
    }
}

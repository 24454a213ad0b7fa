//! Shared fixtures for the end-to-end scenarios under `tests/`.
use httptester::{eyre, HttpTesterClient};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BicycleType {
    Road,
    Mountain,
    TimeTrial,
    Gravel,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bicycle {
    pub id: u32,
    pub name: String,
    pub brand: String,
    #[serde(rename = "type")]
    pub bicycle_type: BicycleType,
}

impl Bicycle {
    pub fn foil() -> Bicycle {
        Bicycle {
            id: 1,
            name: "Foil".into(),
            brand: "Scott".into(),
            bicycle_type: BicycleType::Road,
        }
    }

    pub fn exceed() -> Bicycle {
        Bicycle {
            id: 5,
            name: "EXCEED CFR".into(),
            brand: "Giant".into(),
            bicycle_type: BicycleType::Mountain,
        }
    }
}

/// XML document used by the XML extraction scenarios.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename = "note")]
pub struct Note {
    pub to: String,
    pub from: String,
    pub heading: String,
    pub body: String,
}

pub const NOTE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<note>
  <to>Tove</to>
  <from>Jani</from>
  <heading>Reminder</heading>
  <body>Don't forget me this weekend!</body>
</note>"#;

/// Client initialized against a local mock server.
pub fn client(base_address: &str) -> eyre::Result<HttpTesterClient> {
    let mut client = HttpTesterClient::new();
    client.initialize(base_address, true)?;
    Ok(client)
}

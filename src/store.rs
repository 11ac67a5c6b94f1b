use crate::model::{FieldValue, MergedRecord};
use crate::Error;
use influxdb::{Client, InfluxDbWriteable, Timestamp, Type};

/// Measurement every merged record is written under.
pub const MEASUREMENT: &str = "fronius";

pub fn client(
    url: &str,
    database: &str,
    username: Option<&str>,
    password: Option<&str>,
) -> Client {
    let client = Client::new(url, database);
    match (username, password) {
        (Some(user), Some(pass)) => client.with_auth(user, pass),
        _ => client,
    }
}

fn influx_value(value: &FieldValue) -> Type {
    match value {
        FieldValue::Float(v) => Type::Float(*v),
        FieldValue::Integer(v) => Type::SignedInteger(*v),
        FieldValue::Text(v) => Type::Text(v.clone()),
    }
}

/// Persist one merged record as a single point, timestamped by the device
/// and tagged with the configured source identifier.
pub async fn write(client: &Client, source_tag: &str, record: &MergedRecord) -> Result<(), Error> {
    let mut query = Timestamp::Milliseconds(record.timestamp.timestamp_millis() as u128)
        .into_query(MEASUREMENT);
    query = query.add_tag("source", source_tag);
    for (name, value) in &record.fields {
        query = query.add_field(name.as_str(), influx_value(value));
    }

    match client.query(query).await {
        Ok(msg) => {
            log::debug!("influxdb write success: {:?}", msg);
            Ok(())
        }
        Err(e) => Err(Error::Unclassified(format!("influxdb write error: {}", e))),
    }
}
